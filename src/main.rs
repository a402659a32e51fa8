use std::time::Duration;

use anyhow::Result;

mod api;
mod app;
mod config;
mod conversation;
mod handler;
mod prefs;
mod projects;
mod status;
mod tui;
mod ui;

use app::App;
use config::Config;
use prefs::Prefs;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());
    let prefs = Prefs::load().unwrap_or_default();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new(Duration::from_secs(config.poll_secs.max(1)));
    let mut app = App::new(&config, prefs, events.sender());

    // Replace the default project list with whatever the backend has.
    app.request_projects();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event).await?;
        } else {
            break;
        }
    }

    tui::restore()?;
    Ok(())
}
