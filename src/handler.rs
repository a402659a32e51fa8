use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::path::PathBuf;

use crate::api::Credentials;
use crate::app::{
    platform_takes_token, AgentField, App, ConnectField, FocusPane, InputMode, Modal, PLATFORMS,
    AGENT_ACTIONS,
};
use crate::projects::{slugify, SidebarRow};
use crate::tui::{ApiOutcome, AppEvent};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Shared single-line edit handling for the chat input and modal fields.
/// Returns true when the key was consumed.
fn edit_text(text: &mut String, cursor: &mut usize, code: KeyCode) -> bool {
    match code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = text.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = text.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = text.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            reap_chat_task(app).await;
        }
        AppEvent::Poll => {
            app.poll_panel();
        }
        AppEvent::Api(outcome) => apply_outcome(app, outcome),
    }
    Ok(())
}

/// Collect the chat send once its task has finished. Join failures read as
/// an unreachable server; backend failures carry the backend's own message.
async fn reap_chat_task(app: &mut App) {
    let finished = app
        .chat_task
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if !finished {
        return;
    }
    let task = app.chat_task.take().unwrap();
    let result = match task.await {
        Ok(Ok(reply)) => Ok((reply.response, reply.timestamp)),
        Ok(Err(e)) => Err(format!("Error: {}", e)),
        Err(_) => Err("Error: could not reach server.".to_string()),
    };
    if let Some(pending) = app.chat_pending.take() {
        app.conversations.resolve(&pending.key, pending.index, result);
        if app.active_key().as_deref() == Some(pending.key.as_str()) {
            app.scroll_chat_to_bottom();
        }
    }
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    if app.modal.is_some() {
        handle_modal_key(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Focus cycling
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Input,
                FocusPane::Input => FocusPane::Status,
                FocusPane::Status => FocusPane::Sidebar,
            };
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.tree.nav_down(),
            FocusPane::Chat => app.chat_scroll = app.chat_scroll.saturating_add(1),
            _ => {}
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.tree.nav_up(),
            FocusPane::Chat => app.chat_scroll = app.chat_scroll.saturating_sub(1),
            _ => {}
        },
        KeyCode::Char('g') => {
            if app.focus == FocusPane::Chat {
                app.chat_scroll = 0;
            }
        }
        KeyCode::Char('G') => {
            if app.focus == FocusPane::Chat {
                app.scroll_chat_to_bottom();
            }
        }

        // Expand a project folder or pick a category
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            if app.focus == FocusPane::Sidebar {
                sidebar_enter(app);
            }
        }

        // Edit the chat input
        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        // Toggles
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('b') => app.sidebar_visible = !app.sidebar_visible,
        KeyCode::Char('p') => app.panel.toggle_pause(),
        KeyCode::Char('L') => app.request_toggle_presence(),
        KeyCode::Char('R') => {
            app.request_projects();
            app.flash("Refreshing projects...");
        }

        // Modals
        KeyCode::Char('n') => {
            app.modal = Some(Modal::NewProject {
                name: String::new(),
                cursor: 0,
            });
        }
        KeyCode::Char('u') => {
            app.modal = Some(Modal::Upload {
                path: String::new(),
                cursor: 0,
            });
        }
        KeyCode::Char('c') => {
            app.modal = Some(Modal::ConnectPlatform(crate::app::ConnectForm::new()));
        }
        KeyCode::Char('a') => {
            app.modal = Some(Modal::NewAgent(crate::app::AgentForm::new()));
        }
        KeyCode::Char('r') => {
            let mut state = ratatui::widgets::ListState::default();
            state.select(Some(0));
            app.modal = Some(Modal::Actions { state });
        }

        KeyCode::Esc => app.flash = None,
        _ => {}
    }
}

fn sidebar_enter(app: &mut App) {
    match app.tree.selected_row() {
        Some(SidebarRow::Project(idx)) => {
            let key = app.tree.projects[idx].key.clone();
            app.tree.toggle(&key);
            app.persist_open_project();
        }
        Some(SidebarRow::Category(idx, category)) => {
            let project = app.tree.projects[idx].key.clone();
            app.tree.select(&project, category);
            if let Some(key) = app.active_key() {
                app.request_memory(key, project);
            }
            app.scroll_chat_to_bottom();
        }
        None => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_chat();
        }
        code => {
            edit_text(&mut app.input, &mut app.cursor, code);
        }
    }
}

fn handle_modal_key(app: &mut App, key: KeyEvent) {
    let Some(mut modal) = app.modal.take() else {
        return;
    };

    if key.code == KeyCode::Esc {
        return; // modal stays closed
    }

    let mut keep = true;
    match &mut modal {
        Modal::NewProject { name, cursor } => {
            if key.code == KeyCode::Enter {
                let trimmed = name.trim().to_string();
                if trimmed.is_empty() {
                    app.flash("Project name cannot be empty");
                } else {
                    let project_key = slugify(&trimmed);
                    app.request_create_project(trimmed, project_key);
                    keep = false;
                }
            } else {
                edit_text(name, cursor, key.code);
            }
        }

        Modal::Upload { path, cursor } => {
            if key.code == KeyCode::Enter {
                let trimmed = path.trim().to_string();
                if trimmed.is_empty() {
                    app.flash("Enter a file path");
                } else if let Some(project) = app.tree.active_project().map(str::to_string) {
                    app.request_upload(project, PathBuf::from(trimmed));
                    app.flash("Uploading...");
                    keep = false;
                } else {
                    app.flash("Open a project first");
                }
            } else {
                edit_text(path, cursor, key.code);
            }
        }

        Modal::ConnectPlatform(form) => match key.code {
            KeyCode::Tab | KeyCode::Down => {
                form.field = next_connect_field(form.field, form.platform());
                form.cursor = 0;
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.field = prev_connect_field(form.field, form.platform());
                form.cursor = 0;
            }
            KeyCode::Left | KeyCode::Right
                if form.field == ConnectField::Platform =>
            {
                let len = PLATFORMS.len();
                form.platform_idx = if key.code == KeyCode::Right {
                    (form.platform_idx + 1) % len
                } else {
                    (form.platform_idx + len - 1) % len
                };
            }
            KeyCode::Enter => {
                let platform = form.platform().to_string();
                let credentials = if platform_takes_token(&platform) {
                    let token = form.token.trim().to_string();
                    if token.is_empty() {
                        app.flash("Token cannot be empty");
                        app.modal = Some(modal);
                        return;
                    }
                    Credentials::Token(token)
                } else {
                    let username = form.username.trim().to_string();
                    let password = form.password.clone();
                    if username.is_empty() || password.is_empty() {
                        app.flash("Username and password required");
                        app.modal = Some(modal);
                        return;
                    }
                    Credentials::Login { username, password }
                };
                if let Some(project) = app.tree.active_project().map(str::to_string) {
                    app.request_connect_platform(project, platform, credentials);
                    app.flash("Connecting...");
                    keep = false;
                } else {
                    app.flash("Open a project first");
                }
            }
            code => {
                let (text, cursor) = match form.field {
                    ConnectField::Platform => {
                        app.modal = Some(modal);
                        return;
                    }
                    ConnectField::Token => (&mut form.token, &mut form.cursor),
                    ConnectField::Username => (&mut form.username, &mut form.cursor),
                    ConnectField::Password => (&mut form.password, &mut form.cursor),
                };
                edit_text(text, cursor, code);
            }
        },

        Modal::NewAgent(form) => match key.code {
            KeyCode::Tab | KeyCode::Down => {
                form.field = match form.field {
                    AgentField::Name => AgentField::Role,
                    AgentField::Role => AgentField::BaseBehavior,
                    AgentField::BaseBehavior => AgentField::Name,
                };
                form.cursor = 0;
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.field = match form.field {
                    AgentField::Name => AgentField::BaseBehavior,
                    AgentField::Role => AgentField::Name,
                    AgentField::BaseBehavior => AgentField::Role,
                };
                form.cursor = 0;
            }
            KeyCode::Enter => {
                let name = form.name.trim().to_string();
                let role = form.role.trim().to_string();
                if name.is_empty() || role.is_empty() {
                    app.flash("Agent name and role are required");
                } else {
                    app.request_create_agent(name, role, form.base_behavior.trim().to_string());
                    keep = false;
                }
            }
            code => {
                let (text, cursor) = match form.field {
                    AgentField::Name => (&mut form.name, &mut form.cursor),
                    AgentField::Role => (&mut form.role, &mut form.cursor),
                    AgentField::BaseBehavior => (&mut form.base_behavior, &mut form.cursor),
                };
                edit_text(text, cursor, code);
            }
        },

        Modal::Actions { state } => match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                let next = state
                    .selected()
                    .map(|i| (i + 1).min(AGENT_ACTIONS.len() - 1))
                    .unwrap_or(0);
                state.select(Some(next));
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let prev = state.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
                state.select(Some(prev));
            }
            KeyCode::Enter => {
                if let Some(idx) = state.selected() {
                    let (label, agent, action) = AGENT_ACTIONS[idx];
                    if let Some(key) = app.active_key() {
                        app.request_run_action(key, agent.to_string(), action.to_string());
                        app.flash(format!("Running: {}", label));
                        keep = false;
                    } else {
                        app.flash("Select a project category first");
                    }
                }
            }
            _ => {}
        },
    }

    if keep {
        app.modal = Some(modal);
    }
}

fn next_connect_field(field: ConnectField, platform: &str) -> ConnectField {
    if platform_takes_token(platform) {
        match field {
            ConnectField::Platform => ConnectField::Token,
            _ => ConnectField::Platform,
        }
    } else {
        match field {
            ConnectField::Platform => ConnectField::Username,
            ConnectField::Username => ConnectField::Password,
            _ => ConnectField::Platform,
        }
    }
}

fn prev_connect_field(field: ConnectField, platform: &str) -> ConnectField {
    if platform_takes_token(platform) {
        match field {
            ConnectField::Platform => ConnectField::Token,
            _ => ConnectField::Platform,
        }
    } else {
        match field {
            ConnectField::Platform => ConnectField::Password,
            ConnectField::Password => ConnectField::Username,
            _ => ConnectField::Platform,
        }
    }
}

fn apply_outcome(app: &mut App, outcome: ApiOutcome) {
    match outcome {
        ApiOutcome::ProjectsLoaded(Ok(raw)) => {
            app.tree.apply_loaded(raw);
            if let Some(open) = app.prefs.open_project.clone() {
                app.tree.open_if_present(&open);
            }
        }
        ApiOutcome::ProjectsLoaded(Err(e)) => {
            app.flash(format!("Could not load projects: {}", e));
        }

        ApiOutcome::ProjectCreated { name, key } => {
            app.tree.insert_created(name.clone(), key.clone());
            app.tree.open_if_present(&key);
            app.persist_open_project();
            app.flash(format!("Created project: {}", name));
        }
        ApiOutcome::ProjectCreateFailed(e) => {
            app.flash(format!("Create failed: {}", e));
        }

        ApiOutcome::MemoryLoaded { key, messages } => {
            app.conversations.seed(&key, messages);
            if app.active_key().as_deref() == Some(key.as_str()) {
                app.scroll_chat_to_bottom();
            }
        }

        ApiOutcome::PollFetched { seq, update } => {
            app.panel.apply(seq, update);
        }

        ApiOutcome::Uploaded { files } => {
            app.flash(format!("Uploaded {} file(s)", files.len()));
        }
        ApiOutcome::UploadFailed(e) => {
            app.flash(format!("Upload failed: {}", e));
        }

        ApiOutcome::PlatformConnected { platform } => {
            if app.prefs.link_account(&platform) {
                let _ = app.prefs.save();
            }
            app.flash(format!("{} connected", platform));
        }
        ApiOutcome::PlatformConnectFailed(e) => {
            app.flash(format!("Connect failed: {}", e));
        }

        ApiOutcome::AgentCreated { name } => {
            app.flash(format!("Agent created: {}", name));
        }
        ApiOutcome::AgentCreateFailed(e) => {
            app.flash(format!("Agent create failed: {}", e));
        }

        ApiOutcome::PresenceChanged { mode } => {
            app.panel.set_mode(mode.clone());
            app.flash(format!("Mode: {}", mode));
        }
        ApiOutcome::PresenceFailed(e) => {
            app.flash(format!("Presence change failed: {}", e));
        }

        ApiOutcome::ActionReply { key, result } => {
            match result {
                Ok(reply) => {
                    app.conversations
                        .push_assistant(&key, reply.response, reply.timestamp);
                }
                Err(e) => {
                    app.conversations
                        .push_assistant(&key, format!("Error: {}", e), None);
                }
            }
            if app.active_key().as_deref() == Some(key.as_str()) {
                app.scroll_chat_to_bottom();
            }
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling: whichever pane the pointer is over
    let in_sidebar = app
        .sidebar_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            } else if in_sidebar {
                app.tree.nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            } else if in_sidebar {
                app.tree.nav_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_text_inserts_at_cursor() {
        let mut text = "helo".to_string();
        let mut cursor = 3;
        edit_text(&mut text, &mut cursor, KeyCode::Char('l'));
        assert_eq!(text, "hello");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn edit_text_handles_multibyte() {
        let mut text = "café".to_string();
        let mut cursor = 4;
        edit_text(&mut text, &mut cursor, KeyCode::Backspace);
        assert_eq!(text, "caf");
        assert_eq!(cursor, 3);
        edit_text(&mut text, &mut cursor, KeyCode::Char('é'));
        assert_eq!(text, "café");
    }

    #[test]
    fn connect_field_order_depends_on_platform() {
        assert_eq!(
            next_connect_field(ConnectField::Platform, "TikTok"),
            ConnectField::Token
        );
        assert_eq!(
            next_connect_field(ConnectField::Platform, "Gmail"),
            ConnectField::Username
        );
        assert_eq!(
            next_connect_field(ConnectField::Username, "Gmail"),
            ConnectField::Password
        );
    }
}
