use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ChatReply, Credentials};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::prefs::{Prefs, Theme};
use crate::projects::ProjectTree;
use crate::status::{PollUpdate, StatusPanel};
use crate::tui::{ApiOutcome, AppEvent};

/// Projects shown before the backend list loads (or when it never does).
pub const DEFAULT_PROJECTS: [&str; 3] = ["remote100k", "tradeview_ai", "app_304"];

/// Platforms offered by the connect form. The first three take a token,
/// the rest a username/password pair.
pub const PLATFORMS: [&str; 4] = ["TikTok", "Instagram", "Facebook", "Gmail"];

pub fn platform_takes_token(platform: &str) -> bool {
    matches!(
        platform.to_lowercase().as_str(),
        "tiktok" | "instagram" | "facebook"
    )
}

/// Canned agent actions: (label, agent, action).
pub const AGENT_ACTIONS: [(&str, &str, &str); 6] = [
    ("Write React Component", "dev", "react_component"),
    ("Fix Backend Bug", "dev", "fix_backend_bug"),
    ("Draft Outreach Post", "growth", "outreach_post"),
    ("Scrape Competitors", "growth", "scrape_competitors"),
    ("Summarize Tickets", "support", "summarize_tickets"),
    ("Check Deploy Health", "ops", "deploy_health"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectField {
    Platform,
    Token,
    Username,
    Password,
}

pub struct ConnectForm {
    pub platform_idx: usize,
    pub field: ConnectField,
    pub token: String,
    pub username: String,
    pub password: String,
    pub cursor: usize,
}

impl ConnectForm {
    pub fn new() -> Self {
        Self {
            platform_idx: 0,
            field: ConnectField::Platform,
            token: String::new(),
            username: String::new(),
            password: String::new(),
            cursor: 0,
        }
    }

    pub fn platform(&self) -> &'static str {
        PLATFORMS[self.platform_idx]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentField {
    Name,
    Role,
    BaseBehavior,
}

pub struct AgentForm {
    pub field: AgentField,
    pub name: String,
    pub role: String,
    pub base_behavior: String,
    pub cursor: usize,
}

impl AgentForm {
    pub fn new() -> Self {
        Self {
            field: AgentField::Name,
            name: String::new(),
            role: String::new(),
            base_behavior: String::new(),
            cursor: 0,
        }
    }
}

pub enum Modal {
    NewProject { name: String, cursor: usize },
    Upload { path: String, cursor: usize },
    ConnectPlatform(ConnectForm),
    NewAgent(AgentForm),
    Actions { state: ListState },
}

/// The chat send currently in flight: which conversation it belongs to and
/// where its placeholder sits.
pub struct PendingChat {
    pub key: String,
    pub index: usize,
}

pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,
    pub theme: Theme,
    pub sidebar_visible: bool,
    pub modal: Option<Modal>,
    /// One-line status/error text shown in the footer.
    pub flash: Option<String>,

    // Chat input
    pub input: String,
    pub cursor: usize,

    // Chat pane geometry (updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    pub animation_frame: u8,

    pub conversations: ConversationStore,
    pub tree: ProjectTree,
    pub panel: StatusPanel,
    pub prefs: Prefs,
    pub api: ApiClient,

    // In-flight chat send
    pub chat_task: Option<JoinHandle<anyhow::Result<ChatReply>>>,
    pub chat_pending: Option<PendingChat>,

    events: mpsc::UnboundedSender<AppEvent>,

    // Pane areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub chat_area: Option<Rect>,
    pub status_area: Option<Rect>,
}

impl App {
    pub fn new(config: &Config, mut prefs: Prefs, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let api = ApiClient::new(&config.base_url, config.basic_auth());

        // A credentialed launch counts as logged in.
        if config.basic_auth().is_some() && !prefs.logged_in {
            prefs.logged_in = true;
            let _ = prefs.save();
        }

        let mut tree = ProjectTree::new(&DEFAULT_PROJECTS);
        if let Some(open) = prefs.open_project.clone() {
            tree.open_if_present(&open);
        }

        let theme = prefs.theme;

        Self {
            should_quit: false,
            focus: FocusPane::Sidebar,
            input_mode: InputMode::Normal,
            theme,
            sidebar_visible: true,
            modal: None,
            flash: None,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            conversations: ConversationStore::new(),
            tree,
            panel: StatusPanel::new(),
            prefs,
            api,

            chat_task: None,
            chat_pending: None,

            events,

            sidebar_area: None,
            chat_area: None,
            status_area: None,
        }
    }

    pub fn active_key(&self) -> Option<String> {
        self.tree.active_key()
    }

    pub fn flash(&mut self, text: impl Into<String>) {
        self.flash = Some(text.into());
    }

    /// Advance the ellipsis frame while a reply is pending.
    pub fn tick_animation(&mut self) {
        if self.chat_pending.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.prefs.theme = self.theme;
        let _ = self.prefs.save();
    }

    /// Scroll the chat pane so the newest message (or the pending
    /// placeholder) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let Some(key) = self.active_key() else {
            return;
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversations.messages(&key) {
            total_lines += 1; // role line
            if msg.pending {
                total_lines += 1;
            } else {
                for line in msg.content.lines() {
                    let char_count = line.chars().count();
                    total_lines += char_count.div_ceil(wrap_width).max(1) as u16;
                }
            }
            total_lines += 1; // blank separator
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Kick the initial (or a manual) project list fetch.
    pub fn request_projects(&self) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = api.fetch_projects().await.map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::Api(ApiOutcome::ProjectsLoaded(result)));
        });
    }

    /// Submit the chat input for the active conversation. Returns true when
    /// a send was actually started. Only one send can be in flight at a
    /// time; the pending placeholder always belongs to the held task.
    pub fn submit_chat(&mut self) -> bool {
        let Some(key) = self.active_key() else {
            self.flash("Select a project category first");
            return false;
        };
        if self.input.trim().is_empty() {
            return false;
        }
        if self.chat_task.is_some() || self.conversations.is_pending(&key) {
            self.flash("Still waiting for the agent to reply");
            return false;
        }
        let text = self.input.clone();
        let Some(index) = self.conversations.begin_send(&key, &text) else {
            return false;
        };
        self.input.clear();
        self.cursor = 0;

        let api = self.api.clone();
        self.chat_task = Some(tokio::spawn(async move { api.send_chat(&text).await }));
        self.chat_pending = Some(PendingChat { key, index });
        self.scroll_chat_to_bottom();
        true
    }

    /// Issue one poll of status/queue/history, tagged with its sequence
    /// number. Skipped entirely while paused.
    pub fn poll_panel(&mut self) {
        let Some(seq) = self.panel.begin_poll() else {
            return;
        };
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let status = api.fetch_status().await.ok();
            let queue = api.fetch_queue().await.ok();
            let history = api.fetch_logs().await.ok();
            let _ = tx.send(AppEvent::Api(ApiOutcome::PollFetched {
                seq,
                update: PollUpdate {
                    status,
                    queue,
                    history,
                },
            }));
        });
    }

    /// Load backend memory for a project the first time one of its
    /// conversations is opened.
    pub fn request_memory(&self, key: String, project: String) {
        if !self.conversations.messages(&key).is_empty() {
            return;
        }
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            if let Ok(messages) = api.fetch_memory(&project).await {
                let _ = tx.send(AppEvent::Api(ApiOutcome::MemoryLoaded { key, messages }));
            }
        });
    }

    pub fn request_create_project(&self, name: String, key: String) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            match api.create_project(&name, &key).await {
                Ok(reply) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::ProjectCreated {
                        name: reply.name,
                        key: reply.key.unwrap_or(key),
                    }));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::ProjectCreateFailed(e.to_string())));
                }
            }
        });
    }

    pub fn request_upload(&self, project: String, path: std::path::PathBuf) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            match api.upload_files(&project, &[path]).await {
                Ok(reply) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::Uploaded { files: reply.files }));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::UploadFailed(e.to_string())));
                }
            }
        });
    }

    pub fn request_connect_platform(
        &self,
        project: String,
        platform: String,
        credentials: Credentials,
    ) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            match api.connect_platform(&project, &platform, &credentials).await {
                Ok(()) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::PlatformConnected { platform }));
                }
                Err(e) => {
                    let _ =
                        tx.send(AppEvent::Api(ApiOutcome::PlatformConnectFailed(e.to_string())));
                }
            }
        });
    }

    pub fn request_create_agent(&self, name: String, role: String, base_behavior: String) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            match api.create_agent(&name, &role, &base_behavior).await {
                Ok(()) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::AgentCreated { name }));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::AgentCreateFailed(e.to_string())));
                }
            }
        });
    }

    pub fn request_run_action(&self, key: String, agent: String, action: String) {
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = api
                .run_agent_action(&agent, &action, None)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::Api(ApiOutcome::ActionReply { key, result }));
        });
    }

    /// Flip presence: when the panel reports "logan" mode the user is
    /// already here, so announce absence, and vice versa.
    pub fn request_toggle_presence(&self) {
        let present = !self.panel.mode().eq_ignore_ascii_case("logan");
        let api = self.api.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            match api.set_presence(present).await {
                Ok(mode) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::PresenceChanged { mode }));
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Api(ApiOutcome::PresenceFailed(e.to_string())));
                }
            }
        });
    }

    /// Remember which project folder is open across restarts.
    pub fn persist_open_project(&mut self) {
        self.prefs.open_project = self.tree.open.clone();
        let _ = self.prefs.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::Category;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(&Config::new(), Prefs::default(), tx)
    }

    #[tokio::test]
    async fn one_send_in_flight_blocks_every_conversation() {
        let mut app = test_app();
        app.tree.select("remote100k", Category::Slides);
        app.input = "first".to_string();
        assert!(app.submit_chat());
        assert!(app.chat_task.is_some());

        // Switching conversations must not start a second send: the single
        // task slot still belongs to the first placeholder.
        app.tree.select("app_304", Category::Slides);
        app.input = "second".to_string();
        assert!(!app.submit_chat());
        assert!(app.conversations.messages("app_304/slides").is_empty());
        assert_eq!(app.input, "second");
        assert_eq!(
            app.chat_pending.as_ref().map(|p| p.key.as_str()),
            Some("remote100k/slides")
        );
        assert!(app.conversations.is_pending("remote100k/slides"));
    }

    #[test]
    fn bottom_scroll_counts_exact_width_lines_once() {
        let mut app = test_app();
        app.tree.select("remote100k", Category::Slides);
        app.chat_width = 10;
        app.chat_height = 4;

        let key = app.active_key().unwrap();
        // Content exactly as wide as the pane wraps to a single line.
        let index = app.conversations.begin_send(&key, "0123456789").unwrap();
        app.conversations.resolve(&key, index, Ok(("ok".to_string(), None)));

        app.scroll_chat_to_bottom();
        // 3 lines per message (role, content, blank), 6 total, height 4.
        assert_eq!(app.chat_scroll, 2);
    }
}
