use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{
    AgentField, App, ConnectField, FocusPane, InputMode, Modal, AGENT_ACTIONS, PLATFORMS,
};
use crate::app::platform_takes_token;
use crate::conversation::Role;
use crate::prefs::Theme;
use crate::projects::SidebarRow;

/// Colors that differ between the light and dark themes. Everything else
/// uses the terminal defaults.
struct Palette {
    accent: Color,
    dim: Color,
    user: Color,
    agent: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            accent: Color::Cyan,
            dim: Color::DarkGray,
            user: Color::Cyan,
            agent: Color::Yellow,
        },
        Theme::Light => Palette {
            accent: Color::Blue,
            dim: Color::Gray,
            user: Color::Blue,
            agent: Color::Magenta,
        },
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_body(app, frame, body_area);
    render_footer(app, frame, footer_area);

    if app.modal.is_some() {
        render_modal(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);

    let mode = app.panel.mode().to_string();
    let linked = app.prefs.linked_accounts.len();
    let linked_indicator = if linked > 0 {
        format!(" [{} linked]", linked)
    } else {
        String::new()
    };
    let paused_indicator = if app.panel.paused { " [paused]" } else { "" };
    let auth_indicator = if app.prefs.logged_in { " [auth]" } else { "" };

    let title = Line::from(vec![
        Span::styled(" AJAX Dashboard ", Style::default().fg(pal.accent).bold()),
        Span::styled(format!("mode: {}", mode), Style::default().fg(pal.agent)),
        Span::styled(paused_indicator, Style::default().fg(pal.dim)),
        Span::styled(auth_indicator, Style::default().fg(pal.dim)),
        Span::styled(linked_indicator, Style::default().fg(pal.dim)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(pal.dim),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_body(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.sidebar_visible {
        let [sidebar_area, chat_column, status_area] = Layout::horizontal([
            Constraint::Length(28),
            Constraint::Min(0),
            Constraint::Length(32),
        ])
        .areas(area);
        render_sidebar(app, frame, sidebar_area);
        render_chat_column(app, frame, chat_column);
        render_status(app, frame, status_area);
        app.sidebar_area = Some(sidebar_area);
        app.status_area = Some(status_area);
    } else {
        let [chat_column, status_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(32)]).areas(area);
        render_chat_column(app, frame, chat_column);
        render_status(app, frame, status_area);
        app.sidebar_area = None;
        app.status_area = Some(status_area);
    }
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { pal.accent } else { pal.dim };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Projects ");

    let active = app.tree.active.clone();
    let items: Vec<ListItem> = app
        .tree
        .rows()
        .iter()
        .map(|row| match row {
            SidebarRow::Project(idx) => {
                let project = &app.tree.projects[*idx];
                let open = app.tree.open.as_deref() == Some(project.key.as_str());
                let arrow = if open { "▾" } else { "▸" };
                ListItem::new(format!("{} {}", arrow, project.name))
                    .style(Style::default().add_modifier(Modifier::BOLD))
            }
            SidebarRow::Category(idx, category) => {
                let project = &app.tree.projects[*idx];
                let is_active = active
                    .as_ref()
                    .map(|(key, cat)| key == &project.key && cat == category)
                    .unwrap_or(false);
                let marker = if is_active { "*" } else { " " };
                let style = if is_active {
                    Style::default().fg(pal.accent)
                } else {
                    Style::default()
                };
                ListItem::new(format!("  {} {}", marker, category.label())).style(style)
            }
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.tree.list_state);
}

fn render_chat_column(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    app.chat_area = Some(chat_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { pal.accent } else { pal.dim };

    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let title = match app.active_key() {
        Some(key) => format!(" Chat: {} ", key),
        None => " Chat ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let messages = match app.active_key() {
        Some(key) => app.conversations.messages(&key).to_vec(),
        None => Vec::new(),
    };

    let chat_text = if app.active_key().is_none() {
        Text::from(Span::styled(
            "Pick a project category in the sidebar to start chatting...",
            Style::default().fg(pal.dim),
        ))
    } else if messages.is_empty() {
        Text::from(Span::styled(
            "Ask the agent anything...",
            Style::default().fg(pal.dim),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for msg in &messages {
            match msg.role {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(pal.user).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                }
                Role::Assistant => {
                    let label = match &msg.timestamp {
                        Some(ts) => format!("Agent ({}):", ts),
                        None => "Agent:".to_string(),
                    };
                    lines.push(Line::from(Span::styled(
                        label,
                        Style::default().fg(pal.agent).add_modifier(Modifier::BOLD),
                    )));
                    if msg.pending {
                        // Animated ellipsis: cycles through ".", "..", "..."
                        let dots = ".".repeat((app.animation_frame as usize) + 1);
                        lines.push(Line::from(Span::styled(
                            format!("Thinking{}", dots),
                            Style::default().fg(pal.dim).add_modifier(Modifier::ITALIC),
                        )));
                    } else {
                        for line in msg.content.lines() {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                }
            }
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);
    let focused = app.focus == FocusPane::Input;
    let border_color = if focused || app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        pal.dim
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message (i to edit) ");

    // Horizontal scroll keeps the cursor visible in a narrow input
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(pal.user))
        .block(block);

    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);
    let focused = app.focus == FocusPane::Status;
    let border_color = if focused { pal.accent } else { pal.dim };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Agent Status ");

    let label = Style::default().fg(pal.dim);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(vec![
        Span::styled("Mode: ", label),
        Span::styled(
            app.panel.mode().to_string(),
            Style::default().fg(pal.agent).bold(),
        ),
    ]));

    let live = app
        .panel
        .status
        .as_ref()
        .map(|s| s.live_status.clone())
        .unwrap_or_else(|| {
            let fallback = if app.panel.running() { "working" } else { "idle" };
            fallback.to_string()
        });
    lines.push(Line::from(vec![
        Span::styled("Status: ", label),
        Span::raw(live),
    ]));

    if let Some(status) = &app.panel.status {
        if !status.current_task.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Working on: ", label),
                Span::raw(status.current_task.clone()),
            ]));
        }
    }

    if app.panel.status_failed {
        lines.push(Line::from(Span::styled("(status unavailable)", label)));
    }

    if let Some(next) = app.panel.next_task() {
        lines.push(Line::from(vec![
            Span::styled("Next up: ", label),
            Span::raw(next.task.clone()),
        ]));
    }
    if let Some(last) = app.panel.last_task() {
        lines.push(Line::from(vec![
            Span::styled("Last done: ", label),
            Span::raw(last.task.clone()),
        ]));
    }

    if app.panel.paused {
        lines.push(Line::from(Span::styled(
            "Polling paused (p to resume)",
            Style::default().fg(Color::Yellow),
        )));
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("Queue ({})", app.panel.queue.len()),
        Style::default().bold(),
    )));
    if app.panel.queue_failed {
        lines.push(Line::from(Span::styled("(unavailable)", label)));
    } else if app.panel.queue.is_empty() {
        lines.push(Line::from(Span::styled("Nothing queued", label)));
    } else {
        for entry in app.panel.queue.iter().take(5) {
            lines.push(Line::from(format!("- {}", entry.task)));
        }
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled("Recent", Style::default().bold())));
    let status_history = app
        .panel
        .status
        .as_ref()
        .map(|s| s.history.as_slice())
        .unwrap_or(&[]);
    if app.panel.history_failed {
        // Fall back to the activity lines the status endpoint carries
        if status_history.is_empty() {
            lines.push(Line::from(Span::styled("(unavailable)", label)));
        } else {
            for entry in status_history.iter().rev().take(8) {
                lines.push(Line::from(entry.clone()));
            }
        }
    } else if app.panel.history.is_empty() {
        lines.push(Line::from(Span::styled("No completed tasks", label)));
    } else {
        // Newest first
        for entry in app.panel.history.iter().rev().take(8) {
            let status = entry.status.as_deref().unwrap_or("done");
            lines.push(Line::from(vec![
                Span::styled(format!("{} ", entry.timestamp), label),
                Span::raw(entry.task.clone()),
                Span::styled(format!(" [{}]", status), label),
            ]));
        }
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(panel, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);

    if let Some(flash) = &app.flash {
        let line = Line::from(Span::styled(
            format!(" {} ", flash),
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(pal.dim);

    let hints: Vec<Span> = if app.modal.is_some() {
        vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" submit ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else if app.input_mode == InputMode::Editing {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
        ]
    } else {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" chat ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" project ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" connect ", label_style),
            Span::styled(" a ", key_style),
            Span::styled(" agent ", label_style),
            Span::styled(" u ", key_style),
            Span::styled(" upload ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" actions ", label_style),
            Span::styled(" t ", key_style),
            Span::styled(" theme ", label_style),
            Span::styled(" p ", key_style),
            Span::styled(" pause ", label_style),
            Span::styled(" L ", key_style),
            Span::styled(" presence ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

/// One labeled form line; active fields show their cursor.
fn form_field(
    frame: &mut Frame,
    area: Rect,
    label: &str,
    value: &str,
    cursor: usize,
    active: bool,
    mask: bool,
    pal: &Palette,
) {
    let display: String = if mask {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let style = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(pal.dim)
    };
    let line = Line::from(vec![
        Span::styled(format!("{:<10}", label), style),
        Span::raw(display),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    if active {
        let cursor_x = (10 + cursor.min(area.width.saturating_sub(11) as usize)) as u16;
        frame.set_cursor_position((area.x + cursor_x, area.y));
    }
}

fn render_modal(app: &mut App, frame: &mut Frame, area: Rect) {
    let pal = palette(app.theme);

    match app.modal.as_mut() {
        Some(Modal::NewProject { name, cursor }) => {
            let popup = centered_popup(area, 50, 5);
            frame.render_widget(Clear, popup);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(pal.accent))
                .title(" New Project (Enter to create, Esc to cancel) ");
            let inner = block.inner(popup);
            frame.render_widget(block, popup);
            form_field(
                frame,
                Rect::new(inner.x, inner.y + 1, inner.width, 1),
                "Name:",
                name,
                *cursor,
                true,
                false,
                &pal,
            );
        }

        Some(Modal::Upload { path, cursor }) => {
            let popup = centered_popup(area, 60, 5);
            frame.render_widget(Clear, popup);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(pal.accent))
                .title(" Upload File (Enter to upload, Esc to cancel) ");
            let inner = block.inner(popup);
            frame.render_widget(block, popup);
            form_field(
                frame,
                Rect::new(inner.x, inner.y + 1, inner.width, 1),
                "Path:",
                path,
                *cursor,
                true,
                false,
                &pal,
            );
        }

        Some(Modal::ConnectPlatform(form)) => {
            let popup = centered_popup(area, 55, 9);
            frame.render_widget(Clear, popup);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(pal.accent))
                .title(" Connect Platform ");
            let inner = block.inner(popup);
            frame.render_widget(block, popup);

            let platform = form.platform();
            let platform_style = if form.field == ConnectField::Platform {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(pal.dim)
            };
            let picker = Line::from(vec![
                Span::styled(format!("{:<10}", "Platform:"), platform_style),
                Span::raw("< "),
                Span::styled(platform, Style::default().bold()),
                Span::raw(" >"),
                Span::styled(
                    format!("  ({}/{})", form.platform_idx + 1, PLATFORMS.len()),
                    Style::default().fg(pal.dim),
                ),
            ]);
            frame.render_widget(
                Paragraph::new(picker),
                Rect::new(inner.x, inner.y, inner.width, 1),
            );

            if platform_takes_token(platform) {
                form_field(
                    frame,
                    Rect::new(inner.x, inner.y + 2, inner.width, 1),
                    "Token:",
                    &form.token,
                    form.cursor,
                    form.field == ConnectField::Token,
                    false,
                    &pal,
                );
            } else {
                form_field(
                    frame,
                    Rect::new(inner.x, inner.y + 2, inner.width, 1),
                    "Username:",
                    &form.username,
                    form.cursor,
                    form.field == ConnectField::Username,
                    false,
                    &pal,
                );
                form_field(
                    frame,
                    Rect::new(inner.x, inner.y + 3, inner.width, 1),
                    "Password:",
                    &form.password,
                    form.cursor,
                    form.field == ConnectField::Password,
                    true,
                    &pal,
                );
            }
        }

        Some(Modal::NewAgent(form)) => {
            let popup = centered_popup(area, 60, 9);
            frame.render_widget(Clear, popup);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(pal.accent))
                .title(" New Agent ");
            let inner = block.inner(popup);
            frame.render_widget(block, popup);

            form_field(
                frame,
                Rect::new(inner.x, inner.y + 1, inner.width, 1),
                "Name:",
                &form.name,
                form.cursor,
                form.field == AgentField::Name,
                false,
                &pal,
            );
            form_field(
                frame,
                Rect::new(inner.x, inner.y + 3, inner.width, 1),
                "Role:",
                &form.role,
                form.cursor,
                form.field == AgentField::Role,
                false,
                &pal,
            );
            form_field(
                frame,
                Rect::new(inner.x, inner.y + 5, inner.width, 1),
                "Behavior:",
                &form.base_behavior,
                form.cursor,
                form.field == AgentField::BaseBehavior,
                false,
                &pal,
            );
        }

        Some(Modal::Actions { state }) => {
            let popup = centered_popup(area, 45, (AGENT_ACTIONS.len() as u16) + 2);
            frame.render_widget(Clear, popup);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(pal.accent))
                .title(" Run Action (Enter to run, Esc to cancel) ");

            let items: Vec<ListItem> = AGENT_ACTIONS
                .iter()
                .map(|(label, agent, _)| {
                    ListItem::new(format!(" {} ({}) ", label, agent))
                })
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");

            frame.render_stateful_widget(list, popup, state);
        }

        None => {}
    }
}
