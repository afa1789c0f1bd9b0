use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{Activity, App, CredField, InputMode, StatusKind};
use crate::session::ChatRole;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);

    // Popups (in order of priority)
    if let Some(code) = app.viewer_code.clone() {
        render_code_viewer(app, frame, area, &code);
    } else if app.show_credentials_editor {
        render_credentials_editor(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let activity = match app.activity {
        Activity::Idle => String::new(),
        Activity::Generating => format!(" generating{}", dots(app.animation_frame)),
        Activity::Running => format!(" running{}", dots(app.animation_frame)),
    };

    let title = Line::from(vec![
        Span::styled(" blendmate ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.selected_model),
            Style::default().fg(Color::White),
        ),
        Span::styled(activity, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn dots(frame: u8) -> String {
    ".".repeat((frame as usize) + 1)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chat_focused = app.input_mode == InputMode::Normal;
    let border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let inner = block.inner(area);
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    if app.history.is_empty() && app.activity == Activity::Idle {
        let placeholder = Paragraph::new(
            "Describe what you want to happen in the scene, e.g. \"add a cube at the origin\"",
        )
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true })
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for (idx, msg) in app.history.iter().enumerate() {
        let selected = chat_focused && app.selected_message == Some(idx);

        let (label, label_color) = match msg.role {
            ChatRole::User => ("You:", Color::Cyan),
            ChatRole::Assistant => ("Assistant:", Color::Yellow),
        };
        let label_style = if selected {
            Style::default().fg(Color::Black).bg(label_color).bold()
        } else {
            Style::default().fg(label_color).bold()
        };

        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(label, label_style)));
                lines.push(Line::from(msg.content.as_str()));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(vec![
                    Span::styled(label, label_style),
                    Span::styled(
                        "  (Enter to view code)",
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));
                for line in msg.content.lines() {
                    lines.push(Line::from(Span::styled(
                        line,
                        Style::default().fg(Color::Green),
                    )));
                }
            }
        }
        lines.push(Line::default());
    }

    match app.activity {
        Activity::Generating => {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).bold(),
            )));
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots(app.animation_frame)),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        Activity::Running => {
            lines.push(Line::from(Span::styled(
                format!("Running generated code{}", dots(app.animation_frame)),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        Activity::Idle => {}
    }

    let total_lines = lines.len() as u16;

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);

    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Your message ");

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::White))
        .block(block);

    frame.render_widget(input, area);

    if editing && !app.show_credentials_editor && !app.show_model_picker {
        frame.set_cursor_position((area.x + 1 + app.input_cursor as u16, area.y + 1));
    }
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let Some((kind, message)) = &app.status else {
        frame.render_widget(Paragraph::new(""), area);
        return;
    };

    let style = match kind {
        StatusKind::Info => Style::default().fg(Color::Green),
        StatusKind::Error => Style::default().fg(Color::Red).bold(),
    };

    let status = Paragraph::new(Line::from(Span::styled(format!(" {}", message), style)));
    frame.render_widget(status, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = if app.viewer_code.is_some() {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]
    } else if app.show_credentials_editor {
        vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" next field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" test + save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else if app.show_model_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" chat keys ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" select ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" code ", label_style),
                Span::styled(" d ", key_style),
                Span::styled(" delete ", label_style),
                Span::styled(" C ", key_style),
                Span::styled(" clear ", label_style),
                Span::styled(" M ", key_style),
                Span::styled(" model ", label_style),
                Span::styled(" K ", key_style),
                Span::styled(" keys ", label_style),
                Span::styled(" T ", key_style),
                Span::styled(" test ", label_style),
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(40, 40, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Model ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|m| ListItem::new(format!(" {} ", m)))
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

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn render_credentials_editor(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 50, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" OpenAI credentials ");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [key_area, project_area, org_area, hint_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    // The key is secret material, render it masked.
    let masked_key: String = "•".repeat(app.cred_api_key.chars().count());

    render_cred_field(
        frame,
        key_area,
        " API key (sk-proj-...) ",
        &masked_key,
        app.cred_field == CredField::ApiKey,
    );
    render_cred_field(
        frame,
        project_area,
        " Project ID (proj_...) ",
        &app.cred_project_id,
        app.cred_field == CredField::ProjectId,
    );
    render_cred_field(
        frame,
        org_area,
        " Organization ID (optional) ",
        &app.cred_organization_id,
        app.cred_field == CredField::OrganizationId,
    );

    let hint = Paragraph::new("Enter runs a connection test and saves on success.")
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(hint, hint_area);

    let (field_area, shown_len) = match app.cred_field {
        CredField::ApiKey => (key_area, masked_key.chars().count()),
        CredField::ProjectId => (project_area, app.cred_project_id.chars().count()),
        CredField::OrganizationId => (org_area, app.cred_organization_id.chars().count()),
    };
    let cursor = app.cred_cursor.min(shown_len) as u16;
    frame.set_cursor_position((field_area.x + 1 + cursor, field_area.y + 1));
}

fn render_cred_field(frame: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
        .title(title.to_string());

    let field = Paragraph::new(value).block(block);
    frame.render_widget(field, area);
}

fn render_code_viewer(app: &App, frame: &mut Frame, area: Rect, code: &str) {
    let popup = centered_rect(80, 80, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Generated code (read-only) ");

    let lines: Vec<Line> = code
        .lines()
        .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Green))))
        .collect();
    let total = lines.len() as u16;

    let viewer = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.viewer_scroll, 0));

    frame.render_widget(viewer, popup);

    let visible = popup.height.saturating_sub(2);
    if total > visible {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut state = ScrollbarState::new(total as usize).position(app.viewer_scroll as usize);
        frame.render_stateful_widget(
            scrollbar,
            popup.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut state,
        );
    }
}

/// Centered popup rectangle, sized as a percentage of the containing area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);

    center
}
