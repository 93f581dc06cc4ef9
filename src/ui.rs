use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{App, InputMode};
use crate::format::{self, Segment};
use crate::state::{ChatRole, ChatState, StatusLine};

fn link_style() -> Style {
    Style::default()
        .fg(Color::LightBlue)
        .add_modifier(Modifier::UNDERLINED)
}

/// Escape one line of message text and turn its URLs into link spans.
fn message_line(text: &str) -> Line<'static> {
    let escaped = format::escape(text);
    let spans: Vec<Span<'static>> = format::segments(&escaped)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => Span::raw(text.to_string()),
            Segment::Link(url) => Span::styled(url.to_string(), link_style()),
        })
        .collect();

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Lines of the message list for a given state. The typing placeholder is
/// always the last entry and there is never more than one.
pub fn message_lines(state: &ChatState, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in state.messages() {
        let label = match msg.role {
            ChatRole::User => Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            ChatRole::Assistant => Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        };
        lines.push(Line::from(label));
        for line in msg.content.lines() {
            lines.push(message_line(line));
        }
        lines.push(Line::default());
    }

    if state.is_typing() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize % 3) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// The message list as a wrapped paragraph, without its border. Rendering
/// and scroll bounds both go through this so they count the same rows.
pub fn chat_paragraph(state: &ChatState, animation_frame: u8) -> Paragraph<'static> {
    let text = if state.messages().is_empty() && !state.is_typing() {
        Text::from(Span::styled(
            "Say hello to your local model...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(message_lines(state, animation_frame))
    };

    Paragraph::new(text).wrap(Wrap { trim: false })
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(&app.state.status, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(status: &StatusLine, frame: &mut Frame, area: Rect) {
    let status_color = match status {
        StatusLine::Checking => Color::Gray,
        StatusLine::Running { .. } => Color::Green,
        StatusLine::Offline | StatusLine::Unreachable => Color::Red,
    };

    let title = Line::from(vec![
        Span::styled(" Ollama Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(status.text(), Style::default().fg(status_color).bold()),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and inner size for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let model = app.state.models.selected_model();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if model.is_empty() {
            " Chat ".to_string()
        } else {
            format!(" Chat: {} ", model)
        });

    let chat = chat_paragraph(&app.state, app.animation_frame)
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    let total_lines = app.chat_line_count();
    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state = ScrollbarState::new(total_lines as usize)
            .position(app.chat_scroll as usize);
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    let inner_width = area.width.saturating_sub(2) as usize;
    // Keep the cursor in view by scrolling the input horizontally
    let offset = app.state.cursor.saturating_sub(inner_width.saturating_sub(1));

    let input = Paragraph::new(app.state.input.as_str())
        .block(block)
        .scroll((0, offset as u16));
    frame.render_widget(input, area);

    if editing && !app.show_model_picker {
        let cursor_x = area.x + 1 + (app.state.cursor - offset) as u16;
        frame.set_cursor_position(Position::new(cursor_x, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.show_model_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" M ", key_style),
                Span::styled(" model ", label_style),
                Span::styled(" r ", key_style),
                Span::styled(" refresh ", label_style),
                Span::styled(" o ", key_style),
                Span::styled(" open link ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    // Enter does nothing while a reply is pending, so say why
    let pending = app.state.is_typing().then(|| {
        Span::styled(
            " waiting for reply ",
            Style::default().bg(Color::Black).fg(Color::Yellow).italic(),
        )
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(pending)
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [vertical] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(vertical);
    rect
}

/// Popup height for `count` entries plus borders. A placeholder takes one row.
fn picker_height(count: usize) -> u16 {
    u16::try_from(count.max(1))
        .unwrap_or(u16::MAX)
        .saturating_add(2)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let models = app.state.models.models();
    let height = picker_height(models.len()).min(area.height);
    let popup = centered_rect(40.min(area.width), height, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model ");

    frame.render_widget(Clear, popup);

    if let Some(placeholder) = app.state.models.placeholder() {
        let disabled = Paragraph::new(format!(" {} ", placeholder))
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            .block(block);
        frame.render_widget(disabled, popup);
        return;
    }

    let current = app.state.models.selected_index();
    let items: Vec<ListItem> = models
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let marker = if Some(i) == current { "*" } else { " " };
            ListItem::new(format!("{} {} ", marker, name))
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

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BackendClient, BackendStatus, ChatOutcome};
    use crate::state::SendOutcome;
    use crate::tui::AppEvent;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(BackendClient::new("http://127.0.0.1:9"), None, tx)
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_link_span_wraps_exact_url() {
        let line = message_line("see http://x.test");
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "see ");
        assert_eq!(line.spans[1].content, "http://x.test");
        assert_eq!(line.spans[1].style, link_style());
    }

    #[test]
    fn test_control_characters_never_rendered() {
        let line = message_line("a\u{1b}[2Jb");
        assert_eq!(line_text(&line), "a[2Jb");
    }

    #[test]
    fn test_typing_placeholder_is_last_and_single() {
        let mut state = ChatState::new();
        state.input = "hi".to_string();
        let SendOutcome::Dispatched(pending) = state.begin_send() else {
            panic!("expected dispatch");
        };

        let lines = message_lines(&state, 2);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["You:", "hi", "", "AI:", "Thinking..."]);

        state.finish_send(pending.id, Ok(ChatOutcome::Reply("hello".into())));
        let texts: Vec<String> = message_lines(&state, 0).iter().map(line_text).collect();
        assert!(!texts.iter().any(|t| t.starts_with("Thinking")));
        assert_eq!(texts.last().map(String::as_str), Some(""));
    }

    #[test]
    fn test_renders_status_and_messages() {
        let mut app = app();
        app.apply_backend_event(AppEvent::Status {
            generation: 0,
            result: Ok(BackendStatus {
                running: true,
                model_count: 3,
            }),
        });
        app.apply_backend_event(AppEvent::Models {
            generation: 0,
            result: Ok(vec!["llama3.2".into()]),
        });
        app.state.input = "hello there".to_string();
        app.state.begin_send();

        let screen = draw(&mut app);
        assert!(screen.contains("Ollama running (3 models)"));
        assert!(screen.contains("Chat: llama3.2"));
        assert!(screen.contains("hello there"));
        assert!(screen.contains("Thinking"));
    }

    #[test]
    fn test_pending_notice_is_in_footer() {
        let mut app = app();
        app.state.input = "hello".to_string();
        app.state.begin_send();

        let screen = draw(&mut app);
        let rows: Vec<&str> = screen.lines().collect();
        assert!(rows[rows.len() - 1].contains("waiting for reply"));
        assert!(!rows[..rows.len() - 1].iter().any(|r| r.contains("waiting for reply")));

        app.state.input = "again".to_string();
        assert!(matches!(app.state.begin_send(), SendOutcome::Busy));
        let screen = draw(&mut app);
        assert!(screen.lines().last().is_some_and(|r| r.contains("waiting for reply")));
    }

    #[test]
    fn test_long_reply_tail_visible_after_scroll_to_bottom() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        let mut terminal = Terminal::new(TestBackend::new(30, 14)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        app.state.input = "tell me something long".to_string();
        let SendOutcome::Dispatched(pending) = app.state.begin_send() else {
            panic!("expected dispatch");
        };
        let chunk = "aaaaaaaaaaaaaaaaaaaaa bbbbbbbbbbbbbbbbbbbbb ccccccc";
        let reply = format!("{} ENDMARK", vec![chunk; 5].join(" "));
        app.apply_backend_event(AppEvent::Reply {
            id: pending.id,
            result: Ok(ChatOutcome::Reply(reply)),
        });

        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content.iter().map(|cell| cell.symbol()).collect();
        assert!(app.chat_scroll > 0);
        assert!(screen.contains("ENDMARK"));
    }

    #[test]
    fn test_line_count_matches_rendered_rows() {
        let mut app = app();
        app.state.input = "x".to_string();
        let SendOutcome::Dispatched(pending) = app.state.begin_send() else {
            panic!("expected dispatch");
        };
        app.apply_backend_event(AppEvent::Reply {
            id: pending.id,
            result: Ok(ChatOutcome::Reply("alpha beta gamma delta epsilon".into())),
        });

        // Tall enough that nothing scrolls; count the rows that were drawn
        let mut terminal = Terminal::new(TestBackend::new(14, 40)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let chat_rows: Vec<String> = buffer
            .content
            .chunks(width)
            .skip(2)
            .take(app.chat_height as usize)
            .map(|row| row[1..width - 1].iter().map(|c| c.symbol()).collect())
            .collect();
        let last_drawn = chat_rows
            .iter()
            .rposition(|r| !r.trim().is_empty())
            .unwrap();

        // The final row of the list is the blank line after the reply
        assert_eq!(app.chat_line_count() as usize, last_drawn + 2);
        assert_eq!(chat_rows[last_drawn].trim(), "epsilon");
    }

    #[test]
    fn test_picker_height_saturates() {
        assert_eq!(picker_height(0), 3);
        assert_eq!(picker_height(4), 6);
        assert_eq!(picker_height(70_000), u16::MAX);
        assert_eq!(picker_height(usize::from(u16::MAX) - 1), u16::MAX);
    }

    #[test]
    fn test_renders_model_placeholder() {
        let mut app = app();
        app.apply_backend_event(AppEvent::Models {
            generation: 0,
            result: Ok(vec![]),
        });
        app.open_model_picker();
        let screen = draw(&mut app);
        assert!(screen.contains("No models found"));
    }

    #[test]
    fn test_renders_model_list_in_order() {
        let mut app = app();
        app.apply_backend_event(AppEvent::Models {
            generation: 0,
            result: Ok(vec!["a-model".into(), "b-model".into()]),
        });
        app.open_model_picker();
        let screen = draw(&mut app);
        let a = screen.find("a-model").unwrap();
        let b = screen.find("b-model").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_render_records_chat_geometry() {
        let mut app = app();
        draw(&mut app);
        assert_eq!(app.chat_width, 78);
        assert_eq!(app.chat_height, 20 - 1 - 3 - 1 - 2);
        assert!(app.chat_area.is_some());
    }
}
