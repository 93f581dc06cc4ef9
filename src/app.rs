use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::BackendClient;
use crate::state::{ChatState, SendOutcome};
use crate::tui::AppEvent;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub state: ChatState,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the message list, set during render
    pub chat_width: u16,  // Inner width of the message list, set during render
    pub chat_area: Option<Rect>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub model_picker_state: ListState,

    // Backend
    pub client: BackendClient,
    pub preferred_model: Option<String>,
    events: UnboundedSender<AppEvent>,
    // Latest refresh issued per region; older results are dropped
    status_generation: u64,
    models_generation: u64,
}

impl App {
    pub fn new(
        client: BackendClient,
        preferred_model: Option<String>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            state: ChatState::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,
            show_model_picker: false,
            model_picker_state: ListState::default(),
            client,
            preferred_model,
            events,
            status_generation: 0,
            models_generation: 0,
        }
    }

    /// Query the backend status. The result arrives as `AppEvent::Status`.
    pub fn check_status(&mut self) {
        self.status_generation += 1;
        let generation = self.status_generation;
        let client = self.client.clone();
        let tx = self.events.clone();
        tracing::debug!(base_url = client.base_url(), generation, "checking backend status");
        tokio::spawn(async move {
            let result = client.status().await;
            let _ = tx.send(AppEvent::Status { generation, result });
        });
    }

    /// Fetch the model list. The result arrives as `AppEvent::Models`.
    pub fn load_models(&mut self) {
        self.models_generation += 1;
        let generation = self.models_generation;
        let client = self.client.clone();
        let tx = self.events.clone();
        tracing::debug!(generation, "loading models");
        tokio::spawn(async move {
            let result = client.list_models().await;
            let _ = tx.send(AppEvent::Models { generation, result });
        });
    }

    /// Status and model list are independent; either may land first. Only
    /// the result of the latest refresh of each is applied.
    pub fn refresh(&mut self) {
        self.check_status();
        self.load_models();
    }

    /// Send whatever is in the input box. The user's message is in the
    /// state before the request task exists.
    pub fn send_message(&mut self) -> bool {
        let pending = match self.state.begin_send() {
            SendOutcome::Dispatched(pending) => pending,
            SendOutcome::Empty => return false,
            SendOutcome::Busy => {
                tracing::debug!("send rejected, a reply is still pending");
                return false;
            }
        };
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        let tx = self.events.clone();
        tracing::info!(id = ?pending.id, model = %pending.request.model, "sending chat message");
        tokio::spawn(async move {
            let result = client.chat(&pending.request).await;
            let _ = tx.send(AppEvent::Reply {
                id: pending.id,
                result,
            });
        });
        true
    }

    /// Apply a backend result delivered on the event channel.
    pub fn apply_backend_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status { generation, .. } if generation < self.status_generation => {
                tracing::debug!(generation, "dropping superseded status result");
            }
            AppEvent::Models { generation, .. } if generation < self.models_generation => {
                tracing::debug!(generation, "dropping superseded model list");
            }
            AppEvent::Status { result, .. } => self.state.apply_status(result),
            AppEvent::Models { result, .. } => {
                self.state.apply_models(result, self.preferred_model.as_deref());
                if self.show_model_picker {
                    self.sync_model_picker();
                }
            }
            AppEvent::Reply { id, result } => {
                if self.state.finish_send(id, result) {
                    self.scroll_chat_to_bottom();
                }
            }
            AppEvent::Key(_) | AppEvent::Mouse(_) | AppEvent::Resize(_, _) | AppEvent::Tick => {}
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.state.is_typing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rows the message list takes at the current width, wrapped exactly as
    /// `ui::render` wraps it.
    pub fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        let rows = ui::chat_paragraph(&self.state, self.animation_frame).line_count(wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_line_count().saturating_sub(visible_height)
    }

    /// Scroll chat to bottom so the newest entry is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        self.sync_model_picker();
        self.show_model_picker = true;
    }

    fn sync_model_picker(&mut self) {
        self.model_picker_state.select(self.state.models.selected_index());
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.state.models.models().len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        if self.state.models.models().is_empty() {
            return;
        }
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Confirm the highlighted model. Placeholders can't be selected.
    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if self.state.select_model(i) {
                tracing::info!(model = self.state.models.selected_model(), "model changed");
                self.scroll_chat_to_bottom();
            }
            self.show_model_picker = false;
        }
    }

    /// Open the most recent link in the conversation in the system browser.
    pub fn open_latest_link(&self) {
        let Some(url) = self.state.latest_link() else {
            return;
        };
        if let Err(e) = open::that_detached(&url) {
            tracing::warn!(%url, "failed to open link: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatOutcome;
    use tokio::sync::mpsc;

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Nothing listens here; requests fail fast with a connection error.
        let client = BackendClient::new("http://127.0.0.1:9");
        (App::new(client, None, tx), rx)
    }

    #[tokio::test]
    async fn test_send_shows_message_before_reply() {
        let (mut app, mut rx) = app();
        app.state.input = "hello".to_string();

        assert!(app.send_message());
        assert_eq!(app.state.messages().len(), 1);
        assert!(app.state.is_typing());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, AppEvent::Reply { .. }));
        app.apply_backend_event(event);

        assert!(!app.state.is_typing());
        assert_eq!(
            app.state.messages().last().map(|m| m.content.as_str()),
            Some(crate::state::CONNECT_ERROR)
        );
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let (mut app, mut rx) = app();
        app.state.input = "   ".to_string();
        assert!(!app.send_message());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_reports_both_regions() {
        let (mut app, mut rx) = app();
        app.refresh();

        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            app.apply_backend_event(event);
        }

        assert_eq!(app.state.status, crate::state::StatusLine::Unreachable);
        assert_eq!(app.state.models.placeholder(), Some("Error loading models"));
    }

    #[tokio::test]
    async fn test_superseded_refresh_results_are_dropped() {
        let (mut app, _rx) = app();
        app.refresh();
        app.refresh();

        // The second refresh answers first, then the first one straggles in
        app.apply_backend_event(AppEvent::Status {
            generation: 2,
            result: Ok(crate::api::BackendStatus {
                running: true,
                model_count: 2,
            }),
        });
        app.apply_backend_event(AppEvent::Models {
            generation: 2,
            result: Ok(vec!["new-a".into(), "new-b".into()]),
        });
        app.apply_backend_event(AppEvent::Status {
            generation: 1,
            result: Ok(crate::api::BackendStatus {
                running: false,
                model_count: 0,
            }),
        });
        app.apply_backend_event(AppEvent::Models {
            generation: 1,
            result: Ok(vec!["old".into()]),
        });

        assert!(app.state.status.is_healthy());
        assert_eq!(app.state.models.models(), ["new-a", "new-b"]);
    }

    #[test]
    fn test_tick_only_animates_while_typing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
    }

    #[test]
    fn test_line_count_wraps_long_lines() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.chat_width = 10;
        app.state.apply_models(Ok(vec!["a".into(), "b".into()]), None);
        app.state.select_model(1);
        // "AI:", then "Model " / "changed " / "to: b" word-wrapped, then blank
        assert_eq!(app.chat_line_count(), 1 + 3 + 1);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.chat_height = 10;
        app.scroll_down(5);
        assert_eq!(app.chat_scroll, 0);
        app.scroll_up(5);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_picker_selection_echoes_change() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.apply_backend_event(AppEvent::Models {
            generation: 0,
            result: Ok(vec!["a".into(), "b".into()]),
        });

        app.open_model_picker();
        assert_eq!(app.model_picker_state.selected(), Some(0));
        app.model_picker_nav_down();
        app.model_picker_nav_down();
        assert_eq!(app.model_picker_state.selected(), Some(1));
        app.select_model();

        assert!(!app.show_model_picker);
        assert_eq!(app.state.models.selected_model(), "b");
        assert_eq!(app.state.messages().len(), 1);
    }

    #[test]
    fn test_picker_placeholder_cannot_be_selected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.apply_backend_event(AppEvent::Models {
            generation: 0,
            result: Ok(vec![]),
        });

        app.open_model_picker();
        app.model_picker_nav_down();
        app.select_model();
        assert!(app.state.messages().is_empty());
        assert!(app.show_model_picker);
    }

    #[test]
    fn test_stale_reply_event_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(BackendClient::new("http://127.0.0.1:9"), None, tx);
        app.state.input = "hi".to_string();
        let SendOutcome::Dispatched(first) = app.state.begin_send() else {
            panic!("expected dispatch");
        };
        app.apply_backend_event(AppEvent::Reply {
            id: first.id,
            result: Ok(ChatOutcome::Reply("ok".into())),
        });
        app.apply_backend_event(AppEvent::Reply {
            id: first.id,
            result: Ok(ChatOutcome::Reply("again".into())),
        });
        assert_eq!(app.state.messages().len(), 2);
    }
}
