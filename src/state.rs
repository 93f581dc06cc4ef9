//! UI-agnostic chat state.
//!
//! Everything the renderer needs lives here and nothing here knows about the
//! terminal. Backend results are applied through the `apply_*` / `finish_*`
//! methods so the whole widget can be driven from tests.

use crate::api::{ApiError, BackendStatus, ChatOutcome, ChatRequest};
use crate::format;

pub const CONNECT_ERROR: &str = "Error: Could not connect to server";
pub const EMPTY_REPLY_ERROR: &str = "Error: No response from server";

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Identifies one chat request so its reply can be matched to the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Dispatched(PendingRequest),
    /// Trimmed input was empty.
    Empty,
    /// A reply is still pending; the input is left as it was.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    Checking,
    Running { models: u64 },
    Offline,
    Unreachable,
}

impl StatusLine {
    pub fn text(&self) -> String {
        match self {
            StatusLine::Checking => "Checking backend...".to_string(),
            StatusLine::Running { models } => format!("✅ Ollama running ({} models)", models),
            StatusLine::Offline => "❌ Ollama offline - Start with: ollama serve".to_string(),
            StatusLine::Unreachable => "❌ Cannot connect to server".to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, StatusLine::Running { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelList {
    Loading,
    Loaded { models: Vec<String>, selected: usize },
    Empty,
    Failed,
}

impl ModelList {
    /// Label of the single disabled entry shown instead of a model list.
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            ModelList::Loading => Some("Loading models..."),
            ModelList::Loaded { .. } => None,
            ModelList::Empty => Some("No models found"),
            ModelList::Failed => Some("Error loading models"),
        }
    }

    pub fn models(&self) -> &[String] {
        match self {
            ModelList::Loaded { models, .. } => models,
            _ => &[],
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        match self {
            ModelList::Loaded { selected, .. } => Some(*selected),
            _ => None,
        }
    }

    /// The model identifier sent with a chat request. A placeholder sends an
    /// empty string and leaves the choice to the backend.
    pub fn selected_model(&self) -> &str {
        match self {
            ModelList::Loaded { models, selected } => {
                models.get(*selected).map(String::as_str).unwrap_or("")
            }
            _ => "",
        }
    }
}

#[derive(Debug)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    pending: Option<RequestId>,
    next_request: u64,
    pub status: StatusLine,
    pub models: ModelList,
    pub input: String,
    /// Cursor position in `input`, counted in characters.
    pub cursor: usize,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending: None,
            next_request: 0,
            status: StatusLine::Checking,
            models: ModelList::Loading,
            input: String::new(),
            cursor: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending(&self) -> Option<RequestId> {
        self.pending
    }

    pub fn is_typing(&self) -> bool {
        self.pending.is_some()
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn apply_status(&mut self, result: Result<BackendStatus, ApiError>) {
        self.status = match result {
            Ok(status) if status.running => StatusLine::Running {
                models: status.model_count,
            },
            Ok(_) => StatusLine::Offline,
            Err(e) => {
                tracing::warn!("status check failed: {}", e);
                StatusLine::Unreachable
            }
        };
    }

    /// Replace the model list. `preferred` is selected when the backend
    /// offers it, otherwise the first model is.
    pub fn apply_models(&mut self, result: Result<Vec<String>, ApiError>, preferred: Option<&str>) {
        self.models = match result {
            Ok(models) if models.is_empty() => ModelList::Empty,
            Ok(models) => {
                let selected = preferred
                    .and_then(|name| models.iter().position(|m| m == name))
                    .unwrap_or(0);
                ModelList::Loaded { models, selected }
            }
            Err(e) => {
                tracing::warn!("loading models failed: {}", e);
                ModelList::Failed
            }
        };
    }

    /// Switch to the model at `index`, echoing the change into the
    /// conversation. Returns false if nothing changed.
    pub fn select_model(&mut self, index: usize) -> bool {
        let ModelList::Loaded { models, selected } = &mut self.models else {
            return false;
        };
        if index == *selected || index >= models.len() {
            return false;
        }
        *selected = index;
        let name = models[index].clone();
        self.push(ChatMessage::assistant(format!("Model changed to: {}", name)));
        true
    }

    /// Take the input and turn it into a chat request.
    pub fn begin_send(&mut self) -> SendOutcome {
        let message = self.input.trim();
        if message.is_empty() {
            return SendOutcome::Empty;
        }
        if self.pending.is_some() {
            return SendOutcome::Busy;
        }

        let message = message.to_string();
        self.push(ChatMessage::user(message.clone()));
        self.input.clear();
        self.cursor = 0;

        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.pending = Some(id);

        SendOutcome::Dispatched(PendingRequest {
            id,
            request: ChatRequest {
                message,
                model: self.models.selected_model().to_string(),
            },
        })
    }

    /// Apply the reply for request `id`. Replies that don't match the pending
    /// request are dropped.
    pub fn finish_send(&mut self, id: RequestId, result: Result<ChatOutcome, ApiError>) -> bool {
        if self.pending != Some(id) {
            tracing::warn!(?id, pending = ?self.pending, "dropping reply for stale request");
            return false;
        }
        self.pending = None;

        let content = match result {
            Ok(ChatOutcome::Reply(text)) => text,
            Ok(ChatOutcome::Failed(error)) => format!("Error: {}", error),
            Ok(ChatOutcome::Empty) => EMPTY_REPLY_ERROR.to_string(),
            Err(e) => {
                tracing::warn!("chat request failed: {}", e);
                CONNECT_ERROR.to_string()
            }
        };
        self.push(ChatMessage::assistant(content));
        true
    }

    /// Most recent link anywhere in the conversation.
    pub fn latest_link(&self) -> Option<String> {
        self.messages.iter().rev().find_map(|msg| {
            let escaped = format::escape(&msg.content);
            format::links(&escaped).last().map(str::to_string)
        })
    }
}
