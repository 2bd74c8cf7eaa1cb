//! View state of the chat screen: which conversation is open and what is
//! typed in the composer.
//!
//! State changes go through [`ChatViewState::reduce`], which never performs
//! I/O. Sending is returned as an effect and handed to a [`MessageSender`]
//! by whoever drives the reducer.

use log::info;

use crate::chat::models::{Conversation, ConversationId, Message};
use crate::chat::source::ConversationSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Select(ConversationId),
    UpdateInput(String),
    Submit,
}

/// Text handed off to the transport, addressed to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub conversation_id: ConversationId,
    pub text: String,
}

/// Delivers outgoing text. Delivery, retries and failures are entirely the
/// implementation's business; the view state never hears back.
pub trait MessageSender {
    fn send(&mut self, request: SendRequest);
}

/// Sender that only records the hand-off in the log.
#[derive(Debug, Default)]
pub struct LogSender;

impl MessageSender for LogSender {
    fn send(&mut self, request: SendRequest) {
        info!(
            "send message to conversation {}: {}",
            request.conversation_id, request.text
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ChatViewState,
    pub effect: Option<SendRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatViewState {
    pub selected: ConversationId,
    pub input: String,
}

impl Default for ChatViewState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ChatViewState {
    pub fn new(selected: ConversationId) -> Self {
        Self {
            selected,
            input: String::new(),
        }
    }

    /// Start on the first conversation the source lists.
    pub fn for_source(source: &dyn ConversationSource) -> Self {
        source
            .conversations()
            .first()
            .map(|c| Self::new(c.id))
            .unwrap_or_default()
    }

    pub fn reduce(&self, action: ChatAction) -> Transition {
        let mut state = self.clone();
        let effect = match action {
            ChatAction::Select(id) => {
                state.selected = id;
                None
            }
            ChatAction::UpdateInput(text) => {
                state.input = text;
                None
            }
            ChatAction::Submit => {
                if state.input.trim().is_empty() {
                    None
                } else {
                    Some(SendRequest {
                        conversation_id: state.selected,
                        text: std::mem::take(&mut state.input),
                    })
                }
            }
        };
        Transition { state, effect }
    }

    /// Apply `action` in place and forward any send effect to `sender`.
    pub fn dispatch(&mut self, action: ChatAction, sender: &mut dyn MessageSender) {
        let Transition { state, effect } = self.reduce(action);
        *self = state;
        if let Some(request) = effect {
            sender.send(request);
        }
    }

    pub fn select_conversation(&mut self, id: ConversationId) {
        self.selected = id;
    }

    pub fn update_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn submit(&mut self, sender: &mut dyn MessageSender) {
        self.dispatch(ChatAction::Submit, sender);
    }

    pub fn active_conversation<'a>(&self, source: &'a dyn ConversationSource) -> Option<&'a Conversation> {
        source.conversation(self.selected)
    }

    pub fn messages<'a>(&self, source: &'a dyn ConversationSource) -> &'a [Message] {
        source.messages(self.selected)
    }
}
