pub mod models;
pub mod source;
pub mod state;

pub use models::{Conversation, ConversationId, Message, Sender};
pub use source::{ConversationSource, StaticSource};
pub use state::{ChatAction, ChatViewState, LogSender, MessageSender, SendRequest};
