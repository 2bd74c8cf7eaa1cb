use std::collections::HashMap;

use crate::chat::models::{Conversation, ConversationId, Message, Sender};
use crate::render::surface::Color;

/// Read-only access to conversations and their message history.
pub trait ConversationSource {
    fn conversations(&self) -> &[Conversation];

    /// Messages of `id` in display order; empty when `id` is unknown.
    fn messages(&self, id: ConversationId) -> &[Message];

    fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations().iter().find(|c| c.id == id)
    }
}

/// An in-memory table of conversations.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
}

impl StaticSource {
    pub fn new(conversations: impl IntoIterator<Item = Conversation>) -> Self {
        let mut source = Self::default();
        for conversation in conversations {
            source.upsert(conversation);
        }
        source
    }

    /// Insert a conversation, replacing any existing one with the same id.
    pub fn upsert(&mut self, conversation: Conversation) {
        match self.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
    }

    pub fn with_messages(mut self, id: ConversationId, messages: Vec<Message>) -> Self {
        self.set_messages(id, messages);
        self
    }

    pub fn set_messages(&mut self, id: ConversationId, messages: Vec<Message>) {
        self.messages.insert(id, messages);
    }

    /// Append a live message. A message whose id is already present in that
    /// conversation is ignored; returns whether it was added.
    pub fn push_message(&mut self, id: ConversationId, message: Message) -> bool {
        let list = self.messages.entry(id).or_default();
        if list.iter().any(|m| m.id == message.id) {
            return false;
        }
        list.push(message);
        true
    }

    /// Demo table shown when no server is configured.
    pub fn sample() -> Self {
        let conv = |id, name: &str, last: &str, time: &str, unread, color: &str| Conversation {
            id,
            name: name.to_string(),
            last_message: last.to_string(),
            time_label: time.to_string(),
            unread,
            avatar_color: Color::from_hex(color).unwrap_or(Color::WHITE),
        };
        let me = |id, text: &str, time: &str| Message::new(id, Sender::Me, "Me", text, time);
        let them = |id, name: &str, text: &str, time: &str| Message::new(id, Sender::Them, name, text, time);

        Self::new([
            conv(1, "Green Paw Shelter", "Could you help with intake prep tomorrow?", "1 min ago", 2, "#22c55e"),
            conv(2, "Munglog Team", "Here is your volunteer schedule.", "Yesterday", 0, "#3b82f6"),
            conv(3, "Doggy House", "Can we set up a walking shift?", "2 days ago", 1, "#f97316"),
            conv(4, "Loving Hearts Shelter", "Thank you for the food donation!", "3 days ago", 0, "#ec4899"),
            conv(5, "Happy Animal Home", "Are you free next Thursday?", "5 days ago", 0, "#8b5cf6"),
        ])
        .with_messages(1, vec![
            them(1, "Green Paw Shelter", "Thanks so much for joining the pilot walking shift!", "1:08 PM"),
            me(2, "Not at all, I had a great time!", "1:09 PM"),
            them(3, "Green Paw Shelter", "Would you be available next weekend as well?", "5:51 PM"),
            me(4, "Sure! Let me check my schedule and get back to you.", "5:52 PM"),
        ])
        .with_messages(2, vec![
            them(1, "Munglog Team", "Hello, this is the Munglog team.", "10:12 AM"),
            them(2, "Munglog Team", "Here is your volunteer schedule.", "10:13 AM"),
        ])
        .with_messages(3, vec![
            them(1, "Doggy House", "Could you help walk the dogs that just arrived?", "3:22 PM"),
        ])
        .with_messages(4, vec![
            them(1, "Loving Hearts Shelter", "Thank you for the food donation!", "2:30 PM"),
        ])
        .with_messages(5, vec![
            them(1, "Happy Animal Home", "Are you free next Thursday?", "11:45 AM"),
        ])
    }
}

impl ConversationSource for StaticSource {
    fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    fn messages(&self, id: ConversationId) -> &[Message] {
        self.messages.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}
