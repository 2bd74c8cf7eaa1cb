use crate::api::models::ChatRoomSummary;
use crate::chat::models::{Conversation, ConversationId, Message};
use crate::chat::source::{ConversationSource, StaticSource};
use crate::chat::state::{ChatAction, ChatViewState, MessageSender};
use crate::render::renderer::ChatRenderer;
use crate::render::surface::DrawingSurface;

/// Everything the chat window shows, wired together: the view state, the
/// conversation table it reads, the outgoing transport and the canvas.
///
/// Every state change re-runs the renderer, which repaints only when the
/// visible message list actually changed.
pub struct ChatScreen<S: DrawingSurface> {
    state: ChatViewState,
    source: StaticSource,
    sender: Box<dyn MessageSender>,
    renderer: ChatRenderer<S>,
}

impl<S: DrawingSurface> ChatScreen<S> {
    pub fn new(source: StaticSource, sender: Box<dyn MessageSender>, renderer: ChatRenderer<S>) -> Self {
        let state = ChatViewState::for_source(&source);
        let mut screen = Self { state, source, sender, renderer };
        screen.refresh();
        screen
    }

    pub fn state(&self) -> &ChatViewState {
        &self.state
    }

    pub fn source(&self) -> &StaticSource {
        &self.source
    }

    pub fn renderer(&self) -> &ChatRenderer<S> {
        &self.renderer
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.source.conversations()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.state.active_conversation(&self.source)
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages(&self.source)
    }

    pub fn dispatch(&mut self, action: ChatAction) {
        self.state.dispatch(action, &mut *self.sender);
        self.refresh();
    }

    /// Swap in a new conversation table, e.g. after the room list loads.
    /// The selection is kept even if it no longer exists.
    pub fn replace_source(&mut self, source: StaticSource) {
        self.source = source;
        self.refresh();
    }

    pub fn set_history(&mut self, id: ConversationId, messages: Vec<Message>) {
        self.source.set_messages(id, messages);
        self.refresh();
    }

    pub fn push_message(&mut self, id: ConversationId, message: Message) {
        if self.source.push_message(id, message) {
            self.refresh();
        }
    }

    /// Fold a live room summary into the conversation table. The open
    /// conversation is always shown as read. Returns false when the room is
    /// not in the table yet.
    pub fn apply_summary(&mut self, summary: &ChatRoomSummary) -> bool {
        let Some(mut conversation) = self.source.conversation(summary.room_id).cloned() else {
            return false;
        };
        if let Some(preview) = &summary.last_message_preview {
            conversation.last_message = preview.clone();
        }
        if let Some(at) = &summary.last_message_at {
            conversation.time_label = at.clone();
        }
        conversation.unread = if summary.room_id == self.state.selected {
            0
        } else {
            summary.unread_count
        };
        self.source.upsert(conversation);
        true
    }

    fn refresh(&mut self) {
        self.renderer.set_messages(self.state.messages(&self.source));
    }

    pub fn take_needs_update(&mut self) -> bool {
        self.renderer.take_needs_update()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::chat::models::Sender;
    use crate::chat::state::SendRequest;
    use crate::render::layout::LayoutMetrics;
    use crate::render::surface::testing::RecordingSurface;

    struct Shared(Rc<RefCell<Vec<SendRequest>>>);

    impl MessageSender for Shared {
        fn send(&mut self, request: SendRequest) {
            self.0.borrow_mut().push(request);
        }
    }

    fn screen() -> (ChatScreen<RecordingSurface>, Rc<RefCell<Vec<SendRequest>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let renderer = ChatRenderer::new(RecordingSurface::new(900.0, 550.0), LayoutMetrics::default());
        let screen = ChatScreen::new(StaticSource::sample(), Box::new(Shared(sent.clone())), renderer);
        (screen, sent)
    }

    #[test]
    fn opens_on_first_conversation_and_paints() {
        let (mut screen, _) = screen();
        assert_eq!(screen.state().selected, 1);
        assert_eq!(screen.renderer().bubbles().len(), 4);
        assert!(screen.take_needs_update());
    }

    #[test]
    fn typing_does_not_repaint_but_switching_does() {
        let (mut screen, _) = screen();
        screen.take_needs_update();

        screen.dispatch(ChatAction::UpdateInput("hel".into()));
        assert!(!screen.take_needs_update());

        screen.dispatch(ChatAction::Select(2));
        assert!(screen.take_needs_update());
        assert_eq!(screen.renderer().bubbles().len(), 2);
    }

    #[test]
    fn unknown_selection_paints_empty_view() {
        let (mut screen, _) = screen();
        screen.dispatch(ChatAction::Select(77));
        assert!(screen.messages().is_empty());
        assert!(screen.active_conversation().is_none());
        assert!(screen.renderer().bubbles().is_empty());
    }

    #[test]
    fn submit_goes_to_sender() {
        let (mut screen, sent) = screen();
        screen.dispatch(ChatAction::UpdateInput("on my way".into()));
        screen.dispatch(ChatAction::Submit);
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(sent.borrow()[0].text, "on my way");
        assert_eq!(screen.state().input, "");
    }

    #[test]
    fn live_message_appends_to_open_conversation_once() {
        let (mut screen, _) = screen();
        screen.take_needs_update();
        let live = Message::new(10, Sender::Them, "Shelter", "are you there?", "");

        screen.push_message(1, live.clone());
        assert!(screen.take_needs_update());
        assert_eq!(screen.messages().last(), Some(&live));
        assert_eq!(screen.renderer().bubbles().len(), 5);

        screen.push_message(1, live);
        assert!(!screen.take_needs_update());
        assert_eq!(screen.messages().len(), 5);
    }

    #[test]
    fn live_message_for_other_conversation_does_not_repaint() {
        let (mut screen, _) = screen();
        screen.take_needs_update();
        screen.push_message(3, Message::new(10, Sender::Them, "Doggy House", "new dogs", ""));
        assert!(!screen.take_needs_update());
        assert_eq!(screen.source().messages(3).len(), 2);
    }

    fn summary(room_id: i64, unread: u32) -> ChatRoomSummary {
        ChatRoomSummary {
            room_id,
            room_name: None,
            unread_count: unread,
            last_message_preview: Some("see you soon".into()),
            last_message_at: Some("2025-03-01T10:00:00".into()),
        }
    }

    #[test]
    fn summary_updates_sidebar_entry() {
        let (mut screen, _) = screen();
        assert!(screen.apply_summary(&summary(3, 4)));
        let conv = screen.source().conversation(3).unwrap();
        assert_eq!(conv.name, "Doggy House");
        assert_eq!(conv.last_message, "see you soon");
        assert_eq!(conv.time_label, "2025-03-01T10:00:00");
        assert_eq!(conv.unread, 4);
    }

    #[test]
    fn summary_for_open_conversation_reads_as_seen() {
        let (mut screen, _) = screen();
        assert!(screen.apply_summary(&summary(1, 4)));
        assert_eq!(screen.active_conversation().unwrap().unread, 0);
    }

    #[test]
    fn summary_for_unknown_room_is_reported() {
        let (mut screen, _) = screen();
        assert!(!screen.apply_summary(&summary(42, 1)));
        assert_eq!(screen.conversations().len(), 5);
    }

    #[test]
    fn loaded_history_replaces_visible_messages() {
        let (mut screen, _) = screen();
        screen.take_needs_update();
        screen.set_history(1, vec![Message::new(9, Sender::Them, "Shelter", "new", "")]);
        assert!(screen.take_needs_update());
        assert_eq!(screen.renderer().bubbles().len(), 1);
    }
}
