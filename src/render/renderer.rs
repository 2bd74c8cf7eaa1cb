use log::debug;

use crate::chat::models::{Message, Sender};
use crate::render::layout::{BubbleLayout, LayoutMetrics, keep_latest_visible, layout_messages};
use crate::render::surface::{Color, DrawingSurface, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub background: Color,
    pub header: Color,
    pub title: Color,
    pub divider: Color,
    pub chat_background: Color,
    pub mine_fill: Color,
    pub mine_text: Color,
    pub theirs_fill: Color,
    pub theirs_text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::rgb(0xf5, 0xf5, 0xf7),
            header: Color::WHITE,
            title: Color::rgb(0x11, 0x18, 0x27),
            divider: Color::rgb(0xe5, 0xe7, 0xeb),
            chat_background: Color::rgb(0xf3, 0xf4, 0xf6),
            mine_fill: Color::rgb(0xfb, 0x92, 0x3c),
            mine_text: Color::WHITE,
            theirs_fill: Color::rgb(0xe5, 0xe7, 0xeb),
            theirs_text: Color::rgb(0x11, 0x18, 0x27),
        }
    }
}

impl Theme {
    fn bubble_colors(&self, sender: Sender) -> (Color, Color) {
        match sender {
            Sender::Me => (self.mine_fill, self.mine_text),
            Sender::Them => (self.theirs_fill, self.theirs_text),
        }
    }
}

/// Paints a message list onto a surface it owns.
///
/// After every repaint the renderer raises `needs_update`; whoever displays
/// the surface consumes it with [`ChatRenderer::take_needs_update`].
pub struct ChatRenderer<S: DrawingSurface> {
    surface: S,
    metrics: LayoutMetrics,
    theme: Theme,
    title: String,
    rendered: Option<Vec<Message>>,
    bubbles: Vec<BubbleLayout>,
    needs_update: bool,
}

impl<S: DrawingSurface> ChatRenderer<S> {
    pub fn new(surface: S, metrics: LayoutMetrics) -> Self {
        Self {
            surface,
            metrics,
            theme: Theme::default(),
            title: "Munglog".to_string(),
            rendered: None,
            bubbles: Vec::new(),
            needs_update: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    /// Layout from the most recent render, limited to the bubbles on screen.
    pub fn bubbles(&self) -> &[BubbleLayout] {
        &self.bubbles
    }

    /// Repaint only if `messages` differs from what is currently on the surface.
    /// Returns whether a repaint happened.
    pub fn set_messages(&mut self, messages: &[Message]) -> bool {
        if self.rendered.as_deref() == Some(messages) {
            return false;
        }
        self.render(messages);
        true
    }

    /// Recompute the layout and repaint the whole surface.
    pub fn render(&mut self, messages: &[Message]) {
        let metrics = &self.metrics;
        let theme = &self.theme;
        let (w, h) = self.surface.size();

        self.surface.fill_rect(Rect::new(0.0, 0.0, w, h), theme.background);

        self.surface
            .fill_rect(Rect::new(0.0, 0.0, w, metrics.header_height), theme.header);
        let title_font = metrics.title_font();
        let title_baseline = metrics.header_height / 2.0 + title_font.size / 3.0;
        self.surface
            .draw_text(&self.title, 60.0, title_baseline, &title_font, theme.title);

        let divider_x = metrics.sidebar_width + 0.5;
        self.surface.stroke_line(
            (divider_x, metrics.header_height),
            (divider_x, h),
            theme.divider,
        );
        self.surface.fill_rect(
            Rect::new(
                metrics.sidebar_width,
                metrics.header_height,
                w - metrics.sidebar_width,
                h - metrics.header_height,
            ),
            theme.chat_background,
        );

        let mut bubbles = layout_messages(messages, metrics, &self.surface);
        keep_latest_visible(&mut bubbles, metrics, h);
        let font = metrics.message_font();
        for bubble in &bubbles {
            let (fill, text) = theme.bubble_colors(bubble.sender);
            self.surface
                .fill_rounded_rect(bubble.rect, metrics.corner_radius, fill);
            for (i, line) in bubble.lines.iter().enumerate() {
                self.surface.draw_text(
                    line,
                    bubble.rect.x + metrics.padding_x,
                    bubble.rect.y + metrics.baseline_offset + i as f64 * metrics.line_height,
                    &font,
                    text,
                );
            }
        }

        debug!("rendered {} chat bubbles", bubbles.len());
        self.bubbles = bubbles;
        self.rendered = Some(messages.to_vec());
        self.needs_update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn take_needs_update(&mut self) -> bool {
        std::mem::take(&mut self.needs_update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::testing::{Op, RecordingSurface};

    fn renderer() -> ChatRenderer<RecordingSurface> {
        ChatRenderer::new(RecordingSurface::new(900.0, 550.0), LayoutMetrics::default())
    }

    fn sample() -> Vec<Message> {
        vec![
            Message::new(1, Sender::Me, "Me", "hi", "1:08 PM"),
            Message::new(2, Sender::Them, "Shelter", "hello there friend", "1:09 PM"),
        ]
    }

    #[test]
    fn render_marks_surface_dirty() {
        let mut r = renderer();
        assert!(!r.needs_update());
        r.render(&sample());
        assert!(r.take_needs_update());
        assert!(!r.take_needs_update());
    }

    #[test]
    fn bubbles_use_sender_colours() {
        let mut r = renderer();
        r.render(&sample());
        let theme = Theme::default();
        let fills: Vec<Color> = r
            .surface()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::FillRounded(_, radius, color) => {
                    assert_eq!(*radius, 16.0);
                    Some(*color)
                }
                _ => None,
            })
            .collect();
        assert_eq!(fills, vec![theme.mine_fill, theme.theirs_fill]);
    }

    #[test]
    fn text_is_drawn_inside_bubble_padding() {
        let mut r = renderer();
        r.render(&sample());
        let bubble = r.bubbles()[1].clone();
        let drawn = r.surface().ops.iter().find_map(|op| match op {
            Op::Text(text, x, y, _) if text == "hello there friend" => Some((*x, *y)),
            _ => None,
        });
        assert_eq!(drawn, Some((bubble.rect.x + 14.0, bubble.rect.y + 20.0)));
    }

    #[test]
    fn unchanged_messages_are_not_repainted() {
        let mut r = renderer();
        let messages = sample();
        assert!(r.set_messages(&messages));
        r.take_needs_update();
        let ops_before = r.surface().ops.len();

        assert!(!r.set_messages(&messages));
        assert!(!r.needs_update());
        assert_eq!(r.surface().ops.len(), ops_before);

        assert!(r.set_messages(&messages[..1]));
        assert!(r.needs_update());
    }

    #[test]
    fn long_history_draws_the_newest_message() {
        let mut r = renderer();
        let messages: Vec<Message> = (0..50)
            .map(|i| Message::new(i, Sender::Them, "Shelter", format!("note {i}"), ""))
            .collect();
        r.render(&messages);

        let drawn: Vec<&str> = r
            .surface()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(text, _, y, _) if text.starts_with("note ") => {
                    assert!(*y <= 550.0);
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(drawn.last(), Some(&"note 49"));
        assert!(!drawn.contains(&"note 0"));
        assert!(r.bubbles().last().unwrap().rect.bottom() <= 550.0);
    }

    #[test]
    fn empty_list_still_paints_chrome() {
        let mut r = renderer();
        r.render(&[]);
        assert!(r.bubbles().is_empty());
        assert!(matches!(r.surface().ops.first(), Some(Op::FillRect(_, _))));
        assert!(r.needs_update());
    }
}
