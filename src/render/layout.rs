//! Pure bubble geometry for the chat canvas.
//!
//! Nothing here touches a drawing surface: text widths come from a
//! [`TextMeasure`], so the same layout can be computed against cairo or
//! against a fixed-advance measurer in tests.

use serde::{Deserialize, Serialize};

use crate::chat::models::{Message, Sender};
use crate::render::surface::{Font, Rect, TextMeasure};

/// Fixed dimensions of the chat canvas.
///
/// The defaults describe a 900x550 surface whose left 280px are reserved
/// for the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    pub width: f64,
    pub height: f64,
    pub header_height: f64,
    /// Reserved region on the left, never covered by bubbles.
    pub sidebar_width: f64,
    pub top_margin: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub gap: f64,
    /// Distance between a bubble and the edge it is aligned to.
    pub inset: f64,
    /// Subtracted from the bubble region to get the maximum bubble width.
    pub bubble_margin: f64,
    pub corner_radius: f64,
    /// Offset from a bubble's top edge to the first text baseline.
    pub baseline_offset: f64,
    pub font_size: f64,
    pub title_font_size: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 550.0,
            header_height: 56.0,
            sidebar_width: 280.0,
            top_margin: 80.0,
            line_height: 26.0,
            padding_x: 14.0,
            padding_y: 12.0,
            gap: 12.0,
            inset: 20.0,
            bubble_margin: 60.0,
            corner_radius: 16.0,
            baseline_offset: 20.0,
            font_size: 13.0,
            title_font_size: 18.0,
        }
    }
}

impl LayoutMetrics {
    pub fn max_bubble_width(&self) -> f64 {
        (self.width - self.sidebar_width - self.bubble_margin).max(0.0)
    }

    pub fn message_font(&self) -> Font {
        Font::regular(self.font_size)
    }

    pub fn title_font(&self) -> Font {
        Font::bold(self.title_font_size)
    }
}

/// Placement of one message bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayout {
    pub rect: Rect,
    pub lines: Vec<String>,
    pub sender: Sender,
}

/// Greedy word wrap on single spaces.
///
/// A line grows word by word while it measures no wider than `max_width`.
/// When adding a word would overflow, the line is closed and the word
/// starts the next one. A word that is wider than `max_width` on its own
/// still gets its own line. Empty text wraps to a single empty line.
pub fn wrap_text<M>(text: &str, max_width: f64, font: &Font, measure: &M) -> Vec<String>
where
    M: TextMeasure + ?Sized,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split(' ') {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure.text_width(&candidate, font) > max_width {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Stack one bubble per message, top to bottom, in message order.
pub fn layout_messages<M>(messages: &[Message], metrics: &LayoutMetrics, measure: &M) -> Vec<BubbleLayout>
where
    M: TextMeasure + ?Sized,
{
    let font = metrics.message_font();
    let max_width = metrics.max_bubble_width();
    let mut y = metrics.top_margin;
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        let lines = wrap_text(&message.text, max_width, &font, measure);
        let longest = lines
            .iter()
            .map(|l| measure.text_width(l, &font))
            .fold(0.0_f64, f64::max);

        let width = max_width.min(longest + metrics.padding_x * 2.0);
        let height = lines.len() as f64 * metrics.line_height + metrics.padding_y;
        let x = match message.sender {
            Sender::Me => metrics.width - width - metrics.inset,
            Sender::Them => metrics.sidebar_width + metrics.inset,
        };

        out.push(BubbleLayout {
            rect: Rect::new(x, y, width, height),
            lines,
            sender: message.sender,
        });
        y += height + metrics.gap;
    }
    out
}

/// Drop the oldest bubbles until the newest one ends within `height`, then
/// move the kept ones up so the first sits at the top margin. The newest
/// bubble is always kept, even when it alone is taller than the surface.
pub fn keep_latest_visible(bubbles: &mut Vec<BubbleLayout>, metrics: &LayoutMetrics, height: f64) {
    let Some(bottom) = bubbles.last().map(|b| b.rect.bottom()) else {
        return;
    };
    if bottom <= height {
        return;
    }
    let first = bubbles
        .iter()
        .position(|b| bottom - (b.rect.y - metrics.top_margin) <= height)
        .unwrap_or(bubbles.len() - 1);
    let shift = bubbles[first].rect.y - metrics.top_margin;
    bubbles.drain(..first);
    for bubble in bubbles.iter_mut() {
        bubble.rect.y -= shift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::testing::FixedAdvance;
    use proptest::prelude::*;

    fn msg(id: i64, sender: Sender, text: &str) -> Message {
        Message::new(id, sender, "", text, "")
    }

    #[test]
    fn wraps_greedily_on_spaces() {
        // 13px font, 6.5px per glyph: 40px fits six glyphs.
        let font = Font::regular(13.0);
        let lines = wrap_text("aa bb cc dd", 40.0, &font, &FixedAdvance);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn long_first_word_keeps_its_own_line() {
        let font = Font::regular(13.0);
        let lines = wrap_text("abcdefghij xy", 20.0, &font, &FixedAdvance);
        assert_eq!(lines, vec!["abcdefghij", "xy"]);
    }

    #[test]
    fn empty_text_is_one_empty_line() {
        let font = Font::regular(13.0);
        assert_eq!(wrap_text("", 100.0, &font, &FixedAdvance), vec![String::new()]);
    }

    #[test]
    fn two_messages_stack_and_align_by_sender() {
        let metrics = LayoutMetrics::default();
        let messages = vec![
            msg(1, Sender::Me, "hi"),
            msg(2, Sender::Them, "hello there friend"),
        ];
        let bubbles = layout_messages(&messages, &metrics, &FixedAdvance);
        assert_eq!(bubbles.len(), 2);

        let (first, second) = (&bubbles[0].rect, &bubbles[1].rect);
        assert!(first.bottom() <= second.y, "bubbles overlap vertically");
        assert_eq!(first.y, metrics.top_margin);
        assert_eq!(second.y, first.bottom() + metrics.gap);

        assert_eq!(first.right(), metrics.width - metrics.inset);
        assert_eq!(second.x, metrics.sidebar_width + metrics.inset);
    }

    #[test]
    fn bubble_size_follows_lines_and_padding() {
        let metrics = LayoutMetrics::default();
        let bubbles = layout_messages(&[msg(1, Sender::Me, "hi")], &metrics, &FixedAdvance);
        let rect = bubbles[0].rect;
        assert_eq!(rect.width, 2.0 * 6.5 + 2.0 * metrics.padding_x);
        assert_eq!(rect.height, metrics.line_height + metrics.padding_y);
    }

    #[test]
    fn bubble_width_is_capped() {
        let metrics = LayoutMetrics::default();
        let long = "word ".repeat(200);
        let bubbles = layout_messages(&[msg(1, Sender::Them, long.trim())], &metrics, &FixedAdvance);
        let bubble = &bubbles[0];
        assert_eq!(bubble.rect.width, metrics.max_bubble_width());
        assert!(bubble.lines.len() > 1);
        assert_eq!(
            bubble.rect.height,
            bubble.lines.len() as f64 * metrics.line_height + metrics.padding_y
        );
    }

    #[test]
    fn no_messages_no_bubbles() {
        let bubbles = layout_messages(&[], &LayoutMetrics::default(), &FixedAdvance);
        assert!(bubbles.is_empty());
    }

    #[test]
    fn long_history_keeps_newest_on_screen() {
        let metrics = LayoutMetrics::default();
        let messages: Vec<Message> = (0..50).map(|i| msg(i, Sender::Them, &format!("m{i}"))).collect();
        let mut bubbles = layout_messages(&messages, &metrics, &FixedAdvance);
        assert!(bubbles.last().unwrap().rect.bottom() > metrics.height);

        keep_latest_visible(&mut bubbles, &metrics, metrics.height);
        let newest = bubbles.last().unwrap();
        assert_eq!(newest.lines, vec!["m49"]);
        assert!(newest.rect.bottom() <= metrics.height);
        assert_eq!(bubbles[0].rect.y, metrics.top_margin);
        for pair in bubbles.windows(2) {
            assert_eq!(pair[1].rect.y, pair[0].rect.bottom() + metrics.gap);
        }
    }

    #[test]
    fn short_history_is_left_alone() {
        let metrics = LayoutMetrics::default();
        let messages = vec![msg(1, Sender::Me, "hi"), msg(2, Sender::Them, "yo")];
        let mut bubbles = layout_messages(&messages, &metrics, &FixedAdvance);
        let before = bubbles.clone();
        keep_latest_visible(&mut bubbles, &metrics, metrics.height);
        assert_eq!(bubbles, before);
    }

    #[test]
    fn oversized_newest_bubble_is_still_kept() {
        let metrics = LayoutMetrics::default();
        let huge = "word ".repeat(2000);
        let messages = vec![msg(1, Sender::Me, "hi"), msg(2, Sender::Them, huge.trim())];
        let mut bubbles = layout_messages(&messages, &metrics, &FixedAdvance);
        keep_latest_visible(&mut bubbles, &metrics, metrics.height);
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].rect.y, metrics.top_margin);
        assert_eq!(bubbles[0].sender, Sender::Them);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_wrapping_wrapped_lines_is_stable(
            text in "[a-z]{1,8}( [a-z]{1,8}){0,15}",
            max_width in 20.0f64..300.0
        ) {
            let font = Font::regular(13.0);
            let lines = wrap_text(&text, max_width, &font, &FixedAdvance);
            for line in &lines {
                let rewrapped = wrap_text(line, max_width, &font, &FixedAdvance);
                prop_assert_eq!(rewrapped, vec![line.clone()]);
            }
        }

        #[test]
        fn prop_wrapping_keeps_every_word(
            text in "[a-z]{1,8}( [a-z]{1,8}){0,15}",
            max_width in 20.0f64..300.0
        ) {
            let font = Font::regular(13.0);
            let lines = wrap_text(&text, max_width, &font, &FixedAdvance);
            prop_assert_eq!(lines.join(" "), text);
        }
    }
}
