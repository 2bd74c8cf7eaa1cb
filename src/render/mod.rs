pub mod cairo;
pub mod layout;
pub mod renderer;
pub mod surface;

pub use layout::{BubbleLayout, LayoutMetrics, layout_messages, wrap_text};
pub use renderer::{ChatRenderer, Theme};
pub use surface::{Color, DrawingSurface, Font, Rect, TextMeasure};
