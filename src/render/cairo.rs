use std::f64::consts::{FRAC_PI_2, PI};

use gtk4::cairo::{self, Context, FontSlant, FontWeight, Format, ImageSurface};
use log::warn;

use crate::render::layout::LayoutMetrics;
use crate::render::surface::{Color, DrawingSurface, Font, Rect, TextMeasure};

const FONT_FAMILY: &str = "Sans";

/// A drawing surface backed by an in-memory cairo image.
///
/// The chat view paints `image()` onto its drawing area whenever the
/// renderer reports that the image changed.
pub struct CairoSurface {
    image: ImageSurface,
    cr: Context,
    width: f64,
    height: f64,
}

impl CairoSurface {
    pub fn new(width: i32, height: i32) -> Result<Self, cairo::Error> {
        let image = ImageSurface::create(Format::ARgb32, width, height)?;
        let cr = Context::new(&image)?;
        Ok(Self {
            image,
            cr,
            width: f64::from(width),
            height: f64::from(height),
        })
    }

    /// Create a surface sized by `metrics`. If cairo rejects that size the
    /// default metrics are used instead; the metrics actually in use are
    /// returned alongside the surface.
    pub fn for_metrics(metrics: LayoutMetrics) -> Result<(Self, LayoutMetrics), cairo::Error> {
        match Self::new(metrics.width as i32, metrics.height as i32) {
            Ok(surface) => Ok((surface, metrics)),
            Err(e) => {
                warn!(
                    "cannot create a {}x{} chat canvas ({e}), using the default size",
                    metrics.width, metrics.height
                );
                let fallback = LayoutMetrics::default();
                let surface = Self::new(fallback.width as i32, fallback.height as i32)?;
                Ok((surface, fallback))
            }
        }
    }

    pub fn image(&self) -> &ImageSurface {
        self.image.flush();
        &self.image
    }

    fn set_font(&self, font: &Font) {
        let weight = if font.bold { FontWeight::Bold } else { FontWeight::Normal };
        self.cr.select_font_face(FONT_FAMILY, FontSlant::Normal, weight);
        self.cr.set_font_size(font.size);
    }

    fn set_color(&self, color: Color) {
        let (r, g, b) = color.to_unit();
        self.cr.set_source_rgb(r, g, b);
    }

    fn check(op: &str, result: Result<(), cairo::Error>) {
        if let Err(e) = result {
            warn!("cairo {op} failed: {e}");
        }
    }
}

impl TextMeasure for CairoSurface {
    fn text_width(&self, text: &str, font: &Font) -> f64 {
        self.set_font(font);
        match self.cr.text_extents(text) {
            Ok(extents) => extents.x_advance(),
            Err(e) => {
                warn!("cairo text_extents failed: {e}");
                0.0
            }
        }
    }
}

impl DrawingSurface for CairoSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.set_color(color);
        self.cr.rectangle(rect.x, rect.y, rect.width, rect.height);
        Self::check("fill", self.cr.fill());
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);

        self.set_color(color);
        self.cr.new_sub_path();
        self.cr.arc(x + w - r, y + r, r, -FRAC_PI_2, 0.0);
        self.cr.arc(x + w - r, y + h - r, r, 0.0, FRAC_PI_2);
        self.cr.arc(x + r, y + h - r, r, FRAC_PI_2, PI);
        self.cr.arc(x + r, y + r, r, PI, 3.0 * FRAC_PI_2);
        self.cr.close_path();
        Self::check("fill", self.cr.fill());
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: Color) {
        self.set_color(color);
        self.cr.set_line_width(1.0);
        self.cr.move_to(from.0, from.1);
        self.cr.line_to(to.0, to.1);
        Self::check("stroke", self.cr.stroke());
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, font: &Font, color: Color) {
        self.set_font(font);
        self.set_color(color);
        self.cr.move_to(x, y);
        Self::check("show_text", self.cr.show_text(text));
    }
}
