use std::cell::RefCell;
use std::rc::Rc;

use gtk4 as gtk;
use gtk4::prelude::*;
use log::warn;

use munglog::chat::ChatAction;
use munglog::render::cairo::CairoSurface;
use munglog::screen::ChatScreen;

pub type SharedScreen = Rc<RefCell<ChatScreen<CairoSurface>>>;

/// The message canvas plus the composer underneath it.
#[derive(Clone)]
pub struct ChatView {
    root: gtk::Box,
    title: gtk::Label,
    area: gtk::DrawingArea,
    entry: gtk::Entry,
    screen: SharedScreen,
}

impl ChatView {
    pub fn new(screen: SharedScreen) -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let title = gtk::Label::new(None);
        title.add_css_class("title-4");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let (width, height) = {
            let s = screen.borrow();
            let metrics = s.renderer().metrics();
            (metrics.width as i32, metrics.height as i32)
        };
        let area = gtk::DrawingArea::builder()
            .content_width(width)
            .content_height(height)
            .build();
        {
            let screen = screen.clone();
            area.set_draw_func(move |_, cr, _, _| {
                let screen = screen.borrow();
                let image = screen.renderer().surface().image();
                if let Err(e) = cr.set_source_surface(image, 0.0, 0.0) {
                    warn!("could not use chat image: {e}");
                    return;
                }
                if let Err(e) = cr.paint() {
                    warn!("could not paint chat image: {e}");
                }
            });
        }

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .child(&area)
            .build();
        root.append(&scroller);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        let view = Self { root, title, area, entry, screen };

        {
            let screen = view.screen.clone();
            view.entry.connect_changed(move |entry| {
                screen
                    .borrow_mut()
                    .dispatch(ChatAction::UpdateInput(entry.text().to_string()));
            });
        }
        {
            let view_for_send = view.clone();
            send_btn.connect_clicked(move |_| view_for_send.submit());
        }
        {
            let view_for_activate = view.clone();
            view.entry.connect_activate(move |_| view_for_activate.submit());
        }

        view.refresh();
        view
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    fn submit(&self) {
        let remaining = {
            let mut screen = self.screen.borrow_mut();
            screen.dispatch(ChatAction::Submit);
            screen.state().input.clone()
        };
        // set_text re-enters the changed handler, so no borrow may be held here.
        if self.entry.text().as_str() != remaining {
            self.entry.set_text(&remaining);
        }
        self.refresh();
    }

    /// Sync the title and queue a redraw if the canvas changed.
    pub fn refresh(&self) {
        let (dirty, title) = {
            let mut screen = self.screen.borrow_mut();
            let title = screen
                .active_conversation()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "No conversation selected".to_string());
            (screen.take_needs_update(), title)
        };
        self.title.set_label(&title);
        if dirty {
            self.area.queue_draw();
        }
    }
}
