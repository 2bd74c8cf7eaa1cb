use std::cell::RefCell;
use std::rc::Rc;

use gtk4 as gtk;
use gtk4::glib;
use gtk4::prelude::*;

use munglog::chat::{Conversation, ConversationId};

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    ids: Rc<RefCell<Vec<ConversationId>>>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(280);

        let title = gtk::Label::new(Some("Conversations"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.set_selection_mode(gtk::SelectionMode::Single);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .child(&list)
            .build();
        root.append(&scroller);

        Self {
            root,
            list,
            ids: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Call `f` with the conversation id whenever the user picks a row.
    pub fn connect_selected<F: Fn(ConversationId) + 'static>(&self, f: F) {
        let ids = self.ids.clone();
        self.list.connect_row_selected(move |_, row| {
            let Some(row) = row else { return };
            let id = usize::try_from(row.index())
                .ok()
                .and_then(|i| ids.borrow().get(i).copied());
            if let Some(id) = id {
                f(id);
            }
        });
    }

    fn row(conv: &Conversation) -> gtk::ListBoxRow {
        let line = gtk::Box::new(gtk::Orientation::Horizontal, 8);
        line.set_margin_top(8);
        line.set_margin_bottom(8);
        line.set_margin_start(8);
        line.set_margin_end(8);

        let avatar = gtk::Label::new(None);
        avatar.set_markup(&format!(
            "<span foreground=\"{}\" size=\"x-large\">●</span>",
            conv.avatar_color.to_hex()
        ));
        line.append(&avatar);

        let text = gtk::Box::new(gtk::Orientation::Vertical, 2);
        text.set_hexpand(true);
        let name = gtk::Label::new(None);
        name.set_markup(&format!("<b>{}</b>", glib::markup_escape_text(&conv.name)));
        name.set_halign(gtk::Align::Start);
        let preview = gtk::Label::new(Some(&conv.last_message));
        preview.add_css_class("dim-label");
        preview.set_halign(gtk::Align::Start);
        preview.set_ellipsize(gtk::pango::EllipsizeMode::End);
        text.append(&name);
        text.append(&preview);
        line.append(&text);

        let meta = gtk::Box::new(gtk::Orientation::Vertical, 2);
        let time = gtk::Label::new(Some(&conv.time_label));
        time.add_css_class("caption");
        meta.append(&time);
        if conv.unread > 0 {
            let badge = gtk::Label::new(Some(&conv.unread.to_string()));
            badge.add_css_class("accent");
            badge.set_halign(gtk::Align::End);
            meta.append(&badge);
        }
        line.append(&meta);

        let row = gtk::ListBoxRow::new();
        row.set_child(Some(&line));
        row
    }

    /// Rebuild the list and highlight `selected` if it is present.
    pub fn set_items(&self, items: &[Conversation], selected: ConversationId) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        *self.ids.borrow_mut() = items.iter().map(|c| c.id).collect();

        let mut selected_row = None;
        for conv in items {
            let row = Self::row(conv);
            self.list.append(&row);
            if conv.id == selected {
                selected_row = Some(row);
            }
        }
        if let Some(row) = selected_row {
            self.list.select_row(Some(&row));
        }
    }
}
