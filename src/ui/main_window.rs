use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use adw::Application;
use adw::prelude::*;
use gtk4::cairo;
use log::{debug, warn};

use munglog::api::ApiClient;
use munglog::api::models::MessageQuery;
use munglog::chat::{ChatAction, Conversation, ConversationId, ConversationSource, LogSender, Message, MessageSender, StaticSource};
use munglog::render::cairo::CairoSurface;
use munglog::config::Settings;
use munglog::render::ChatRenderer;
use munglog::screen::ChatScreen;
use munglog::stomp::{StompConfig, StompEvent, StompSender, ws_endpoint};

use crate::ui::chat_view::{ChatView, SharedScreen};
use crate::ui::sidebar::Sidebar;

const HISTORY_PAGE: u32 = 50;

/// Where conversations come from and where sent text goes.
pub enum Backend {
    /// Built-in sample conversations; sending only logs.
    Demo { settings: Settings },
    /// Logged-in session against a Munglog server.
    Remote { client: Arc<ApiClient>, settings: Settings },
}

impl Backend {
    fn settings(&self) -> &Settings {
        match self {
            Backend::Demo { settings } | Backend::Remote { settings, .. } => settings,
        }
    }

    fn client(&self) -> Option<Arc<ApiClient>> {
        match self {
            Backend::Remote { client, .. } => Some(client.clone()),
            Backend::Demo { .. } => None,
        }
    }
}

/// Outgoing transport for the backend, plus the live session when there is one.
fn make_sender(backend: &Backend) -> (Box<dyn MessageSender>, Option<(StompSender, glib::Receiver<StompEvent>)>) {
    let Backend::Remote { client, settings } = backend else {
        return (Box::new(LogSender), None);
    };
    let endpoint = match &settings.stomp_url {
        Some(url) => url::Url::parse(url).map_err(Into::into),
        None => ws_endpoint(&settings.base_url),
    };
    match endpoint {
        Ok(url) => {
            let (live, events) = StompSender::spawn(StompConfig::new(
                url,
                client.access_token(),
                settings.member_id,
            ));
            (Box::new(live.clone()), Some((live, events)))
        }
        Err(e) => {
            warn!("no usable broker endpoint, messages will only be logged: {e}");
            (Box::new(LogSender), None)
        }
    }
}

#[derive(Clone)]
struct Parts {
    screen: SharedScreen,
    sidebar: Rc<Sidebar>,
    chat: ChatView,
    overlay: adw::ToastOverlay,
    member_id: i64,
    live: Option<StompSender>,
}

impl Parts {
    fn toast(&self, text: &str) {
        self.overlay.add_toast(adw::Toast::new(text));
    }

    fn watch(&self, id: ConversationId) {
        if let Some(live) = &self.live {
            live.watch(id);
        }
    }

    fn reload_sidebar(&self) {
        let (items, selected) = {
            let screen = self.screen.borrow();
            (screen.conversations().to_vec(), screen.state().selected)
        };
        self.sidebar.set_items(&items, selected);
    }
}

fn load_rooms(client: Arc<ApiClient>, parts: Parts) {
    let client_for_history = client.clone();
    let rx = munglog::utils::run_async_to_main(async move { client.my_rooms().await });
    rx.attach(None, move |res| {
        match res {
            Ok(rooms) => {
                let source = StaticSource::new(rooms.iter().map(Conversation::from_summary));
                let first = source.conversations().first().map(|c| c.id);
                let selected = {
                    let mut screen = parts.screen.borrow_mut();
                    screen.replace_source(source);
                    if screen.active_conversation().is_none() {
                        if let Some(id) = first {
                            screen.dispatch(ChatAction::Select(id));
                        }
                    }
                    screen.active_conversation().map(|c| c.id)
                };
                parts.reload_sidebar();
                parts.chat.refresh();
                if let Some(id) = selected {
                    parts.watch(id);
                    load_history(client_for_history.clone(), id, parts.clone());
                }
            }
            Err(err) => parts.toast(&format!("Failed to load chats: {}", err)),
        }
        glib::ControlFlow::Continue
    });
}

fn load_history(client: Arc<ApiClient>, id: ConversationId, parts: Parts) {
    let rx = munglog::utils::run_async_to_main(async move {
        let page = client
            .messages(id, MessageQuery { before_seq: None, size: Some(HISTORY_PAGE) })
            .await?;
        if let Err(e) = client.mark_read(id).await {
            warn!("could not mark conversation {id} read: {e}");
        }
        Ok::<_, munglog::api::ApiError>(page)
    });
    rx.attach(None, move |res| {
        match res {
            Ok(page) => {
                let messages: Vec<Message> = page
                    .content
                    .iter()
                    .enumerate()
                    .map(|(i, dto)| Message::from_dto(dto, parts.member_id, i as i64))
                    .collect();
                parts.screen.borrow_mut().set_history(id, messages);
                parts.chat.refresh();
            }
            Err(err) => parts.toast(&format!("Failed to load messages: {}", err)),
        }
        glib::ControlFlow::Continue
    });
}

fn apply_live_event(parts: &Parts, client: Option<Arc<ApiClient>>, event: StompEvent) {
    match event {
        StompEvent::Message(dto) => {
            {
                let mut screen = parts.screen.borrow_mut();
                let fallback_id = screen.source().messages(dto.room_id).len() as i64;
                let message = Message::from_dto(&dto, parts.member_id, fallback_id);
                screen.push_message(dto.room_id, message);
            }
            parts.chat.refresh();
        }
        StompEvent::RoomSummary(summary) => {
            let known = parts.screen.borrow_mut().apply_summary(&summary);
            if known {
                parts.reload_sidebar();
            } else if let Some(client) = client {
                debug!("summary for new room {}, reloading rooms", summary.room_id);
                load_rooms(client, parts.clone());
            }
        }
    }
}

/// Build and present the chat window. Fails only when no canvas can be
/// created at all, in which case nothing is shown.
pub fn show_main_window(app: &Application, backend: Backend) -> Result<(), cairo::Error> {
    let (surface, metrics) = CairoSurface::for_metrics(backend.settings().canvas.clone())?;

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Munglog")
        .default_width(1200)
        .default_height(700)
        .build();

    let overlay = adw::ToastOverlay::new();

    let renderer = ChatRenderer::new(surface, metrics).with_title("Munglog");
    let source = match &backend {
        Backend::Demo { .. } => StaticSource::sample(),
        Backend::Remote { .. } => StaticSource::default(),
    };
    let (sender, live) = make_sender(&backend);
    let (live, events) = live.unzip();
    let screen: SharedScreen = Rc::new(RefCell::new(ChatScreen::new(source, sender, renderer)));

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Rc::new(Sidebar::new());
    split.set_flap(Some(&sidebar.widget()));

    let chat = ChatView::new(screen.clone());
    split.set_content(Some(&chat.widget()));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some("Munglog"));
    header.set_title_widget(Some(&title));

    let parts = Parts {
        screen: screen.clone(),
        sidebar: sidebar.clone(),
        chat: chat.clone(),
        overlay: overlay.clone(),
        member_id: backend.settings().member_id,
        live,
    };

    if let Some(events) = events {
        let parts = parts.clone();
        let client = backend.client();
        events.attach(None, move |event| {
            apply_live_event(&parts, client.clone(), event);
            glib::ControlFlow::Continue
        });
    }

    {
        let parts = parts.clone();
        let client = backend.client();
        sidebar.connect_selected(move |id| {
            let changed = {
                let mut screen = parts.screen.borrow_mut();
                let changed = screen.state().selected != id;
                screen.dispatch(ChatAction::Select(id));
                changed
            };
            parts.chat.refresh();
            if changed {
                parts.watch(id);
            }
            if let (true, Some(client)) = (changed, client.clone()) {
                load_history(client, id, parts.clone());
            }
        });
    }
    parts.reload_sidebar();

    if let Backend::Remote { client, .. } = &backend {
        let new_chat_btn = gtk4::Button::with_label("New Chat");
        new_chat_btn.add_css_class("suggested-action");
        header.pack_end(&new_chat_btn);

        let client = client.clone();
        let parts_for_dialog = parts.clone();
        let window_for_dialog = window.clone();
        new_chat_btn.connect_clicked(move |_| {
            show_new_chat_dialog(&window_for_dialog, client.clone(), parts_for_dialog.clone());
        });
    }

    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    if let Some(client) = backend.client() {
        load_rooms(client, parts);
    }
    Ok(())
}

fn show_new_chat_dialog(window: &adw::ApplicationWindow, client: Arc<ApiClient>, parts: Parts) {
    let dialog = gtk4::Dialog::builder()
        .title("Start New Chat")
        .transient_for(window)
        .modal(true)
        .build();
    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let info = gtk4::Label::new(Some("Member ids to chat with, separated by commas:"));
    info.set_halign(gtk4::Align::Start);
    content.append(&info);

    let entry = gtk4::Entry::new();
    entry.set_placeholder_text(Some("e.g. 12 or 12, 31"));
    entry.set_hexpand(true);
    content.append(&entry);

    dialog.set_child(Some(&content));
    let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
    let ok_btn = dialog.add_button("Start", gtk4::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk4::ResponseType::Ok);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk4::ResponseType::Ok {
            let text = entry.text();
            let parsed: Result<Vec<i64>, _> = text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<i64>)
                .collect();
            let members = match parsed {
                Ok(members) if !members.is_empty() => members,
                _ => {
                    parts.toast("Please enter one or more numeric member ids.");
                    return;
                }
            };

            let client_for_create = client.clone();
            let rx = munglog::utils::run_async_to_main(async move {
                if let [other] = members.as_slice() {
                    client_for_create.create_private_room(*other).await
                } else {
                    client_for_create.create_group_room(&members).await
                }
            });
            let client_for_reload = client.clone();
            let parts_for_reload = parts.clone();
            rx.attach(None, move |res| {
                match res {
                    Ok(_room_id) => load_rooms(client_for_reload.clone(), parts_for_reload.clone()),
                    Err(err) => parts_for_reload.toast(&format!("Failed to create chat: {}", err)),
                }
                glib::ControlFlow::Continue
            });
        }
        dlg.close();
    });

    dialog.present();
}
