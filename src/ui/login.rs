use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;
use log::{info, warn};

use munglog::api::{ApiClient, ApiError};
use munglog::config::Settings;

use crate::ui::main_window::{Backend, show_main_window};

pub fn show_login_window(app: &Application, settings: Settings) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Munglog Login")
        .default_width(420)
        .default_height(300)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to Munglog"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. http://localhost:8080)"));
    server_entry.set_text(&settings.base_url);
    server_entry.set_hexpand(true);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Email"));
    email_entry.set_text(&settings.email);
    email_entry.set_hexpand(true);

    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&email_entry);
    form.append(&pass_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let buttons = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    buttons.set_halign(gtk::Align::End);
    let demo_btn = gtk::Button::with_label("Offline Demo");
    let login_btn = gtk::Button::with_label("Sign In");
    login_btn.add_css_class("suggested-action");
    buttons.append(&demo_btn);
    buttons.append(&login_btn);
    root.append(&buttons);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("Munglog"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let settings = settings.clone();
        demo_btn.connect_clicked(move |_| {
            match show_main_window(&app, Backend::Demo { settings: settings.clone() }) {
                Ok(()) => window.close(),
                Err(e) => {
                    warn!("could not open the demo: {e}");
                    overlay.add_toast(adw::Toast::new(&format!("Could not open the chat window: {}", e)));
                }
            }
        });
    }

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        move || {
            let url = munglog::utils::normalize_url(&server_entry.text());
            let email = email_entry.text().trim().to_string();
            let password = pass_entry.text().to_string();
            if url.is_empty() || email.is_empty() || password.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter server URL, email and password."));
                return;
            }

            status.set_label("Signing in…");

            let url_for_async = url.clone();
            let email_for_async = email.clone();
            let rx: glib::Receiver<Result<(ApiClient, i64), ApiError>> =
                munglog::utils::run_async_to_main(async move {
                    let http = reqwest::Client::builder()
                        .timeout(Duration::from_secs(10))
                        .build()?;
                    let client = ApiClient::with_http(http, &url_for_async);
                    client.login(&email_for_async, &password).await?;
                    let me = client.my_info().await?;
                    Ok((client, me.member_id))
                });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            rx.attach(None, move |res| {
                match res {
                    Ok((client, member_id)) => {
                        info!("signed in to {url} as member {member_id}");
                        status_label.set_label("Signed in");
                        let mut st = Settings::load();
                        st.base_url = url.clone();
                        st.email = email.clone();
                        st.member_id = member_id;
                        if let Err(e) = st.save() {
                            warn!("could not save settings: {e}");
                            overlay2.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                        }
                        let backend = Backend::Remote { client: Arc::new(client), settings: st };
                        match show_main_window(&app2, backend) {
                            Ok(()) => window2.close(),
                            Err(e) => {
                                warn!("could not open the chat window: {e}");
                                overlay2.add_toast(adw::Toast::new(&format!("Could not open the chat window: {}", e)));
                            }
                        }
                    }
                    Err(err) => {
                        warn!("sign in failed: {err}");
                        status_label.set_label("Sign in failed");
                        overlay2.add_toast(adw::Toast::new(&format!("Could not sign in: {}", err)));
                    }
                }
                glib::ControlFlow::Continue
            });
        }
    };

    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        pass_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
