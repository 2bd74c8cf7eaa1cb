use adw::Application;
use log::{error, info};

use munglog::config::Settings;

use crate::ui::main_window::{Backend, show_main_window};

pub fn build_ui(app: &Application) {
    let settings = Settings::load();
    if settings.has_server() {
        crate::ui::login::show_login_window(app, settings);
    } else {
        info!("no server configured, opening the offline demo");
        if let Err(e) = show_main_window(app, Backend::Demo { settings: settings.clone() }) {
            error!("could not open the chat window: {e}");
            crate::ui::login::show_login_window(app, settings);
        }
    }
}
