mod app;
mod ui;

use adw::Application;
use adw::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let app = Application::builder()
        .application_id("com.munglog.Chat")
        .build();
    app.connect_activate(crate::app::build_ui);
    app.run();
}
