use dioxus::prelude::*;
use tracing::Level;

mod api;
mod components;
mod db;
mod session;
mod sleep_timer;
mod transport;
mod utils;

use components::PlayerShell;

const APP_CSS: Asset = asset!("/assets/styling/app.css");

#[cfg(debug_assertions)]
const LOG_LEVEL: Level = Level::DEBUG;
#[cfg(not(debug_assertions))]
const LOG_LEVEL: Level = Level::INFO;

fn main() {
    if let Err(err) = dioxus::logger::init(LOG_LEVEL) {
        eprintln!("Failed to initialize logging: {err}");
    }
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    rsx! {
        document::Title { "ArchivePlayer" }
        document::Meta { name: "theme-color", content: "#1c1917" }
        document::Meta { name: "mobile-web-app-capable", content: "yes" }
        document::Meta { name: "apple-mobile-web-app-title", content: "ArchivePlayer" }

        document::Stylesheet { href: APP_CSS }

        PlayerShell {}
    }
}
