#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use storyboard_studio::StoryboardApp;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Storyboard Studio v{} starting", env!("CARGO_PKG_VERSION"));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1440.0, 960.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("Storyboard Studio"),
        ..Default::default()
    };

    eframe::run_native(
        "storyboard_studio",
        options,
        Box::new(|cc| Ok(Box::new(StoryboardApp::new(cc)))),
    )
}

// The web build embeds the library; the binary has nothing to run there.
#[cfg(target_arch = "wasm32")]
fn main() {}
