#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::egui;
use egui::IconData;
use stability_test::{AppConfig, StabilityApp};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Probing runs here, off the UI thread.
    let runtime = tokio::runtime::Runtime::new()?;
    let app = StabilityApp::new(AppConfig::load(), runtime.handle().clone())?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 560.0])
            .with_resizable(false)
            .with_icon(IconData::default()),
        ..Default::default()
    };
    eframe::run_native(
        "Stability Test",
        options,
        Box::new(move |cc| {
            app.repaint_on_samples(cc.egui_ctx.clone());
            Ok(Box::new(app))
        }),
    )?;
    Ok(())
}
