pub mod config;
pub mod latency_color;
pub mod prober;
pub mod sample;
pub mod sampler;
pub mod stats;
pub mod timer;

use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Vec2};
use log::{info, trace, warn};
use thiserror::Error;
use tokio::runtime::Handle;

pub use config::{AppConfig, ConfigError};
pub use latency_color::LatencyColor;
pub use prober::{HttpProber, ProbeError, Prober};
pub use sample::{FAILURE_SENTINEL, Latency, Sample, SampleEvent, SampleLog};
pub use sampler::{Sampler, SamplerSettings, SamplerView};
pub use stats::{StatsSnapshot, compute_stats, compute_window_stats};

const CHART_HEIGHT: f32 = 240.0;
const LABEL_EVERY: usize = 5;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct StabilityApp {
    config: AppConfig,
    config_path: Option<PathBuf>,
    endpoint_input: String,
    runtime: Handle,
    sampler: Sampler,
    error: Option<String>,
}

impl StabilityApp {
    pub fn new(config: AppConfig, runtime: Handle) -> Result<Self, AppError> {
        config.validate()?;
        let prober = Self::build_prober(&config)?;
        let sampler = Sampler::new(prober, config.sampler_settings(), runtime.clone());
        Ok(Self {
            endpoint_input: config.endpoint.clone(),
            config,
            config_path: None,
            runtime,
            sampler,
            error: None,
        })
    }

    /// Saves endpoint changes to `path` instead of the user config directory.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    fn build_prober(config: &AppConfig) -> Result<Arc<dyn Prober>, AppError> {
        let prober = HttpProber::new(config.endpoint_url()?, config.timeout())?;
        Ok(Arc::new(prober))
    }

    /// Repaints `ctx` whenever a new sample lands, until the sampler is dropped.
    pub fn repaint_on_samples(&self, ctx: egui::Context) {
        let mut events = self.sampler.subscribe();
        self.runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                trace!("sample event {event:?}");
                ctx.request_repaint();
            }
        });
    }

    /// Points the sampler at an endpoint edited while stopped.
    fn apply_endpoint(&mut self) -> Result<(), AppError> {
        let endpoint = self.endpoint_input.trim();
        if endpoint == self.config.endpoint {
            return Ok(());
        }

        let config = AppConfig {
            endpoint: endpoint.to_string(),
            ..self.config.clone()
        };
        config.validate()?;
        self.sampler.set_prober(Self::build_prober(&config)?);
        self.config = config;
        info!("probing {}", self.config.endpoint);

        let saved = match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        };
        if let Err(e) = saved {
            warn!("failed to save config: {e}");
        }
        Ok(())
    }

    fn toggle(&mut self) {
        if self.sampler.is_running() {
            self.sampler.stop();
            return;
        }

        match self.apply_endpoint() {
            Ok(()) => {
                self.error = None;
                self.sampler.start();
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn stat_label(ui: &mut egui::Ui, name: &str, value: u32) {
        let text = RichText::new(format!("{name}: {value} ms"));
        let text = match LatencyColor::for_stat(value) {
            Some(color) => text.color(color.to_color32()),
            None => text,
        };
        ui.label(text);
    }

    fn stats_row(ui: &mut egui::Ui, stats: &StatsSnapshot) {
        ui.horizontal(|ui| {
            Self::stat_label(ui, "Min", stats.min);
            Self::stat_label(ui, "Max", stats.max);
            Self::stat_label(ui, "Avg", stats.mean_rounded());
        });
    }

    fn draw_chart(&self, ui: &mut egui::Ui, samples: &[Sample]) {
        let (rect, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), CHART_HEIGHT), Sense::hover());
        let painter = ui.painter();
        let text_color = ui.visuals().text_color();

        painter.text(
            Pos2::new(rect.center().x, rect.top()),
            Align2::CENTER_TOP,
            "Latency (ms)",
            FontId::proportional(14.0),
            text_color,
        );

        if samples.is_empty() {
            return;
        }

        let plot = Rect::from_min_max(
            Pos2::new(rect.left(), rect.top() + 36.0),
            Pos2::new(rect.right(), rect.bottom() - 18.0),
        );
        let slots = self.sampler.settings().window_size.max(samples.len());
        let slot_width = plot.width() / slots as f32;
        let peak = samples.iter().map(|s| s.latency.as_millis()).max().unwrap_or(0).max(1) as f32;

        for (i, sample) in samples.iter().enumerate() {
            let ms = sample.latency.as_millis();
            let height = plot.height() * ms as f32 / peak;
            let left = plot.left() + slot_width * i as f32 + slot_width * 0.1;
            let bar = Rect::from_min_max(
                Pos2::new(left, plot.bottom() - height),
                Pos2::new(left + slot_width * 0.8, plot.bottom()),
            );
            painter.rect_filled(bar, 0.0, LatencyColor::for_sample(ms).to_color32());
            painter.text(
                Pos2::new(bar.center().x, bar.top() - 2.0),
                Align2::CENTER_BOTTOM,
                ms.to_string(),
                FontId::proportional(10.0),
                text_color,
            );

            if i % LABEL_EVERY == 0 {
                painter.text(
                    Pos2::new(bar.center().x, rect.bottom()),
                    Align2::CENTER_BOTTOM,
                    sample.clock_label(),
                    FontId::proportional(10.0),
                    Color32::GRAY,
                );
            }
        }
    }
}

impl eframe::App for StabilityApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = self.sampler.view();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Stability test");
            ui.label("A simple tool to check your internet connection and stability");

            ui.horizontal(|ui| {
                ui.label("Endpoint:");
                ui.add_enabled(!view.running, egui::TextEdit::singleline(&mut self.endpoint_input));
            });

            if ui.button(if view.running { "Stop" } else { "Start" }).clicked() {
                self.toggle();
            }

            if let Some(error) = &self.error {
                ui.colored_label(LatencyColor::Red.to_color32(), error);
            }

            ui.separator();

            ui.horizontal(|ui| {
                ui.label(format!("Sent: {}", view.stats.sent_count));
                let failed = RichText::new(format!("Failed: {}", view.stats.failed_count));
                if view.stats.failed_count > 0 {
                    ui.label(failed.color(LatencyColor::Red.to_color32()));
                } else {
                    ui.label(failed);
                }
            });
            Self::stats_row(ui, &view.stats);

            ui.label(format!("Last {} samples:", view.recent.len()));
            Self::stats_row(ui, &view.recent_stats);

            ui.separator();

            self.draw_chart(ui, &view.recent);
        });
    }
}
