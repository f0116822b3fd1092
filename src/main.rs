#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::path::PathBuf;

use clap::Parser;
use eframe::egui;

use loglens::{LogViewer, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "loglens")]
#[command(about = "Viewer for Trace / Messages / OTA device logs", long_about = None)]
struct Cli {
    /// Log file to open on startup
    file: Option<PathBuf>,

    /// Parser worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Lines per parse batch
    #[arg(long)]
    batch_size: Option<usize>,
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ViewerConfig::default();
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }
    log::info!(
        "starting with {} workers, batch size {}",
        config.workers,
        config.batch_size
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("LogLens - Device Log Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "LogLens",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(LogViewer::new(config, cli.file)))
        }),
    )
}
