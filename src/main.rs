use std::path::PathBuf;
use std::process::ExitCode;

mod controller;
mod domain;
mod group;
mod inputter;
mod model;
mod parser;
mod source;
mod table;
mod ui;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use controller::Controller;
use domain::{ViewerConfig, ViewerError};
use model::{Model, Status};
use source::{FsTextSource, expand_path};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based viewer for tier list CSV files.")]
struct Args {
    /// CSV files to load at startup, processed in order
    files: Vec<String>,

    /// Write logs to this file (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter, e.g. "tierview=debug"
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Widest a column may render before its content is truncated
    #[arg(long, default_value_t = 32)]
    max_column_width: usize,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(args: &Args) -> Result<(), ViewerError> {
    if let Some(path) = &args.log_file {
        let file = std::sync::Arc::new(std::fs::File::create(path)?);
        tracing_subscriber::registry()
            .with(EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
            .with(fmt::layer().with_writer(file).with_ansi(false))
            .with(ErrorLayer::default())
            .init();
    }
    Ok(())
}

fn run() -> Result<(), ViewerError> {
    let args = Args::parse();
    init_logging(&args)?;
    info!("Starting tierview!");

    let cfg = ViewerConfig::default().max_column_width(args.max_column_width);
    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(
        &cfg,
        Box::new(FsTextSource),
        size.width as usize,
        size.height as usize,
    );

    // One file at a time, each processed to completion (including group
    // placement) before the next. Failures are absorbed per file.
    for raw in &args.files {
        let path = expand_path(raw);
        model.open_file(&path);
    }

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
