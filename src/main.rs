//! Evaluation CLI
//!
//! Command-line entry point: parses flags, builds the evaluation
//! configuration and drives the pipeline on the compile-time selected
//! backend. Failures map to distinct exit codes so a supervising process
//! can tell a missing weight file apart from everything else.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::info;

use imagenet_eval::backend::{backend_name, DefaultBackend};
use imagenet_eval::eval::{run_evaluation, Metrics};
use imagenet_eval::model::{Architecture, EvalConfig};
use imagenet_eval::placement::SystemInventory;
use imagenet_eval::utils::error::Result;
use imagenet_eval::utils::logging::{init_logging, LogConfig};

/// Evaluate efficient image-classification networks
#[derive(Parser, Debug)]
#[command(
    name = "imagenet_eval",
    version,
    about = "Evaluate efficient image-classification networks on a held-out dataset",
    long_about = "Builds the requested network, reports its parameter and FLOP cost, loads \
                  trained weights, places the model on the available compute devices and \
                  measures top-1/top-5 accuracy."
)]
struct Args {
    /// Number of data loading workers
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Path to the dataset root
    #[arg(long, default_value = "")]
    data: String,

    /// Mini-batch size for evaluation
    #[arg(long, default_value = "512")]
    batch_size: usize,

    /// Number of classes in the dataset
    #[arg(long, default_value = "1000")]
    num_classes: usize,

    /// Factor by which channel widths are scaled (s > 1 widens, s < 1 narrows)
    #[arg(long, default_value = "1.0")]
    s: f64,

    /// Path to the trained weight file
    #[arg(long, default_value = "")]
    weights: String,

    /// Input size (legacy; width/height govern the constructors)
    #[arg(long = "inpSize", default_value = "224")]
    inp_size: usize,

    /// Which model to evaluate (basic_dw, basic_vw, shuffle_dw, shuffle_vw)
    #[arg(long, default_value = "basic_dw")]
    model: Architecture,

    /// Model input width
    #[arg(long, default_value = "224")]
    model_width: usize,

    /// Model input height
    #[arg(long, default_value = "224")]
    model_height: usize,

    /// Number of input channels
    #[arg(long, default_value = "3")]
    channels: usize,

    /// Write the accuracy metrics to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> EvalConfig {
        EvalConfig {
            arch: self.model,
            width_scale: self.s,
            model_width: self.model_width,
            model_height: self.model_height,
            channels: self.channels,
            num_classes: self.num_classes,
            batch_size: self.batch_size,
            workers: self.workers,
            data_parallel: true,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &Args) -> Result<Metrics> {
    info!("Model: {}", args.model);
    info!("Backend: {}", backend_name());
    info!("Dataset: {}", args.data);
    info!("Weights: {}", args.weights);
    if args.inp_size != 224 {
        info!(
            "inpSize {} given; model width/height {}x{} govern the input shape",
            args.inp_size, args.model_width, args.model_height
        );
    }

    let config = args.to_config();
    let inventory = SystemInventory::detect();

    let metrics = run_evaluation::<DefaultBackend, _>(
        &config,
        Path::new(&args.data),
        Path::new(&args.weights),
        &inventory,
    )?;

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&metrics)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(output, json)?;
        info!("Metrics written to {:?}", output);
    }

    Ok(metrics)
}
