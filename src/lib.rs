//! # imagenet_eval
//!
//! An evaluation harness for efficient image-classification networks built
//! with the Burn framework. Given an architecture identifier, its shape
//! hyperparameters and a trained-weight file, the harness builds the
//! network, reports its parameter and FLOP cost, binds the weights, places
//! the model on the best available compute (host, one accelerator, or
//! replicated across all accelerators) and measures top-1/top-5 accuracy
//! over a held-out validation set.
//!
//! ## Modules
//!
//! - `model`: architecture registry, the four CNN variants, cost
//!   measurement and weight binding
//! - `placement`: device inventory, placement decisions and the
//!   replication adapter
//! - `dataset`: validation-set scanning and batching
//! - `eval`: the evaluation pipeline and accuracy metrics
//! - `utils`: error taxonomy and logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imagenet_eval::backend::DefaultBackend;
//! use imagenet_eval::eval::run_evaluation;
//! use imagenet_eval::model::EvalConfig;
//! use imagenet_eval::placement::SystemInventory;
//!
//! let config = EvalConfig::default();
//! let inventory = SystemInventory::detect();
//! let metrics = run_evaluation::<DefaultBackend, _>(
//!     &config,
//!     "data/imagenet".as_ref(),
//!     "weights/basic_dw".as_ref(),
//!     &inventory,
//! )?;
//! println!("top-1: {:.2}%", metrics.top1 * 100.0);
//! ```

pub mod backend;
pub mod dataset;
pub mod eval;
pub mod model;
pub mod placement;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{ValDataset, IMAGENET_MEAN, IMAGENET_STD};
pub use eval::{run_evaluation, Metrics};
pub use model::{Architecture, CostMetrics, EvalConfig};
pub use placement::{DeviceInventory, Placement, StaticInventory, SystemInventory};
pub use utils::error::{EvalError, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
