//! Weight Loader
//!
//! Validates and binds a persisted weight artifact onto a constructed
//! model. Artifacts are burn record files written by a prior training
//! process with the same recorder.
//!
//! Loading is all-or-nothing: the record must structurally match the
//! model's parameter set, and any deserialization failure is fatal. A
//! missing artifact is reported as its own error so the process can exit
//! with the distinguished code before any accelerator memory is touched.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use tracing::info;

use crate::utils::error::{EvalError, Result};

/// Resolve the on-disk file backing a weight path.
///
/// The recorder stores records with an `.mpk` extension; both the exact
/// path and the extensionless form are accepted.
pub fn resolve_artifact(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(EvalError::WeightFileNotFound(path.to_path_buf()));
    }

    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let with_extension = path.with_extension("mpk");
    if with_extension.is_file() {
        return Ok(with_extension);
    }

    Err(EvalError::WeightFileNotFound(path.to_path_buf()))
}

/// Deserialize the artifact at `path` onto `device` and bind it onto
/// `model`, overwriting every parameter value in place.
///
/// `device` must be the device the model will run on (host, or the primary
/// accelerator), so loading never transiently stages the weights anywhere
/// larger than the eventual run needs.
pub fn load_weights<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    let artifact = resolve_artifact(path)?;
    info!("Loading weights from {:?}", artifact);

    let recorder = CompactRecorder::new();
    model
        .load_file(artifact, &recorder, device)
        .map_err(|e| EvalError::WeightSchemaMismatch(format!("{:?}", e)))
}
