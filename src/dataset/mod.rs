//! Dataset module: validation-set scanning, decoding and batching.

pub mod batcher;
pub mod loader;

pub use batcher::{EvalImageDataset, ImageBatch, ImageBatcher, ImageItem, IMAGENET_MEAN, IMAGENET_STD};
pub use loader::{ValDataset, ValSample};
