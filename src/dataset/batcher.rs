//! Burn dataset integration
//!
//! Implements burn's `Dataset` trait over the scanned validation samples
//! and a `Batcher` producing `(images, targets)` tensor pairs with ImageNet
//! normalization.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;

use super::loader::ValDataset;
use crate::utils::error::{EvalError, Result};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single decoded image ready for batching
#[derive(Clone, Debug)]
pub struct ImageItem {
    /// Flattened CHW float data in `[0, 1]`
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
}

impl ImageItem {
    /// Load and preprocess one image: resize, channel conversion, CHW layout.
    pub fn from_path(
        path: &Path,
        label: usize,
        height: usize,
        width: usize,
        channels: usize,
    ) -> anyhow::Result<Self> {
        let img = ImageReader::open(path)?
            .decode()?
            .resize_exact(width as u32, height as u32, FilterType::Triangle);

        let image = match channels {
            1 => img
                .to_luma8()
                .pixels()
                .map(|p| p[0] as f32 / 255.0)
                .collect(),
            3 => {
                let rgb = img.to_rgb8();
                let plane = height * width;
                let mut data = vec![0.0f32; 3 * plane];
                for (i, pixel) in rgb.pixels().enumerate() {
                    data[i] = pixel[0] as f32 / 255.0;
                    data[plane + i] = pixel[1] as f32 / 255.0;
                    data[2 * plane + i] = pixel[2] as f32 / 255.0;
                }
                data
            }
            other => anyhow::bail!("unsupported channel count: {}", other),
        };

        Ok(Self { image, label })
    }
}

/// Validation samples exposed through burn's `Dataset` trait.
///
/// Images are decoded on demand by the dataloader workers; nothing is held
/// in memory beyond the path list.
#[derive(Debug, Clone)]
pub struct EvalImageDataset {
    samples: Vec<(PathBuf, usize)>,
    height: usize,
    width: usize,
    channels: usize,
}

impl EvalImageDataset {
    /// Build from a scanned validation set.
    pub fn from_loader(
        loader: &ValDataset,
        height: usize,
        width: usize,
        channels: usize,
    ) -> Result<Self> {
        if channels != 1 && channels != 3 {
            return Err(EvalError::Dataset(format!(
                "the image loader supports 1 or 3 channels, got {}",
                channels
            )));
        }

        let samples = loader
            .samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect();

        Ok(Self {
            samples,
            height,
            width,
            channels,
        })
    }
}

impl Dataset<ImageItem> for EvalImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let (path, label) = self.samples.get(index)?;
        ImageItem::from_path(path, *label, self.height, self.width, self.channels).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of validation images
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Images with shape `[batch_size, channels, height, width]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher assembling normalized image batches
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    #[allow(dead_code)]
    device: B::Device,
    height: usize,
    width: usize,
    channels: usize,
}

impl<B: Backend> ImageBatcher<B> {
    /// Create a batcher for the given device and image shape.
    pub fn new(device: B::Device, height: usize, width: usize, channels: usize) -> Self {
        Self {
            device,
            height,
            width,
            channels,
        }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(
                images_data,
                [batch_size, self.channels, self.height, self.width],
            ),
            device,
        );

        // ImageNet normalization: (x - mean) / std. Only defined for RGB;
        // other channel counts stay in [0, 1].
        let images = if self.channels == 3 {
            let mean = Tensor::<B, 4>::from_floats(
                TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
                device,
            );
            let std = Tensor::<B, 4>::from_floats(
                TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
                device,
            );
            (images - mean) / std
        } else {
            images
        };

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ImageBatch { images, targets }
    }
}
