//! Validation-set loader
//!
//! Scans an ImageFolder-style directory tree: one subdirectory per class,
//! image files inside. Class directories are sorted to assign stable label
//! indices. An ImageNet-style `val/` subdirectory is preferred when the
//! given root contains one.

use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::utils::error::{EvalError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single validation sample
#[derive(Debug, Clone)]
pub struct ValSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class directory name
    pub class_name: String,
}

/// Validation dataset with lazily loaded images
#[derive(Debug)]
pub struct ValDataset {
    /// Resolved root directory
    pub root: PathBuf,
    /// All samples, grouped by class in label order
    pub samples: Vec<ValSample>,
    /// Sorted class directory names; index = label
    pub classes: Vec<String>,
}

impl ValDataset {
    /// Scan a dataset root.
    ///
    /// The directory should be structured as:
    /// ```text
    /// root/            (or root/val/)
    /// ├── n01440764/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// └── n01443537/
    ///     └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.join("val").is_dir() {
            root.join("val")
        } else {
            root.to_path_buf()
        };

        if !root.is_dir() {
            return Err(EvalError::Dataset(format!(
                "dataset directory does not exist: {:?}",
                root
            )));
        }

        info!("Scanning validation set at {:?}", root);

        let mut classes: Vec<String> = std::fs::read_dir(&root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .collect();
        classes.sort();

        if classes.is_empty() {
            return Err(EvalError::Dataset(format!(
                "no class directories found under {:?}",
                root
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in classes.iter().enumerate() {
            for entry in WalkDir::new(root.join(class_name))
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                let is_image = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false);

                if is_image {
                    samples.push(ValSample {
                        path,
                        label,
                        class_name: class_name.clone(),
                    });
                }
            }
        }

        if samples.is_empty() {
            return Err(EvalError::Dataset(format!(
                "no images found under {:?}",
                root
            )));
        }

        info!(
            "Found {} classes, {} validation samples",
            classes.len(),
            samples.len()
        );

        Ok(Self {
            root,
            samples,
            classes,
        })
    }

    /// Number of classes discovered in the directory tree.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset is empty (never true for a constructed value).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(path: &Path) {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([120, 80, 40]));
        img.save(path).unwrap();
    }

    fn make_dataset_dir(dir: &Path, classes: &[(&str, usize)]) {
        for (class, count) in classes {
            let class_dir = dir.join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            for i in 0..*count {
                write_image(&class_dir.join(format!("img_{}.png", i)));
            }
        }
    }

    #[test]
    fn test_scan_assigns_sorted_labels() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset_dir(dir.path(), &[("zebra", 1), ("apple", 2)]);

        let dataset = ValDataset::new(dir.path()).unwrap();

        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.classes, vec!["apple", "zebra"]);

        let apple: Vec<_> = dataset.samples.iter().filter(|s| s.label == 0).collect();
        assert!(apple.iter().all(|s| s.class_name == "apple"));
        assert_eq!(apple.len(), 2);
    }

    #[test]
    fn test_prefers_val_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        make_dataset_dir(&dir.path().join("val"), &[("apple", 1)]);

        let dataset = ValDataset::new(dir.path()).unwrap();
        assert_eq!(dataset.root, dir.path().join("val"));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let err = ValDataset::new("/nonexistent/imagenet").unwrap_err();
        assert!(matches!(err, EvalError::Dataset(_)));
    }

    #[test]
    fn test_empty_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ValDataset::new(dir.path()).is_err());
    }
}
