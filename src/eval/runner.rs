//! Evaluation Orchestrator
//!
//! Drives one evaluation run through its fixed sequence: build the model,
//! report its cost, check and load the weight artifact, place the model on
//! the available devices, then run the validation pass. Every step either
//! completes or fails the run; nothing is retried and no step is skipped.

use std::path::Path;
use std::time::Instant;

use burn::data::dataloader::DataLoaderBuilder;
use burn::tensor::backend::Backend;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::dataset::{EvalImageDataset, ImageBatcher, ValDataset};
use crate::model::{
    cost, weights, Architecture, BasicNet, BasicNetConfig, EvalConfig, ImageClassifier,
    ShuffleNet, ShuffleNetConfig,
};
use crate::placement::{self, DeviceInventory, PlacedClassifier, Placement};
use crate::utils::error::Result;

use super::metrics::{AccuracyMeter, Metrics};

/// Run one full evaluation.
///
/// Dispatch over the supported architectures is exhaustive; each arm
/// monomorphizes the same pipeline for its concrete network type.
pub fn run_evaluation<B, I>(
    config: &EvalConfig,
    data_root: &Path,
    weights_path: &Path,
    inventory: &I,
) -> Result<Metrics>
where
    B: Backend,
    I: DeviceInventory<B>,
{
    config.validate()?;

    let host = inventory.host();
    match config.arch {
        Architecture::BasicDw => {
            let model = BasicNet::new(&BasicNetConfig::from_eval(config, true), &host);
            evaluate_model(model, config, data_root, weights_path, inventory)
        }
        Architecture::BasicVw => {
            let model = BasicNet::new(&BasicNetConfig::from_eval(config, false), &host);
            evaluate_model(model, config, data_root, weights_path, inventory)
        }
        Architecture::ShuffleDw => {
            let model = ShuffleNet::new(&ShuffleNetConfig::from_eval(config, true), &host);
            evaluate_model(model, config, data_root, weights_path, inventory)
        }
        Architecture::ShuffleVw => {
            let model = ShuffleNet::new(&ShuffleNetConfig::from_eval(config, false), &host);
            evaluate_model(model, config, data_root, weights_path, inventory)
        }
    }
}

fn evaluate_model<B, M, I>(
    model: M,
    config: &EvalConfig,
    data_root: &Path,
    weights_path: &Path,
    inventory: &I,
) -> Result<Metrics>
where
    B: Backend,
    M: ImageClassifier<B>,
    I: DeviceInventory<B>,
{
    // Cost is a function of the architecture alone and is reported before
    // any weight or device work happens.
    let model_cost = cost::measure(&model);
    println!("FLOPs: {:.2} million", model_cost.flops_millions);
    println!("Network Parameters: {:.2} million", model_cost.params_millions);

    // Fail fast on a missing artifact, before any accelerator memory is
    // touched.
    let artifact = weights::resolve_artifact(weights_path)?;

    let accelerators = inventory.accelerator_count();
    let decision = Placement::plan(accelerators, config.data_parallel);
    let device = placement::primary_device(inventory, &decision);
    info!(
        "Placement: {} ({} accelerator(s) available)",
        decision, accelerators
    );

    // Weights bind before placement so only the fully-weighted model is
    // transferred to each replica.
    let model = weights::load_weights(model, &artifact, &device)?;
    let placed = placement::place(model, &decision, inventory)?;

    let val_set = ValDataset::new(data_root)?;
    let total_samples = val_set.len();
    let dataset = EvalImageDataset::from_loader(
        &val_set,
        config.model_height,
        config.model_width,
        config.channels,
    )?;

    let batcher = ImageBatcher::<B>::new(
        device.clone(),
        config.model_height,
        config.model_width,
        config.channels,
    );
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .num_workers(config.workers.max(1))
        .set_device(device.clone())
        .build(dataset);

    validate(
        &placed,
        loader.iter(),
        total_samples,
        config.num_classes,
        decision.device_hint(),
    )
}

/// The validation pass: forward every batch through the placed model and
/// accumulate top-1/top-5 accuracy.
fn validate<B, M>(
    model: &PlacedClassifier<B, M>,
    batches: impl Iterator<Item = crate::dataset::ImageBatch<B>>,
    total_samples: usize,
    num_classes: usize,
    device_hint: &str,
) -> Result<Metrics>
where
    B: Backend,
    M: ImageClassifier<B>,
{
    info!("Validating {} samples on {}", total_samples, device_hint);

    let start = Instant::now();
    let mut meter = AccuracyMeter::new();

    let progress = ProgressBar::new(total_samples as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({eta})")
            .unwrap()
            .progress_chars("=>-"),
    );

    for batch in batches {
        let batch_size = batch.targets.dims()[0];

        let logits = model.forward(batch.images);
        let logits_vec: Vec<f32> = logits.into_data().to_vec().unwrap();
        let targets_vec: Vec<i64> = batch.targets.into_data().to_vec().unwrap();

        for (row, target) in targets_vec.iter().enumerate() {
            let scores = &logits_vec[row * num_classes..(row + 1) * num_classes];
            meter.update(scores, *target as usize);
        }

        progress.inc(batch_size as u64);
    }

    progress.finish_and_clear();

    let eval_time = start.elapsed().as_secs_f64();
    let metrics = meter.finish(eval_time);

    info!(
        "Evaluation: top-1 = {:.2}%, top-5 = {:.2}%, samples = {}",
        metrics.top1 * 100.0,
        metrics.top5 * 100.0,
        metrics.total_samples
    );
    println!(
        "{} top-1 {:.3}%, top-5 {:.3}% ({} samples in {:.1}s)",
        "Accuracy:".green().bold(),
        metrics.top1 * 100.0,
        metrics.top5 * 100.0,
        metrics.total_samples,
        metrics.eval_time
    );

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::placement::StaticInventory;
    use crate::utils::error::EvalError;
    use burn::module::Module;
    use burn::record::CompactRecorder;
    use std::path::PathBuf;

    type TestBackend = DefaultBackend;

    fn small_config() -> EvalConfig {
        EvalConfig {
            arch: Architecture::BasicDw,
            model_width: 32,
            model_height: 32,
            num_classes: 4,
            batch_size: 3,
            workers: 1,
            ..EvalConfig::default()
        }
    }

    fn make_dataset(dir: &Path) {
        for (class, count) in [("cls_a", 2), ("cls_b", 3)] {
            let class_dir = dir.join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            for i in 0..count {
                image::RgbImage::from_pixel(8, 8, image::Rgb([10 * (i as u8 + 1); 3]))
                    .save(class_dir.join(format!("{}.png", i)))
                    .unwrap();
            }
        }
    }

    fn save_matching_weights(config: &EvalConfig, path: &Path) {
        let device = Default::default();
        let model =
            BasicNet::<TestBackend>::new(&BasicNetConfig::from_eval(config, true), &device);
        model.save_file(path, &CompactRecorder::new()).unwrap();
    }

    #[test]
    fn test_end_to_end_host_only() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        make_dataset(&data_dir);

        let config = small_config();
        let weights_path = dir.path().join("model");
        save_matching_weights(&config, &weights_path);

        let inventory = StaticInventory::<TestBackend>::host_only(Default::default());
        let metrics =
            run_evaluation(&config, &data_dir, &weights_path, &inventory).unwrap();

        assert_eq!(metrics.total_samples, 5);
        assert!(metrics.top1 >= 0.0 && metrics.top1 <= 1.0);
        assert!(metrics.top5 >= metrics.top1);
    }

    #[test]
    fn test_missing_weights_never_reach_placement() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        make_dataset(&data_dir);

        let config = small_config();
        let inventory = StaticInventory::<TestBackend>::host_only(Default::default());

        let err = run_evaluation(
            &config,
            &data_dir,
            &PathBuf::from(dir.path().join("missing")),
            &inventory,
        )
        .unwrap_err();

        assert!(matches!(err, EvalError::WeightFileNotFound(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_invalid_config_is_rejected_first() {
        let mut config = small_config();
        config.batch_size = 0;

        let inventory = StaticInventory::<TestBackend>::host_only(Default::default());
        let err = run_evaluation(
            &config,
            Path::new("/nonexistent"),
            Path::new("/nonexistent"),
            &inventory,
        )
        .unwrap_err();

        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn test_end_to_end_replicated_matches_host() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        make_dataset(&data_dir);

        let config = small_config();
        let weights_path = dir.path().join("model");
        save_matching_weights(&config, &weights_path);

        let host: <TestBackend as Backend>::Device = Default::default();
        let host_inventory = StaticInventory::<TestBackend>::host_only(host.clone());
        let replicated_inventory = StaticInventory::<TestBackend>::host_only(host.clone())
            .with_accelerator(host.clone(), None)
            .with_accelerator(host.clone(), None);

        let host_metrics =
            run_evaluation(&config, &data_dir, &weights_path, &host_inventory).unwrap();
        let replicated_metrics =
            run_evaluation(&config, &data_dir, &weights_path, &replicated_inventory).unwrap();

        assert_eq!(host_metrics.total_samples, replicated_metrics.total_samples);
        assert_eq!(host_metrics.top1, replicated_metrics.top1);
        assert_eq!(host_metrics.top5, replicated_metrics.top5);
    }
}
