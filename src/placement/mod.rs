//! Device Placement Manager
//!
//! Decides, from the runtime device inventory, where a weighted model runs:
//! left on the host, moved to a single accelerator, or replicated across
//! every available accelerator. Placement happens strictly after weight
//! loading so only the fully-weighted model is transferred.

pub mod inventory;
pub mod replicated;

use std::fmt;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::debug;

use crate::model::ImageClassifier;
use crate::utils::error::{EvalError, Result};

pub use inventory::{DeviceInventory, StaticInventory, SystemInventory};
pub use replicated::ReplicatedClassifier;

/// Seed applied once before replicated execution so kernel selection and
/// any backend randomness repeat across runs.
const REPRODUCIBILITY_SEED: u64 = 42;

/// Where the model will run. Recomputed every run, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// No accelerators: the model stays in host memory, unwrapped.
    HostOnly,
    /// One accelerator in use, no replication requested.
    SingleAccelerator,
    /// Replicated across this many accelerators.
    Replicated(usize),
}

impl Placement {
    /// Derive the placement decision from the device inventory and the
    /// caller's replication request.
    pub fn plan(accelerators: usize, data_parallel: bool) -> Self {
        if accelerators == 0 {
            Placement::HostOnly
        } else if data_parallel {
            Placement::Replicated(accelerators)
        } else {
            Placement::SingleAccelerator
        }
    }

    /// Short device hint passed through to collaborators.
    pub fn device_hint(&self) -> &'static str {
        match self {
            Placement::HostOnly => "host",
            Placement::SingleAccelerator | Placement::Replicated(_) => "accelerator",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::HostOnly => write!(f, "host-only"),
            Placement::SingleAccelerator => write!(f, "single accelerator"),
            Placement::Replicated(n) => write!(f, "replicated across {} accelerators", n),
        }
    }
}

/// The device weights are deserialized onto and batches are staged on:
/// the host when no accelerator is used, the first accelerator otherwise.
pub fn primary_device<B: Backend, I: DeviceInventory<B>>(
    inventory: &I,
    placement: &Placement,
) -> B::Device {
    match placement {
        Placement::HostOnly => inventory.host(),
        Placement::SingleAccelerator | Placement::Replicated(_) => inventory.accelerator(0),
    }
}

/// A model after placement. Read-only from here on.
#[derive(Debug)]
pub enum PlacedClassifier<B: Backend, M: ImageClassifier<B>> {
    /// Host or single-accelerator execution; the model was forked to its
    /// device (or left untouched for host-only runs).
    Single(M),
    /// Replicated execution across several accelerators.
    Replicated(ReplicatedClassifier<B, M>),
}

impl<B: Backend, M: ImageClassifier<B>> PlacedClassifier<B, M> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            PlacedClassifier::Single(model) => model.forward(images),
            PlacedClassifier::Replicated(replicated) => replicated.forward(images),
        }
    }
}

/// Execute a placement decision on a fully-weighted model.
///
/// Fails with [`EvalError::DevicePlacement`] when a target accelerator
/// reports no usable memory; the run is never silently downgraded to a
/// slower device than planned.
pub fn place<B, M, I>(
    model: M,
    placement: &Placement,
    inventory: &I,
) -> Result<PlacedClassifier<B, M>>
where
    B: Backend,
    M: ImageClassifier<B>,
    I: DeviceInventory<B>,
{
    match placement {
        Placement::HostOnly => Ok(PlacedClassifier::Single(model)),

        Placement::SingleAccelerator => {
            ensure_usable(inventory, 1)?;
            let device = inventory.accelerator(0);
            debug!("Moving model to accelerator 0");
            Ok(PlacedClassifier::Single(model.fork(&device)))
        }

        Placement::Replicated(count) => {
            ensure_usable(inventory, *count)?;

            // Reproducibility over the small throughput gain of
            // non-deterministic kernels; applied once, before any replica
            // dispatches work, and never toggled again mid-run.
            B::seed(REPRODUCIBILITY_SEED);

            let devices: Vec<B::Device> =
                (0..*count).map(|i| inventory.accelerator(i)).collect();
            debug!("Replicating model across {} accelerators", devices.len());

            let output_device = devices[0].clone();
            let replicas: Vec<M> = devices
                .iter()
                .map(|device| model.clone().fork(device))
                .collect();

            Ok(PlacedClassifier::Replicated(ReplicatedClassifier::new(
                replicas,
                devices,
                output_device,
            )))
        }
    }
}

fn ensure_usable<B: Backend, I: DeviceInventory<B>>(inventory: &I, count: usize) -> Result<()> {
    for index in 0..count {
        if let Some(memory_mb) = inventory.accelerator_memory_mb(index) {
            if memory_mb <= 0.0 {
                return Err(EvalError::DevicePlacement(format!(
                    "accelerator {} reports no usable memory",
                    index
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::model::{BasicNet, BasicNetConfig};

    type TestBackend = DefaultBackend;

    fn small_net(device: &<TestBackend as Backend>::Device) -> BasicNet<TestBackend> {
        let config = BasicNetConfig::new()
            .with_num_classes(4)
            .with_height(32)
            .with_width(32);
        BasicNet::new(&config, device)
    }

    #[test]
    fn test_plan_host_only_without_accelerators() {
        assert_eq!(Placement::plan(0, true), Placement::HostOnly);
        assert_eq!(Placement::plan(0, false), Placement::HostOnly);
    }

    #[test]
    fn test_plan_replicates_over_all_accelerators() {
        assert_eq!(Placement::plan(1, true), Placement::Replicated(1));
        assert_eq!(Placement::plan(4, true), Placement::Replicated(4));
        assert_eq!(Placement::plan(2, false), Placement::SingleAccelerator);
    }

    #[test]
    fn test_device_hints() {
        assert_eq!(Placement::HostOnly.device_hint(), "host");
        assert_eq!(Placement::Replicated(2).device_hint(), "accelerator");
    }

    #[test]
    fn test_host_only_placement_keeps_model_unwrapped() {
        let inventory = StaticInventory::<TestBackend>::host_only(Default::default());
        let model = small_net(&inventory.host());

        let placed = place(model, &Placement::HostOnly, &inventory).unwrap();
        assert!(matches!(placed, PlacedClassifier::Single(_)));
    }

    #[test]
    fn test_replicated_placement_preserves_outputs() {
        let host: <TestBackend as Backend>::Device = Default::default();
        let inventory = StaticInventory::<TestBackend>::host_only(host.clone())
            .with_accelerator(host.clone(), None)
            .with_accelerator(host.clone(), None);

        let model = small_net(&host);
        let input = Tensor::<TestBackend, 4>::random(
            [4, 3, 32, 32],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &host,
        );

        let expected: Vec<f32> = model
            .forward(input.clone())
            .into_data()
            .to_vec()
            .unwrap();

        let placement = Placement::plan(inventory.accelerator_count(), true);
        assert_eq!(placement, Placement::Replicated(2));

        let placed = place(model, &placement, &inventory).unwrap();
        if let PlacedClassifier::Replicated(ref replicated) = placed {
            assert_eq!(replicated.replica_count(), 2);
        } else {
            panic!("expected a replicated placement");
        }

        let actual: Vec<f32> = placed.forward(input).into_data().to_vec().unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-5, "placement changed output: {} vs {}", a, e);
        }
    }

    #[test]
    fn test_small_batch_with_more_replicas_than_samples() {
        let host: <TestBackend as Backend>::Device = Default::default();
        let inventory = StaticInventory::<TestBackend>::host_only(host.clone())
            .with_accelerator(host.clone(), None)
            .with_accelerator(host.clone(), None)
            .with_accelerator(host.clone(), None);

        let model = small_net(&host);
        let placed = place(model, &Placement::Replicated(3), &inventory).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &host);
        let output = placed.forward(input);
        assert_eq!(output.dims(), [2, 4]);
    }

    #[test]
    fn test_zero_memory_accelerator_is_fatal() {
        let host: <TestBackend as Backend>::Device = Default::default();
        let inventory = StaticInventory::<TestBackend>::host_only(host.clone())
            .with_accelerator(host.clone(), Some(0.0));

        let model = small_net(&host);
        let err = place(model, &Placement::Replicated(1), &inventory).unwrap_err();

        assert!(matches!(err, EvalError::DevicePlacement(_)));
        assert_eq!(err.exit_code(), 5);
    }
}
