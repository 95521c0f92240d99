//! Replication adapter
//!
//! Runs identical copies of a classifier on multiple accelerator devices.
//! Each forward pass shards the batch across the replicas and gathers the
//! outputs back on the output device: a synchronous fan-out/fan-in per
//! batch, not an asynchronous pipeline.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::model::ImageClassifier;

/// A classifier replicated over a fixed set of devices.
#[derive(Debug)]
pub struct ReplicatedClassifier<B: Backend, M> {
    replicas: Vec<M>,
    devices: Vec<B::Device>,
    output_device: B::Device,
}

impl<B: Backend, M: ImageClassifier<B>> ReplicatedClassifier<B, M> {
    pub(crate) fn new(replicas: Vec<M>, devices: Vec<B::Device>, output_device: B::Device) -> Self {
        debug_assert_eq!(replicas.len(), devices.len());
        Self {
            replicas,
            devices,
            output_device,
        }
    }

    /// Number of replicas (one per target device).
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Shard the batch across the replicas, run them, gather the outputs.
    ///
    /// Batches smaller than the replica count produce fewer shards; the
    /// surplus replicas simply sit out that step.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let shards = images.chunk(self.replicas.len(), 0);

        let outputs: Vec<Tensor<B, 2>> = shards
            .into_iter()
            .zip(self.replicas.iter().zip(self.devices.iter()))
            .map(|(shard, (replica, device))| {
                replica
                    .forward(shard.to_device(device))
                    .to_device(&self.output_device)
            })
            .collect();

        Tensor::cat(outputs, 0)
    }
}
