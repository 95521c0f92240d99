//! Device inventory providers
//!
//! Device-dependent branches in the placement manager are driven by a
//! [`DeviceInventory`] implementation rather than a global query, so they
//! can be unit-tested without real hardware.

use burn::tensor::backend::Backend;

use crate::backend::{DefaultBackend, DefaultDevice};

/// Capability provider describing the compute devices available to a run.
pub trait DeviceInventory<B: Backend> {
    /// Number of usable accelerator devices.
    fn accelerator_count(&self) -> usize;

    /// Device handle for accelerator `index` (`index < accelerator_count()`).
    fn accelerator(&self, index: usize) -> B::Device;

    /// The host device models are constructed on.
    fn host(&self) -> B::Device;

    /// Total memory reported for accelerator `index`, in MB, when known.
    fn accelerator_memory_mb(&self, index: usize) -> Option<f64>;
}

/// Inventory backed by the machine the process runs on.
///
/// Accelerators are only reported when the binary was built with the `cuda`
/// feature; a CPU-only build cannot address them regardless of what the
/// machine carries.
#[derive(Debug, Clone)]
pub struct SystemInventory {
    memory_totals_mb: Vec<f64>,
}

impl SystemInventory {
    /// Probe the machine once; the inventory does not refresh.
    pub fn detect() -> Self {
        #[cfg(feature = "cuda")]
        {
            Self {
                memory_totals_mb: probe_accelerator_memory(),
            }
        }

        #[cfg(not(feature = "cuda"))]
        {
            Self {
                memory_totals_mb: Vec::new(),
            }
        }
    }
}

impl DeviceInventory<DefaultBackend> for SystemInventory {
    fn accelerator_count(&self) -> usize {
        self.memory_totals_mb.len()
    }

    fn accelerator(&self, index: usize) -> DefaultDevice {
        #[cfg(feature = "cuda")]
        {
            burn_cuda::CudaDevice::new(index)
        }

        #[cfg(not(feature = "cuda"))]
        {
            let _ = index;
            Default::default()
        }
    }

    fn host(&self) -> DefaultDevice {
        Default::default()
    }

    fn accelerator_memory_mb(&self, index: usize) -> Option<f64> {
        self.memory_totals_mb.get(index).copied()
    }
}

/// Query per-device total memory from nvidia-smi (one line per device).
#[cfg(feature = "cuda")]
fn probe_accelerator_memory() -> Vec<f64> {
    let output = std::process::Command::new("nvidia-smi")
        .args(["--query-gpu=memory.total", "--format=csv,noheader,nounits"])
        .output();

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<f64>().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// A fixed inventory: explicit host device, explicit accelerator list.
///
/// Used by tests, and useful for pinning a run to the host regardless of
/// what the machine reports.
#[derive(Debug, Clone)]
pub struct StaticInventory<B: Backend> {
    host: B::Device,
    accelerators: Vec<(B::Device, Option<f64>)>,
}

impl<B: Backend> StaticInventory<B> {
    /// An inventory with no accelerators.
    pub fn host_only(host: B::Device) -> Self {
        Self {
            host,
            accelerators: Vec::new(),
        }
    }

    /// Add an accelerator with an optional reported memory total.
    pub fn with_accelerator(mut self, device: B::Device, memory_mb: Option<f64>) -> Self {
        self.accelerators.push((device, memory_mb));
        self
    }
}

impl<B: Backend> DeviceInventory<B> for StaticInventory<B> {
    fn accelerator_count(&self) -> usize {
        self.accelerators.len()
    }

    fn accelerator(&self, index: usize) -> B::Device {
        self.accelerators[index].0.clone()
    }

    fn host(&self) -> B::Device {
        self.host.clone()
    }

    fn accelerator_memory_mb(&self, index: usize) -> Option<f64> {
        self.accelerators.get(index).and_then(|(_, mb)| *mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_static_inventory_host_only() {
        let inventory = StaticInventory::<TestBackend>::host_only(Default::default());
        assert_eq!(inventory.accelerator_count(), 0);
        assert_eq!(inventory.accelerator_memory_mb(0), None);
    }

    #[test]
    fn test_static_inventory_accelerators() {
        let inventory = StaticInventory::<TestBackend>::host_only(Default::default())
            .with_accelerator(Default::default(), Some(8192.0))
            .with_accelerator(Default::default(), None);

        assert_eq!(inventory.accelerator_count(), 2);
        assert_eq!(inventory.accelerator_memory_mb(0), Some(8192.0));
        assert_eq!(inventory.accelerator_memory_mb(1), None);
    }
}
