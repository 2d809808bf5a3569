//! Compute backends.
//!
//! The CPU backend (NdArray) is always available. The GPU backend (WGPU) is
//! compiled in with the `wgpu` feature and chosen by a model's `use_cuda`
//! flag.

use std::fmt;

pub type CpuBackend = burn_ndarray::NdArray<f32>;
pub type CpuAutodiffBackend = burn_autodiff::Autodiff<CpuBackend>;

#[cfg(feature = "wgpu")]
pub type GpuBackend = burn_wgpu::Wgpu;
#[cfg(feature = "wgpu")]
pub type GpuAutodiffBackend = burn_autodiff::Autodiff<GpuBackend>;

/// Backend a task runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// NdArray (CPU)
    Cpu,
    /// WGPU (GPU)
    #[cfg(feature = "wgpu")]
    Wgpu,
}

impl DeviceType {
    /// Backend for a model's `use_cuda` setting
    pub fn select(use_cuda: bool) -> Self {
        #[cfg(feature = "wgpu")]
        if use_cuda {
            return DeviceType::Wgpu;
        }
        if use_cuda {
            tracing::warn!("use_cuda is set but GPU support is not compiled in, running on the CPU");
        }
        DeviceType::Cpu
    }

    pub fn cpu_device() -> burn_ndarray::NdArrayDevice {
        burn_ndarray::NdArrayDevice::Cpu
    }

    #[cfg(feature = "wgpu")]
    pub fn gpu_device() -> burn_wgpu::WgpuDevice {
        burn_wgpu::WgpuDevice::DiscreteGpu(0)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
            #[cfg(feature = "wgpu")]
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
        }
    }
}
