//! Backend selection for the Burn framework.
//!
//! Inference runs on the NdArray (CPU) backend by default so the crate
//! works anywhere; the `cuda` feature switches to the CUDA backend for
//! GPU deployments. Explanation lifts tensors into the autodiff variant
//! of whichever backend is active.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// Autodiff wrapper over the default backend, used for gradient capture.
pub type AutodiffDefaultBackend = Autodiff<DefaultBackend>;

/// Get the default device for the active backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Get a human-readable name for the active backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name() {
        assert!(!backend_name().is_empty());
    }

    #[test]
    fn test_default_device() {
        // Device construction must not panic
        let _ = default_device();
    }
}
