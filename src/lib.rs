//! # DermaScan
//!
//! A Rust library for dermatoscopic lesion classification with Grad-CAM
//! explanations, built on the Burn framework.
//!
//! ## Features
//!
//! - **Deterministic preprocessing**: grayscale, histogram equalization
//!   and ImageNet standardization matching the classifier's training
//!   pipeline
//! - **Shared inference engine** with a stable-argmax probability
//!   distribution over the seven ISIC 2018 lesion categories
//! - **Grad-CAM attribution** via an intermediate-layer gradient capture
//!   capability, rendered as a pseudo-color overlay
//!
//! ## Modules
//!
//! - `preprocess`: byte decoding, normalization and display preparation
//! - `model`: CNN architecture built with Burn
//! - `inference`: the engine, classification and gradient capture
//! - `explain`: Grad-CAM attribution and overlay rendering
//! - `classes`: static metadata registry for the lesion categories
//! - `response`: report assembly for hosting layers
//! - `utils`: error types and logging
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dermascan::backend::default_device;
//! use dermascan::inference::Engine;
//! use dermascan::response::diagnose;
//!
//! let engine = Engine::load("models/lesion_classifier.mpk".as_ref(), default_device())?;
//! let report = diagnose(&engine, &image_bytes)?;
//! println!("{} ({})", report.class_name, report.confidence);
//! ```

pub mod backend;
pub mod classes;
pub mod explain;
pub mod inference;
pub mod model;
pub mod preprocess;
pub mod response;
pub mod utils;

// Re-export commonly used items for convenience
pub use classes::{class_metadata, ClassMetadata, Severity};
pub use explain::{explain, AttributionMap, ExplanationImage};
pub use inference::{Classification, Engine, LayerCapture};
pub use model::{LesionClassifier, LesionClassifierConfig};
pub use preprocess::{prepare_for_display, preprocess, DisplayImage, ImageTensor};
pub use response::{diagnose, DiagnosisReport};
pub use utils::error::{Error, Result};

/// Number of lesion classes (ISIC 2018 categories)
pub const NUM_CLASSES: usize = 7;

/// Model input size (square images)
pub const IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
