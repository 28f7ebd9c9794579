//! Inference: the shared engine, classification results and the
//! differentiable forward-pass capability used by the explainer.

pub mod engine;

pub use engine::{Classification, Engine, LayerCapture};
