//! Explanation: Grad-CAM attribution and overlay rendering.

pub mod gradcam;
pub mod render;

pub use gradcam::{explain, AttributionMap};
pub use render::{render_overlay, ExplanationImage};
