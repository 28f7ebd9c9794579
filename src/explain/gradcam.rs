//! Grad-CAM attribution over the classifier's final feature block.
//!
//! Uses the engine's differentiable forward pass to obtain the captured
//! activation and the gradient of the target class's linear score with
//! respect to it, then reduces them to a normalized spatial saliency
//! map at input resolution.

use crate::inference::Engine;
use crate::model::FeatureLayer;
use crate::preprocess::ImageTensor;
use crate::utils::error::{Error, Result};
use crate::IMAGE_SIZE;

/// Guard against division by zero when the raw map is uniform
const EPSILON: f32 = 1e-6;

/// Per-pixel importance map at input resolution.
///
/// Values lie in [0, 1]; row-major 224x224. Request-scoped.
#[derive(Debug, Clone)]
pub struct AttributionMap {
    values: Vec<f32>,
}

impl AttributionMap {
    /// Map side length (maps are square, matching the model input)
    pub const SIZE: usize = IMAGE_SIZE;

    pub(crate) fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != Self::SIZE * Self::SIZE {
            return Err(Error::Explanation(format!(
                "attribution map has {} values, expected {}",
                values.len(),
                Self::SIZE * Self::SIZE
            )));
        }
        if !values.iter().all(|v| v.is_finite()) {
            return Err(Error::Explanation(
                "attribution map contains non-finite values".to_string(),
            ));
        }
        Ok(Self { values })
    }

    /// Row-major view of the map
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Importance at (y, x)
    pub fn get(&self, y: usize, x: usize) -> f32 {
        self.values[y * Self::SIZE + x]
    }
}

/// Compute the Grad-CAM attribution map for a target class.
///
/// 1. capture the final feature block activation A and the linear score
///    for the target class;
/// 2. compute the gradient G of that score with respect to A;
/// 3. weight each channel by the spatial mean of its gradient;
/// 4. rectify the weighted channel sum, keeping class-supporting
///    evidence only;
/// 5. min-max normalize with an epsilon guard;
/// 6. bilinearly upsample to input resolution.
///
/// Non-finite values anywhere in the gradient or the map fail with an
/// explanation error instead of propagating silently.
pub fn explain(engine: &Engine, tensor: &ImageTensor, target_class: usize) -> Result<AttributionMap> {
    let capture = engine.differentiable_forward(tensor, FeatureLayer::PENULTIMATE.name())?;

    let gradient = capture.gradient(target_class)?;
    let [_, channels, height, width] = gradient.dims();
    let spatial = height * width;

    let grad: Vec<f32> = gradient
        .into_data()
        .to_vec()
        .map_err(|e| Error::Explanation(format!("cannot read gradient: {:?}", e)))?;
    if !grad.iter().all(|v| v.is_finite()) {
        return Err(Error::Explanation(
            "gradient contains non-finite values".to_string(),
        ));
    }

    let activation: Vec<f32> = capture
        .activation()
        .clone()
        .into_data()
        .to_vec()
        .map_err(|e| Error::Explanation(format!("cannot read activation: {:?}", e)))?;

    // Channel importance: spatial mean of the gradient per channel
    let mut weights = vec![0.0f32; channels];
    for (channel, weight) in weights.iter_mut().enumerate() {
        let plane = &grad[channel * spatial..(channel + 1) * spatial];
        *weight = plane.iter().sum::<f32>() / spatial as f32;
    }

    // Rectified weighted sum over channels
    let mut cam = vec![0.0f32; spatial];
    for (idx, value) in cam.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for (channel, &weight) in weights.iter().enumerate() {
            sum += weight * activation[channel * spatial + idx];
        }
        *value = sum.max(0.0);
    }

    normalize_unit_interval(&mut cam);
    if !cam.iter().all(|v| v.is_finite()) {
        return Err(Error::Explanation(
            "normalized map contains non-finite values".to_string(),
        ));
    }

    let upsampled = bilinear_resize(&cam, height, width, AttributionMap::SIZE, AttributionMap::SIZE);
    AttributionMap::new(upsampled)
}

/// Min-max normalization to [0, 1] with an epsilon in the denominator so
/// a degenerate uniform map stays finite (and collapses to zero) instead
/// of dividing by zero.
fn normalize_unit_interval(values: &mut [f32]) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &value in values.iter() {
        min = min.min(value);
        max = max.max(value);
    }

    let denom = (max - min) + EPSILON;
    for value in values.iter_mut() {
        *value = (*value - min) / denom;
    }
}

/// Bilinear interpolation from (src_h, src_w) to (dst_h, dst_w),
/// row-major scalar fields.
fn bilinear_resize(
    src: &[f32],
    src_h: usize,
    src_w: usize,
    dst_h: usize,
    dst_w: usize,
) -> Vec<f32> {
    let mut dst = vec![0.0f32; dst_h * dst_w];
    let scale_y = src_h as f32 / dst_h as f32;
    let scale_x = src_w as f32 / dst_w as f32;

    for y in 0..dst_h {
        // Pixel-center sampling keeps the map aligned with the image grid
        let sy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (src_h - 1) as f32);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = sy - y0 as f32;

        for x in 0..dst_w {
            let sx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (src_w - 1) as f32);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = sx - x0 as f32;

            let top = src[y0 * src_w + x0] * (1.0 - fx) + src[y0 * src_w + x1] * fx;
            let bottom = src[y1 * src_w + x0] * (1.0 - fx) + src[y1 * src_w + x1] * fx;
            dst[y * dst_w + x] = top * (1.0 - fy) + bottom * fy;
        }
    }

    dst
}
