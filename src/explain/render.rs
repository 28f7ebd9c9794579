//! Rendering of attribution maps as pseudo-color overlays.
//!
//! Produces a two-panel figure: the displayable input on the left and
//! the same image blended with a jet-style colormap of the attribution
//! map on the right.

use base64::Engine as _;
use image::{Rgb, RgbImage};

use crate::explain::gradcam::AttributionMap;
use crate::preprocess::{encode_png, DisplayImage};
use crate::utils::error::Result;
use crate::IMAGE_SIZE;

/// Blend factor for the heatmap over the display image
const OVERLAY_ALPHA: f32 = 0.5;

/// Rendered explanation figure, PNG-encoded.
#[derive(Debug, Clone)]
pub struct ExplanationImage {
    png: Vec<u8>,
}

impl ExplanationImage {
    /// PNG bytes of the rendered figure
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Base64 PNG string for transport
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }
}

/// Jet-style pseudo-color: low values map to cool blues, high values to
/// hot reds.
fn jet_color(value: f32) -> Rgb<u8> {
    let t = value.clamp(0.0, 1.0);
    let r = (1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0);
    let g = (1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0);
    let b = (1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0);
    Rgb([
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ])
}

/// Render the attribution map over the display image.
///
/// Composes a side-by-side panel (original | overlay) and encodes it as
/// PNG. The overlay blends the pseudo-colored map onto the image at
/// partial opacity.
pub fn render_overlay(map: &AttributionMap, display: &DisplayImage) -> Result<ExplanationImage> {
    let size = IMAGE_SIZE as u32;
    let source = display.as_rgb();

    let mut panel = RgbImage::new(size * 2, size);

    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let base = *source.get_pixel(x as u32, y as u32);
            panel.put_pixel(x as u32, y as u32, base);

            let heat = jet_color(map.get(y, x));
            let mut blended = Rgb([0u8; 3]);
            for c in 0..3 {
                let value = base[c] as f32 * (1.0 - OVERLAY_ALPHA) + heat[c] as f32 * OVERLAY_ALPHA;
                blended[c] = value.round() as u8;
            }
            panel.put_pixel(size + x as u32, y as u32, blended);
        }
    }

    Ok(ExplanationImage {
        png: encode_png(&panel)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{prepare_for_display, ImageTensor};

    fn test_map() -> AttributionMap {
        // Horizontal ramp through the full unit interval
        let values: Vec<f32> = (0..IMAGE_SIZE * IMAGE_SIZE)
            .map(|i| (i % IMAGE_SIZE) as f32 / (IMAGE_SIZE - 1) as f32)
            .collect();
        AttributionMap::new(values).unwrap()
    }

    #[test]
    fn test_jet_color_endpoints() {
        let cold = jet_color(0.0);
        assert!(cold[2] > cold[0], "low values should be blue-dominant");

        let hot = jet_color(1.0);
        assert!(hot[0] > hot[2], "high values should be red-dominant");

        let mid = jet_color(0.5);
        assert!(mid[1] > 200, "mid values should be green-heavy");
    }

    #[test]
    fn test_render_overlay_panel_dimensions() {
        let tensor = ImageTensor::from_chw(vec![0.0; ImageTensor::LEN]).unwrap();
        let display = prepare_for_display(&tensor).unwrap();

        let figure = render_overlay(&test_map(), &display).unwrap();
        assert!(!figure.png_bytes().is_empty());

        let decoded = image::load_from_memory(figure.png_bytes()).unwrap();
        assert_eq!(decoded.width(), 448);
        assert_eq!(decoded.height(), 224);

        assert!(!figure.to_base64().is_empty());
    }
}
