//! Image preprocessing for the lesion classifier.
//!
//! Turns uploaded bytes into the canonical model input: grayscale,
//! histogram-equalized, replicated to three channels, resized to
//! 224x224 and standardized with the ImageNet statistics the classifier
//! was trained against. The equalization step is load-bearing: the model
//! saw equalized inputs during training, so skipping it degrades
//! accuracy silently instead of erroring.

use std::io::Cursor;

use base64::Engine as _;
use image::imageops::FilterType;
use image::{GrayImage, ImageFormat, Rgb, RgbImage};

use crate::utils::error::{Error, Result};
use crate::IMAGE_SIZE;

/// ImageNet normalization mean values (RGB)
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Image formats accepted by the pipeline
const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Canonical model input: an immutable 224x224x3 tensor stored as a
/// flat CHW array, standardized per channel.
///
/// Invariants: length is exactly 3*224*224 and every value is finite.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    /// Number of values in a tensor
    pub const LEN: usize = 3 * IMAGE_SIZE * IMAGE_SIZE;

    /// Build a tensor from flat CHW data, enforcing the shape and
    /// finiteness invariants.
    pub fn from_chw(data: Vec<f32>) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(Error::Decode(format!(
                "expected {} tensor values, got {}",
                Self::LEN,
                data.len()
            )));
        }
        if !data.iter().all(|v| v.is_finite()) {
            return Err(Error::Decode(
                "preprocessing produced non-finite values".to_string(),
            ));
        }
        Ok(Self { data })
    }

    /// Flat CHW view of the tensor
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at (channel, y, x)
    pub fn get(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[channel * IMAGE_SIZE * IMAGE_SIZE + y * IMAGE_SIZE + x]
    }
}

/// Sniff the image format and check it against the allow-list.
fn sniff_format(bytes: &[u8]) -> Result<ImageFormat> {
    let format = image::guess_format(bytes)
        .map_err(|_| Error::Decode("unrecognized image data".to_string()))?;

    if SUPPORTED_FORMATS.contains(&format) {
        Ok(format)
    } else {
        Err(Error::UnsupportedFormat(format!("{:?}", format).to_lowercase()))
    }
}

/// Histogram equalization on a grayscale image: stretches the intensity
/// CDF to the full [0, 255] range.
fn equalize_histogram(gray: &GrayImage) -> GrayImage {
    let total = (gray.width() as u64) * (gray.height() as u64);

    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        running += count;
        cdf[value] = running;
    }

    // First occupied intensity bin anchors the stretch
    let cdf_min = cdf
        .iter()
        .find(|&&c| c > 0)
        .copied()
        .unwrap_or(0);

    let denom = total - cdf_min;
    if denom == 0 {
        // Constant image: nothing to equalize
        return gray.clone();
    }

    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let scaled = ((cdf[value].saturating_sub(cdf_min)) * 255 + denom / 2) / denom;
        *slot = scaled.min(255) as u8;
    }

    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
    }
    out
}

/// Decode and normalize raw image bytes into the canonical model input.
///
/// Steps, all deterministic: sniff format against the allow-list; decode;
/// grayscale; histogram equalization; replicate to 3 channels; bilinear
/// resize to 224x224 (aspect ratio not preserved); scale to [0, 1];
/// per-channel standardization. The caller's bytes are never mutated.
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor> {
    let format = sniff_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::Decode(e.to_string()))?;

    let gray = decoded.to_luma8();
    let equalized = equalize_histogram(&gray);

    // Replicate the single channel to RGB before resizing, mirroring the
    // training-time pipeline order
    let rgb: RgbImage = RgbImage::from_fn(equalized.width(), equalized.height(), |x, y| {
        let v = equalized.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    let size = IMAGE_SIZE as u32;
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

    // CHW layout with per-channel standardization
    let mut data = vec![0.0f32; ImageTensor::LEN];
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                data[c * plane + y * IMAGE_SIZE + x] = (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
            }
        }
    }

    ImageTensor::from_chw(data)
}

/// A displayable rendition of the preprocessed input, with PNG and
/// base64 encodings for transport.
#[derive(Debug, Clone)]
pub struct DisplayImage {
    image: RgbImage,
}

impl DisplayImage {
    /// The underlying RGB pixel buffer
    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Encode to PNG bytes
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Encode to a base64 PNG string
    pub fn to_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.png_bytes()?))
    }
}

/// Reverse the standardization for display: multiply by std, add mean,
/// rescale to [0, 255] and clamp.
///
/// The result is structurally consistent with the model input (three
/// identical channels, 224x224, equalized appearance) but not
/// byte-identical to the original upload.
pub fn prepare_for_display(tensor: &ImageTensor) -> Result<DisplayImage> {
    let size = IMAGE_SIZE as u32;
    let mut image = RgbImage::new(size, size);

    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let mut pixel = Rgb([0u8; 3]);
            for c in 0..3 {
                let value = tensor.get(c, y, x) * CHANNEL_STD[c] + CHANNEL_MEAN[c];
                pixel[c] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            image.put_pixel(x as u32, y as u32, pixel);
        }
    }

    Ok(DisplayImage { image })
}

/// PNG-encode an RGB buffer into memory
pub(crate) fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| Error::Serialization(format!("PNG encoding failed: {}", e)))?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn png_bytes_of(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_preprocess_shape_and_finiteness() {
        let bytes = png_bytes_of(&gradient_image(512, 512));
        let tensor = preprocess(&bytes).unwrap();

        assert_eq!(tensor.data().len(), 3 * 224 * 224);
        assert!(tensor.data().iter().all(|v| v.is_finite()));
        // Standardized u8 inputs stay within a few units of zero
        assert!(tensor.data().iter().all(|&v| (-3.0..=3.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_rejects_corrupt_bytes() {
        // Valid PNG magic followed by garbage
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let err = preprocess(&bytes).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_preprocess_rejects_unknown_data() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_preprocess_rejects_formats_outside_allow_list() {
        // GIF89a header decodes as a recognized format, but it is not allowed
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        let err = preprocess(gif).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_equalization_stretches_to_full_range() {
        // Two-level image: 100 and 150 stretch towards 0 and 255
        let gray = GrayImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Luma([100u8])
            } else {
                Luma([150u8])
            }
        });
        let equalized = equalize_histogram(&gray);

        let min = equalized.pixels().map(|p| p[0]).min().unwrap();
        let max = equalized.pixels().map(|p| p[0]).max().unwrap();
        assert!(min < 100);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_equalization_constant_image_unchanged() {
        let gray = GrayImage::from_pixel(8, 8, Luma([77u8]));
        let equalized = equalize_histogram(&gray);
        assert!(equalized.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn test_display_round_trip_structure() {
        let bytes = png_bytes_of(&gradient_image(300, 200));
        let tensor = preprocess(&bytes).unwrap();
        let display = prepare_for_display(&tensor).unwrap();

        let rgb = display.as_rgb();
        assert_eq!(rgb.dimensions(), (224, 224));
        // Grayscale input replicated to three channels survives the trip
        for pixel in rgb.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }

        let png = display.png_bytes().unwrap();
        assert!(!png.is_empty());
        // Not byte-identical to the upload
        assert_ne!(png, bytes);
    }

    #[test]
    fn test_tensor_invariants() {
        assert!(ImageTensor::from_chw(vec![0.0; 10]).is_err());
        assert!(ImageTensor::from_chw(vec![f32::NAN; ImageTensor::LEN]).is_err());
        assert!(ImageTensor::from_chw(vec![0.5; ImageTensor::LEN]).is_ok());
    }
}
