//! Response assembly: merges classification output, class metadata and
//! rendered images into one report record.
//!
//! This is thin boundary glue over the pipeline; the only policy it owns
//! is partial failure: when classification succeeds but explanation
//! fails, the report ships with `heatmap: null` instead of failing the
//! whole request.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classes::{self, ClassMetadata};
use crate::explain::{explain, render_overlay};
use crate::inference::{Classification, Engine};
use crate::preprocess::{prepare_for_display, preprocess, DisplayImage};
use crate::utils::error::Result;

/// One entry of the probability listing sorted by descending probability
#[derive(Debug, Clone, Serialize)]
pub struct ClassProbability {
    pub class_name: String,
    pub percent: String,
}

/// Complete diagnosis record for one uploaded image.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    /// Predicted class index in [0, K-1]
    pub class_index: usize,

    /// Display name of the predicted class
    pub class_name: String,

    /// Confidence formatted as a 2-decimal percentage string
    pub confidence: String,

    /// Confidence as a raw percentage value
    pub raw_confidence: f32,

    /// Class name -> formatted percentage, one entry per class
    pub probabilities: BTreeMap<String, String>,

    /// The same entries sorted by descending probability
    pub sorted_probabilities: Vec<ClassProbability>,

    /// Metadata record for the predicted class
    pub class_info: ClassMetadata,

    /// Displayable preprocessed image, base64 PNG
    pub display_image: String,

    /// Grad-CAM overlay figure, base64 PNG; absent when explanation
    /// failed for this request
    pub heatmap: Option<String>,

    /// RFC 3339 timestamp of the prediction
    pub timestamp: String,
}

impl DiagnosisReport {
    /// Merge the pieces of one request into the final record.
    pub fn assemble(
        classification: &Classification,
        display: &DisplayImage,
        heatmap: Option<String>,
    ) -> Result<Self> {
        let class_info = *classes::class_metadata(classification.class_index)?;

        let probabilities: BTreeMap<String, String> = classification
            .probability_map()
            .into_iter()
            .map(|(name, percent)| (name, format!("{:.2}%", percent)))
            .collect();

        let sorted_probabilities: Vec<ClassProbability> = classification
            .sorted_probabilities()
            .into_iter()
            .map(|(class_name, percent)| ClassProbability {
                class_name,
                percent: format!("{:.2}%", percent),
            })
            .collect();

        Ok(Self {
            class_index: classification.class_index,
            class_name: classification.class_name.clone(),
            confidence: format!("{:.2}%", classification.confidence_percent),
            raw_confidence: classification.confidence_percent,
            probabilities,
            sorted_probabilities,
            class_info,
            display_image: display.to_base64()?,
            heatmap,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Run the full pipeline for one upload: preprocess, classify, explain,
/// render, assemble.
///
/// Decode and inference failures propagate to the caller; explanation
/// failures are logged and degrade the report to `heatmap: null`.
pub fn diagnose(engine: &Engine, bytes: &[u8]) -> Result<DiagnosisReport> {
    let tensor = preprocess(bytes)?;
    let classification = engine.classify(&tensor)?;
    let display = prepare_for_display(&tensor)?;

    let heatmap = match explain(engine, &tensor, classification.class_index)
        .and_then(|map| render_overlay(&map, &display))
    {
        Ok(figure) => Some(figure.to_base64()),
        Err(e) => {
            tracing::warn!(error = %e, "explanation failed; returning report without heatmap");
            None
        }
    };

    DiagnosisReport::assemble(&classification, &display, heatmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::default_device;
    use crate::model::{LesionClassifier, LesionClassifierConfig};
    use crate::utils::error::Error;
    use crate::NUM_CLASSES;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn test_engine() -> Engine {
        let device = default_device();
        let config = LesionClassifierConfig::new();
        let model = LesionClassifier::new(&config, &device);
        Engine::new(model, device)
    }

    fn sample_png() -> Vec<u8> {
        let img = RgbImage::from_fn(96, 96, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
        });
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_diagnose_end_to_end() {
        let engine = test_engine();
        let report = diagnose(&engine, &sample_png()).unwrap();

        assert!(report.class_index < NUM_CLASSES);
        assert_eq!(report.probabilities.len(), NUM_CLASSES);
        assert_eq!(report.sorted_probabilities.len(), NUM_CLASSES);
        assert!(report.confidence.ends_with('%'));
        assert!((0.0..=100.0).contains(&report.raw_confidence));
        assert!(!report.display_image.is_empty());
        assert!(report.heatmap.is_some());
        assert_eq!(
            report.class_info.name,
            crate::classes::class_metadata(report.class_index)
                .unwrap()
                .name
        );
    }

    #[test]
    fn test_diagnose_rejects_corrupt_bytes_before_inference() {
        let engine = test_engine();
        let err = diagnose(&engine, b"not an image at all").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let engine = test_engine();
        let report = diagnose(&engine, &sample_png()).unwrap();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"class_index\""));
        assert!(json.contains("\"sorted_probabilities\""));
        assert!(json.contains("\"heatmap\""));
    }
}
