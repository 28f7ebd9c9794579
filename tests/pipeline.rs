//! End-to-end pipeline tests with a freshly initialized model.
//!
//! These run the full preprocess -> classify -> explain -> render flow
//! on the CPU backend, mirroring how a request travels through the
//! system.

use std::io::Cursor;

use image::{Rgb, RgbImage};

use dermascan::backend::default_device;
use dermascan::{
    class_metadata, diagnose, explain, prepare_for_display, preprocess, Engine, Error,
    LesionClassifier, LesionClassifierConfig, NUM_CLASSES,
};

fn test_engine() -> Engine {
    let device = default_device();
    let config = LesionClassifierConfig::new();
    let model = LesionClassifier::new(&config, &device);
    Engine::new(model, device)
}

fn lesion_like_png(width: u32, height: u32) -> Vec<u8> {
    // Dark irregular blob on a lighter background
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let img = RgbImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 - cx) / cx;
        let dy = (y as f32 - cy) / cy;
        let d = (dx * dx + dy * dy).sqrt();
        if d < 0.4 {
            Rgb([90, 60, 55])
        } else {
            Rgb([210, 180, 170])
        }
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[test]
fn full_pipeline_on_a_512x512_image() {
    let engine = test_engine();
    let bytes = lesion_like_png(512, 512);

    // Preprocess: exact shape, finite, standardized values in range
    let tensor = preprocess(&bytes).unwrap();
    assert_eq!(tensor.data().len(), 3 * 224 * 224);
    assert!(tensor.data().iter().all(|v| v.is_finite()));
    // Standardized u8 inputs land roughly in [-2.5, 2.5]; the brightest
    // blue-channel pixels reach (1 - 0.406) / 0.225 ~ 2.64
    assert!(tensor.data().iter().all(|&v| (-3.0..=3.0).contains(&v)));

    // Classify: index in [0, 6], confidence in [0, 100], map sums to 100
    let classification = engine.classify(&tensor).unwrap();
    assert!(classification.class_index < NUM_CLASSES);
    assert!((0.0..=100.0).contains(&classification.confidence_percent));
    let sum: f32 = classification.probabilities.iter().sum();
    assert!((sum - 100.0).abs() < 1e-2);

    // Explain: 224x224 map with values in [0, 1]
    let map = explain::explain(&engine, &tensor, classification.class_index).unwrap();
    assert_eq!(map.values().len(), 224 * 224);
    assert!(map.values().iter().all(|&v| (0.0..=1.0).contains(&v)));

    // Render: decodable two-panel PNG
    let display = prepare_for_display(&tensor).unwrap();
    let figure = explain::render_overlay(&map, &display).unwrap();
    let decoded = image::load_from_memory(figure.png_bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (448, 224));
}

#[test]
fn diagnose_assembles_a_complete_report() {
    let engine = test_engine();
    let report = diagnose(&engine, &lesion_like_png(256, 256)).unwrap();

    assert!(report.class_index < NUM_CLASSES);
    assert_eq!(report.probabilities.len(), NUM_CLASSES);
    assert!(report.heatmap.is_some());

    // Sorted listing leads with the predicted class
    assert_eq!(report.sorted_probabilities[0].class_name, report.class_name);

    // The embedded metadata matches the registry record
    let meta = class_metadata(report.class_index).unwrap();
    assert_eq!(report.class_info.abbreviation, meta.abbreviation);
}

#[test]
fn corrupt_bytes_fail_before_the_classifier_runs() {
    let engine = test_engine();

    let mut truncated = lesion_like_png(128, 128);
    truncated.truncate(40);

    let err = diagnose(&engine, &truncated).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[test]
fn metadata_query_rejects_index_seven() {
    // K = 7: valid range is 0..=6
    let err = class_metadata(7).unwrap_err();
    assert!(matches!(err, Error::ClassIndex(7)));

    for index in 0..NUM_CLASSES {
        assert!(class_metadata(index).is_ok());
    }
}
