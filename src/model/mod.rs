//! CNN model architecture for lesion classification.

pub mod cnn;

pub use cnn::{ConvBlock, FeatureLayer, LesionClassifier, LesionClassifierConfig};
