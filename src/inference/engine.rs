//! Inference engine holding the loaded classifier.
//!
//! The engine owns the model weights for the process lifetime and is
//! shared read-only across requests; `classify` and
//! `differentiable_forward` never mutate engine state, so no locking is
//! needed. Gradient capture lifts the captured activation and the
//! classifier head into a request-scoped autodiff graph.

use std::path::Path;

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{Tensor, TensorData};
use serde::Serialize;

use crate::backend::{AutodiffDefaultBackend, DefaultBackend};
use crate::classes;
use crate::model::{FeatureLayer, LesionClassifier, LesionClassifierConfig};
use crate::preprocess::ImageTensor;
use crate::utils::error::{Error, Result};
use crate::{IMAGE_SIZE, NUM_CLASSES};

type Device = <DefaultBackend as burn::tensor::backend::Backend>::Device;

/// Result of classifying one image
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Predicted class index (stable argmax over the probabilities)
    pub class_index: usize,

    /// Display name of the predicted class, e.g. "Melanoma (MEL)"
    pub class_name: String,

    /// Probability of the predicted class as a percentage
    pub confidence_percent: f32,

    /// Per-class probabilities as percentages, index-aligned with the
    /// class registry; sums to 100 within floating tolerance
    pub probabilities: Vec<f32>,
}

impl Classification {
    /// Class-name -> percentage pairs in registry order
    pub fn probability_map(&self) -> Vec<(String, f32)> {
        self.probabilities
            .iter()
            .enumerate()
            .map(|(idx, &p)| {
                let name = classes::display_name(idx).unwrap_or_else(|_| format!("class {}", idx));
                (name, p)
            })
            .collect()
    }

    /// Class-name -> percentage pairs sorted by descending probability
    pub fn sorted_probabilities(&self) -> Vec<(String, f32)> {
        let mut entries = self.probability_map();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }
}

/// Argmax with a deterministic tie-break: the lowest index wins.
fn stable_argmax(values: &[f32]) -> usize {
    let mut best_index = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, &value) in values.iter().enumerate() {
        if value > best_value {
            best_index = index;
            best_value = value;
        }
    }
    best_index
}

/// A differentiable forward pass with the named layer's activation
/// retained.
///
/// Holds the captured activation, its tracked autodiff leaf and the
/// linear (pre-softmax) class scores. The output layer is deliberately
/// left linear so gradients are not flattened by a bounded activation.
/// All state is request-scoped.
#[derive(Debug)]
pub struct LayerCapture {
    activation: Tensor<DefaultBackend, 4>,
    leaf: Tensor<AutodiffDefaultBackend, 4>,
    logits: Tensor<AutodiffDefaultBackend, 2>,
}

impl LayerCapture {
    /// Captured activation, shape [1, channels, height, width]
    pub fn activation(&self) -> &Tensor<DefaultBackend, 4> {
        &self.activation
    }

    /// Linear (pre-softmax) score for a class
    pub fn score(&self, class_index: usize) -> Result<f32> {
        let [_, num_classes] = self.logits.dims();
        if class_index >= num_classes {
            return Err(Error::ClassIndex(class_index));
        }
        let score: f32 = self
            .logits
            .clone()
            .slice([0..1, class_index..class_index + 1])
            .into_scalar();
        Ok(score)
    }

    /// Gradient of a class score with respect to the captured
    /// activation, shape [1, channels, height, width].
    pub fn gradient(&self, class_index: usize) -> Result<Tensor<DefaultBackend, 4>> {
        let [_, num_classes] = self.logits.dims();
        if class_index >= num_classes {
            return Err(Error::ClassIndex(class_index));
        }

        let score = self
            .logits
            .clone()
            .slice([0..1, class_index..class_index + 1])
            .sum();
        let grads = score.backward();

        self.leaf.grad(&grads).ok_or_else(|| {
            Error::Explanation("no gradient reached the captured activation".to_string())
        })
    }
}

/// Inference engine: the loaded classifier plus its device.
///
/// Constructed once at startup and shared behind an `Arc`; a
/// successfully constructed engine is the "ready" state the host
/// surfaces through its liveness signal.
#[derive(Debug)]
pub struct Engine {
    model: LesionClassifier<DefaultBackend>,
    device: Device,
}

impl Engine {
    /// Wrap an already-built model (used by tests and benchmarks that
    /// run with freshly initialized weights).
    pub fn new(model: LesionClassifier<DefaultBackend>, device: Device) -> Self {
        Self { model, device }
    }

    /// Load the classifier weights from a checkpoint recorded with
    /// burn's `CompactRecorder`.
    ///
    /// Fails with `Error::ModelLoad` on a missing, corrupt or
    /// incompatible checkpoint. Invoked once at startup.
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        let config = LesionClassifierConfig::new();
        let model = LesionClassifier::<DefaultBackend>::new(&config, &device);

        let recorder = CompactRecorder::new();
        let model = model
            .load_file(model_path, &recorder, &device)
            .map_err(|e| {
                Error::ModelLoad(format!(
                    "cannot load checkpoint from {}: {:?}",
                    model_path.display(),
                    e
                ))
            })?;

        tracing::info!(path = %model_path.display(), "model loaded");
        Ok(Self { model, device })
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    /// Build the [1, 3, H, W] input batch for a preprocessed tensor
    fn to_batch(&self, tensor: &ImageTensor) -> Tensor<DefaultBackend, 4> {
        Tensor::from_floats(
            TensorData::new(tensor.data().to_vec(), [1, 3, IMAGE_SIZE, IMAGE_SIZE]),
            &self.device,
        )
    }

    /// Classify a preprocessed image.
    ///
    /// Runs a forward pass with softmax, then selects the predicted
    /// class with a stable argmax (ties break to the lowest index).
    pub fn classify(&self, tensor: &ImageTensor) -> Result<Classification> {
        let input = self.to_batch(tensor);
        let probabilities = self.model.forward_softmax(input);

        let values: Vec<f32> = probabilities
            .into_data()
            .to_vec()
            .map_err(|e| Error::Inference(format!("cannot read model output: {:?}", e)))?;

        if values.len() != NUM_CLASSES {
            return Err(Error::Inference(format!(
                "expected {} class probabilities, got {}",
                NUM_CLASSES,
                values.len()
            )));
        }
        if !values.iter().all(|v| v.is_finite()) {
            return Err(Error::Inference(
                "model produced non-finite probabilities".to_string(),
            ));
        }

        let class_index = stable_argmax(&values);
        let probabilities: Vec<f32> = values.iter().map(|&p| p * 100.0).collect();
        let confidence_percent = probabilities[class_index];

        Ok(Classification {
            class_index,
            class_name: classes::display_name(class_index)?,
            confidence_percent,
            probabilities,
        })
    }

    /// Run a forward pass retaining the named layer's activation and
    /// exposing gradients of the linear class scores with respect to it.
    ///
    /// Gradient capture is supported at the final feature block (the
    /// attribution source for Grad-CAM); other layer names fail with an
    /// explanation error rather than attributing from the wrong place.
    pub fn differentiable_forward(
        &self,
        tensor: &ImageTensor,
        layer_name: &str,
    ) -> Result<LayerCapture> {
        let layer = FeatureLayer::parse(layer_name)
            .ok_or_else(|| Error::Explanation(format!("unknown layer '{}'", layer_name)))?;
        if layer != FeatureLayer::PENULTIMATE {
            return Err(Error::Explanation(format!(
                "gradient capture is only available at layer '{}'",
                FeatureLayer::PENULTIMATE
            )));
        }

        let input = self.to_batch(tensor);
        let activation = self.model.features_to(input, layer);

        // Track the activation as an autodiff leaf, then rebuild the
        // classifier head on top of it inside the request-scoped graph.
        let leaf =
            Tensor::<AutodiffDefaultBackend, 4>::from_inner(activation.clone()).require_grad();
        let logits = self.head_forward_tracked(leaf.clone());

        Ok(LayerCapture {
            activation,
            leaf,
            logits,
        })
    }

    /// Classifier head replayed on the autodiff backend.
    ///
    /// Mirrors `LesionClassifier::forward_head` with the head weights
    /// lifted into the graph as untracked constants. Dropout is omitted:
    /// it is identity at inference and would make gradients stochastic.
    fn head_forward_tracked(
        &self,
        features: Tensor<AutodiffDefaultBackend, 4>,
    ) -> Tensor<AutodiffDefaultBackend, 2> {
        let [batch, channels, _, _] = features.dims();

        // Global average pooling: [B, C, H, W] -> [B, C]
        let pooled = features.mean_dim(3).mean_dim(2).reshape([batch, channels]);

        let w1: Tensor<AutodiffDefaultBackend, 2> =
            Tensor::from_inner(self.model.fc1.weight.val());
        let mut hidden = pooled.matmul(w1);
        if let Some(bias) = &self.model.fc1.bias {
            let b1: Tensor<AutodiffDefaultBackend, 1> = Tensor::from_inner(bias.val());
            hidden = hidden + b1.unsqueeze();
        }
        let hidden = burn::tensor::activation::relu(hidden);

        let w2: Tensor<AutodiffDefaultBackend, 2> =
            Tensor::from_inner(self.model.fc2.weight.val());
        let mut logits = hidden.matmul(w2);
        if let Some(bias) = &self.model.fc2.bias {
            let b2: Tensor<AutodiffDefaultBackend, 1> = Tensor::from_inner(bias.val());
            logits = logits + b2.unsqueeze();
        }
        logits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::default_device;

    fn test_engine() -> Engine {
        let device = default_device();
        let config = LesionClassifierConfig::new();
        let model = LesionClassifier::new(&config, &device);
        Engine::new(model, device)
    }

    fn test_tensor() -> ImageTensor {
        ImageTensor::from_chw(vec![0.5; ImageTensor::LEN]).unwrap()
    }

    #[test]
    fn test_stable_argmax_picks_lowest_index_on_ties() {
        assert_eq!(stable_argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
        assert_eq!(stable_argmax(&[0.5, 0.5]), 0);
        assert_eq!(stable_argmax(&[0.0, 0.1, 0.9]), 2);
    }

    #[test]
    fn test_classify_probabilities_sum_to_100() {
        let engine = test_engine();
        let result = engine.classify(&test_tensor()).unwrap();

        assert!(result.class_index < NUM_CLASSES);
        assert_eq!(result.probabilities.len(), NUM_CLASSES);

        let sum: f32 = result.probabilities.iter().sum();
        assert!((sum - 100.0).abs() < 1e-2, "sum was {}", sum);

        assert!((0.0..=100.0).contains(&result.confidence_percent));
        assert_eq!(
            result.class_index,
            stable_argmax(&result.probabilities),
            "class index must be the argmax of the probability map"
        );
    }

    #[test]
    fn test_sorted_probabilities_descend() {
        let engine = test_engine();
        let result = engine.classify(&test_tensor()).unwrap();

        let sorted = result.sorted_probabilities();
        assert_eq!(sorted.len(), NUM_CLASSES);
        for pair in sorted.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(sorted[0].0, result.class_name);
    }

    #[test]
    fn test_differentiable_forward_shapes() {
        let engine = test_engine();
        let capture = engine
            .differentiable_forward(&test_tensor(), "conv4")
            .unwrap();

        assert_eq!(capture.activation().dims(), [1, 256, 14, 14]);

        let gradient = capture.gradient(0).unwrap();
        assert_eq!(gradient.dims(), [1, 256, 14, 14]);

        let values: Vec<f32> = gradient.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_differentiable_forward_score_is_finite() {
        let engine = test_engine();
        let capture = engine
            .differentiable_forward(&test_tensor(), "conv4")
            .unwrap();
        for class in 0..NUM_CLASSES {
            assert!(capture.score(class).unwrap().is_finite());
        }
        assert!(capture.score(NUM_CLASSES).is_err());
    }

    #[test]
    fn test_differentiable_forward_rejects_unknown_layer() {
        let engine = test_engine();
        let err = engine
            .differentiable_forward(&test_tensor(), "fc1")
            .unwrap_err();
        assert!(matches!(err, Error::Explanation(_)));
    }

    #[test]
    fn test_differentiable_forward_rejects_early_layers() {
        let engine = test_engine();
        let err = engine
            .differentiable_forward(&test_tensor(), "conv2")
            .unwrap_err();
        assert!(matches!(err, Error::Explanation(_)));
    }

    #[test]
    fn test_load_missing_checkpoint_fails() {
        let device = default_device();
        let err = Engine::load(Path::new("/nonexistent/model.mpk"), device).unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)));
    }
}
