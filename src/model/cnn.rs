//! CNN architecture for dermatoscopic lesion classification.
//!
//! Implements the lesion classifier with the Burn framework: four
//! convolutional blocks, global average pooling and a two-layer
//! classifier head. The feature stack is split from the head so the
//! explainer can capture the final spatial activation before pooling.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the lesion classifier CNN
#[derive(Config, Debug)]
pub struct LesionClassifierConfig {
    /// Number of output classes (7 for the ISIC 2018 categories)
    #[config(default = "7")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "224")]
    pub input_size: usize,

    /// Dropout rate for the classifier head
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3; grayscale replicated to RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,
}

/// Named feature blocks of the convolutional stack, used to address
/// activations for gradient capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLayer {
    Conv1,
    Conv2,
    Conv3,
    Conv4,
}

impl FeatureLayer {
    /// The last spatial layer before global pooling
    pub const PENULTIMATE: FeatureLayer = FeatureLayer::Conv4;

    /// Layer name as addressed by callers
    pub fn name(self) -> &'static str {
        match self {
            FeatureLayer::Conv1 => "conv1",
            FeatureLayer::Conv2 => "conv2",
            FeatureLayer::Conv3 => "conv3",
            FeatureLayer::Conv4 => "conv4",
        }
    }

    /// Resolve a layer name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "conv1" => Some(FeatureLayer::Conv1),
            "conv2" => Some(FeatureLayer::Conv2),
            "conv3" => Some(FeatureLayer::Conv3),
            "conv4" => Some(FeatureLayer::Conv4),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Lesion classifier CNN
///
/// Architecture:
/// - 4 convolutional blocks with doubling filter counts (32 -> 256)
/// - BatchNorm and ReLU after each convolution, MaxPool per block
/// - Global average pooling
/// - Fully connected classifier with dropout
#[derive(Module, Debug)]
pub struct LesionClassifier<B: Backend> {
    // Convolutional blocks (public so the engine can address activations
    // and lift head weights into the autodiff graph)
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    // Global pooling
    pub global_pool: AdaptiveAvgPool2d,

    // Classifier head
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> LesionClassifier<B> {
    /// Create a new lesion classifier from configuration
    pub fn new(config: &LesionClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        // Convolutional blocks: 3 -> 32 -> 64 -> 128 -> 256
        let conv1 = ConvBlock::new(config.in_channels, base, 3, device); // 224 -> 112
        let conv2 = ConvBlock::new(base, base * 2, 3, device); // 112 -> 56
        let conv3 = ConvBlock::new(base * 2, base * 4, 3, device); // 56 -> 28
        let conv4 = ConvBlock::new(base * 4, base * 8, 3, device); // 28 -> 14

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(base * 8, 256).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(256, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Run the convolutional stack up to and including the named block.
    ///
    /// Returns the spatial activation [batch, channels, height, width].
    pub fn features_to(&self, x: Tensor<B, 4>, layer: FeatureLayer) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        if layer == FeatureLayer::Conv1 {
            return x;
        }
        let x = self.conv2.forward(x);
        if layer == FeatureLayer::Conv2 {
            return x;
        }
        let x = self.conv3.forward(x);
        if layer == FeatureLayer::Conv3 {
            return x;
        }
        self.conv4.forward(x)
    }

    /// Full convolutional feature stack
    pub fn forward_features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.features_to(x, FeatureLayer::Conv4)
    }

    /// Classifier head: global pooling, flatten, fully connected layers.
    ///
    /// Produces raw logits; softmax is applied separately at inference.
    pub fn forward_head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.global_pool.forward(features);

        // Flatten: [B, C, 1, 1] -> [B, C]
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass producing logits of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(x);
        self.forward_head(features)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
