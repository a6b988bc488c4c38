mod vgg;

pub use vgg::{
    load_feature_extractor, FeatureExtractor, FeatureExtractorInit, FeatureMaps, ModelKind,
};
