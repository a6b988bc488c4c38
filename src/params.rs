// input normalization: pixels stay in [0, 255], only the channel mean is removed
pub const IMAGENET_MEAN_255: [f32; 3] = [123.675, 116.28, 103.53];

// canvas initialization
pub const RANDOM_INIT_STD: f64 = 90.0; // std of the gaussian noise canvas

// loss scales, roughly the largest values observed per term
pub const MAX_CONTENT_LOSS: f64 = 15000.0;
pub const MAX_STYLE_LOSS: f64 = 15000000.0;
pub const MAX_TV_LOSS: f64 = 70000000.0;

// hyper-parameters: defaults
pub const DEFAULT_HEIGHT: usize = 400;
pub const DEFAULT_CONTENT_WEIGHT: f64 = 1e5;
pub const DEFAULT_STYLE_WEIGHT: f64 = 3e4;
pub const DEFAULT_TV_WEIGHT: f64 = 1e0;
pub const DEFAULT_ITERATIONS: usize = 3000;
pub const DEFAULT_LEARNING_RATE: f64 = 1e1;
pub const SGD_MOMENTUM: f64 = 0.9;

// output naming
pub const DUMP_INDEX_WIDTH: usize = 4; // saves images as %04d.jpg
pub const DUMP_EXTENSION: &str = "jpg";
pub const METRICS_FILE_NAME: &str = "losses.jsonl";
pub const CONFIG_SNAPSHOT_FILE_NAME: &str = "config.json";
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
