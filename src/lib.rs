pub mod canvas;
pub mod common;
pub mod config;
pub mod feature_maps;
pub mod imageio;
pub mod metrics;
pub mod model;
pub mod objective;
pub mod optim;
pub mod pairs;
pub mod params;
pub mod transfer;
