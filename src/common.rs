pub use anyhow::{bail, ensure, format_err, Context, Error, Result as Fallible};
pub use argh::FromArgs;
pub use derivative::Derivative;
pub use image::{
    imageops::{self, FilterType}, io::Reader as ImageReader, GrayImage, ImageBuffer, Luma, Rgb,
    RgbImage,
};
pub use itertools::Itertools;
pub use log::{debug, error, info, warn};
pub use rand::{rngs::OsRng, RngCore};
pub use serde::{
    de::Error as DeserializeError, ser::Error as SerializeError, Deserialize, Deserializer,
    Serialize, Serializer,
};
pub use std::{
    borrow::Borrow,
    fmt::{self, Display},
    fs::{self, File},
    io::{prelude::*, BufWriter},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};
pub use tch::{
    nn::{self, Conv2D, ConvConfig, OptimizerConfig, VarStore},
    Device, Kind, Reduction, Tensor,
};
