use crate::{canvas::InitMethod, common::*, model::ModelKind, optim::OptimizerKind, params};

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct Config {
    #[derivative(Default(value = "PathBuf::from(\"data/content\")"))]
    pub content_dir: PathBuf,
    #[derivative(Default(value = "PathBuf::from(\"data/style\")"))]
    pub style_dir: PathBuf,
    #[derivative(Default(value = "PathBuf::from(\"data/output\")"))]
    pub output_dir: PathBuf,
    /// file name inside `content_dir`; every content image is used if unset
    pub content_image: Option<String>,
    /// file name inside `style_dir`; every style image is used if unset
    pub style_image: Option<String>,
    #[derivative(Default(value = "PathBuf::from(\"weights\")"))]
    pub weights_dir: PathBuf,
    /// overrides `<weights_dir>/<model>.ot`
    pub weights_file: Option<PathBuf>,
    #[derivative(Default(value = "params::DEFAULT_HEIGHT"))]
    pub height: usize,
    #[derivative(Default(value = "params::DEFAULT_CONTENT_WEIGHT"))]
    pub content_weight: f64,
    #[derivative(Default(value = "params::DEFAULT_STYLE_WEIGHT"))]
    pub style_weight: f64,
    #[derivative(Default(value = "params::DEFAULT_TV_WEIGHT"))]
    pub tv_weight: f64,
    pub optimizer: OptimizerKind,
    pub model: ModelKind,
    pub init_method: InitMethod,
    #[derivative(Default(value = "params::DEFAULT_ITERATIONS"))]
    pub iterations: usize,
    #[derivative(Default(value = "params::DEFAULT_LEARNING_RATE"))]
    pub learning_rate: f64,
    /// dump every n iterations; only the final image is saved if unset
    pub saving_freq: Option<NonZeroUsize>,
    #[derivative(Default(value = "true"))]
    pub normalize_losses: bool,
    #[derivative(Default(value = "true"))]
    pub log_metrics: bool,
    pub dump_feature_maps: bool,
    pub seed: Option<i64>,
    #[serde(
        serialize_with = "serialize_device",
        deserialize_with = "deserialize_device"
    )]
    #[derivative(Default(value = "Device::cuda_if_available()"))]
    pub device: Device,
}

impl Config {
    pub fn open<P>(path: P) -> Fallible<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&text)?
        } else {
            json5::from_str(&text)?
        };
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            content_image,
            style_image,
            output_dir,
            weights_file,
            height,
            content_weight,
            style_weight,
            tv_weight,
            optimizer,
            model,
            init_method,
            iterations,
            learning_rate,
            saving_freq,
            seed,
            device,
            dump_feature_maps,
        } = overrides;

        if content_image.is_some() {
            self.content_image = content_image;
        }
        if style_image.is_some() {
            self.style_image = style_image;
        }
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        if weights_file.is_some() {
            self.weights_file = weights_file;
        }
        if let Some(height) = height {
            self.height = height;
        }
        if let Some(weight) = content_weight {
            self.content_weight = weight;
        }
        if let Some(weight) = style_weight {
            self.style_weight = weight;
        }
        if let Some(weight) = tv_weight {
            self.tv_weight = weight;
        }
        if let Some(optimizer) = optimizer {
            self.optimizer = optimizer;
        }
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(init_method) = init_method {
            self.init_method = init_method;
        }
        if let Some(iterations) = iterations {
            self.iterations = iterations;
        }
        if let Some(lr) = learning_rate {
            self.learning_rate = lr;
        }
        // zero disables intermediate dumps
        if let Some(freq) = saving_freq {
            self.saving_freq = NonZeroUsize::new(freq);
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if let Some(device) = device {
            self.device = device;
        }
        if dump_feature_maps {
            self.dump_feature_maps = true;
        }
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Fallible<()> {
        ensure!(self.height > 0, "height must be positive");
        ensure!(
            self.height >= self.model.min_input_size(),
            "height must be at least {} for {}, got {}",
            self.model.min_input_size(),
            self.model,
            self.height
        );
        ensure!(self.iterations > 0, "iterations must be positive");
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning_rate must be a positive number, got {}",
            self.learning_rate
        );

        for (name, weight) in [
            ("content_weight", self.content_weight),
            ("style_weight", self.style_weight),
            ("tv_weight", self.tv_weight),
        ] {
            ensure!(
                weight.is_finite() && weight >= 0.0,
                "{} must be a non-negative number, got {}",
                name,
                weight
            );
        }

        let weights_path = self.weights_path();
        ensure!(
            weights_path.is_file(),
            "the weights file {} does not exist",
            weights_path.display()
        );

        Ok(())
    }

    pub fn weights_path(&self) -> PathBuf {
        match &self.weights_file {
            Some(path) => path.clone(),
            None => self
                .weights_dir
                .join(format!("{}.ot", self.model.weights_stem())),
        }
    }
}

/// Command line values taking precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub content_image: Option<String>,
    pub style_image: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub weights_file: Option<PathBuf>,
    pub height: Option<usize>,
    pub content_weight: Option<f64>,
    pub style_weight: Option<f64>,
    pub tv_weight: Option<f64>,
    pub optimizer: Option<OptimizerKind>,
    pub model: Option<ModelKind>,
    pub init_method: Option<InitMethod>,
    pub iterations: Option<usize>,
    pub learning_rate: Option<f64>,
    pub saving_freq: Option<usize>,
    pub seed: Option<i64>,
    pub device: Option<Device>,
    pub dump_feature_maps: bool,
}

pub fn parse_device(name: &str) -> Fallible<Device> {
    let device = match name {
        "cpu" => Device::Cpu,
        "auto" => Device::cuda_if_available(),
        "cuda" => Device::Cuda(0),
        _ => {
            let prefix = "cuda(";
            let suffix = ")";
            if name.starts_with(prefix) && name.ends_with(suffix) {
                let number: usize = name[(prefix.len())..(name.len() - suffix.len())]
                    .parse()
                    .map_err(|_err| format_err!("invalid device name {}", name))?;
                Device::Cuda(number)
            } else {
                bail!("invalid device name {}", name);
            }
        }
    };
    Ok(device)
}

pub fn device_name(device: Device) -> String {
    match device {
        Device::Cpu => "cpu".into(),
        Device::Cuda(n) => format!("cuda({})", n),
    }
}

fn serialize_device<S>(device: &Device, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    device_name(*device).serialize(serializer)
}

fn deserialize_device<'de, D>(deserializer: D) -> Result<Device, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    parse_device(&name).map_err(|err| D::Error::custom(format!("{}", err)))
}
