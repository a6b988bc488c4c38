use nstrs::{
    canvas::InitMethod,
    common::*,
    config::{self, Config, ConfigOverrides},
    model::{self, ModelKind},
    optim::OptimizerKind,
    pairs,
    transfer::StyleTransfer,
};

lazy_static::lazy_static! {
    static ref SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
}

/// Neural style transfer on a pretrained VGG network.
#[derive(FromArgs)]
struct Args {
    /// the config file, JSON5 or YAML. Built-in defaults are used if absent.
    #[argh(option)]
    config: Option<PathBuf>,
    /// content image file name inside the content directory
    #[argh(option)]
    content_image: Option<String>,
    /// style image file name inside the style directory
    #[argh(option)]
    style_image: Option<String>,
    /// output directory
    #[argh(option)]
    output_dir: Option<PathBuf>,
    /// pretrained weights file
    #[argh(option)]
    weights: Option<PathBuf>,
    /// height of content and style images
    #[argh(option)]
    height: Option<usize>,
    /// weight factor for content loss
    #[argh(option)]
    content_weight: Option<f64>,
    /// weight factor for style loss
    #[argh(option)]
    style_weight: Option<f64>,
    /// weight factor for total variation loss
    #[argh(option)]
    tv_weight: Option<f64>,
    /// adam, adamw, sgd or rmsprop
    #[argh(option)]
    optimizer: Option<OptimizerKind>,
    /// vgg16 or vgg19
    #[argh(option)]
    model: Option<ModelKind>,
    /// random, content or style
    #[argh(option)]
    init_method: Option<InitMethod>,
    /// number of iterations
    #[argh(option)]
    iterations: Option<usize>,
    /// learning rate
    #[argh(option)]
    learning_rate: Option<f64>,
    /// saving frequency for intermediate images, 0 saves only the final image
    #[argh(option)]
    saving_freq: Option<usize>,
    /// seed of the random canvas
    #[argh(option)]
    seed: Option<i64>,
    /// cpu, cuda(N) or auto
    #[argh(option, from_str_fn(parse_device))]
    device: Option<Device>,
    /// save channel-averaged feature maps of the reference images
    #[argh(switch)]
    dump_feature_maps: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            content_image: self.content_image.clone(),
            style_image: self.style_image.clone(),
            output_dir: self.output_dir.clone(),
            weights_file: self.weights.clone(),
            height: self.height,
            content_weight: self.content_weight,
            style_weight: self.style_weight,
            tv_weight: self.tv_weight,
            optimizer: self.optimizer,
            model: self.model,
            init_method: self.init_method,
            iterations: self.iterations,
            learning_rate: self.learning_rate,
            saving_freq: self.saving_freq,
            seed: self.seed,
            device: self.device,
            dump_feature_maps: self.dump_feature_maps,
        }
    }
}

fn parse_device(value: &str) -> Result<Device, String> {
    config::parse_device(value).map_err(|err| err.to_string())
}

fn main() -> Fallible<()> {
    pretty_env_logger::init();

    // Set signal handler
    ctrlc::set_handler(|| {
        warn!("Interrupted by user");
        SHUTDOWN_FLAG.store(true, Ordering::SeqCst);
    })?;

    // Parse arguments
    let args: Args = argh::from_env();

    // load config
    let mut config = match &args.config {
        Some(path) => Config::open(path)?,
        None => Config::default(),
    };
    config.apply(args.overrides());
    config.validate()?;
    info!("running on {}", config::device_name(config.device));

    // collect image pairs
    let pairs = pairs::discover_pairs(&config)?;
    info!("{} image pair(s) to process", pairs.len());

    // load the frozen feature extractor once
    let (_vs, extractor) =
        model::load_feature_extractor(config.model, config.weights_path(), config.device)?;
    let transfer = StyleTransfer::new(&config, &extractor);

    for pair in pairs.iter() {
        let outcome = transfer.run(pair, &SHUTDOWN_FLAG)?;
        if outcome.interrupted {
            break;
        }
    }

    Ok(())
}
