use crate::{
    canvas,
    common::*,
    config::Config,
    feature_maps,
    imageio::{self, Resize},
    metrics::{LossRecord, MetricsWriter},
    model::FeatureExtractor,
    objective::{LossValues, LossWeights, StyleObjective},
    pairs::ImagePair,
    params,
};

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub dump_dir: PathBuf,
    pub final_image: PathBuf,
    pub last_losses: Option<LossValues>,
    pub completed_iterations: usize,
    pub interrupted: bool,
}

/// Runs the optimization for image pairs, sharing one frozen feature extractor.
#[derive(Debug)]
pub struct StyleTransfer<'a> {
    config: &'a Config,
    extractor: &'a FeatureExtractor,
}

impl<'a> StyleTransfer<'a> {
    pub fn new(config: &'a Config, extractor: &'a FeatureExtractor) -> Self {
        Self { config, extractor }
    }

    pub fn run(&self, pair: &ImagePair, shutdown: &AtomicBool) -> Fallible<TransferOutcome> {
        let config = self.config;
        let extractor = self.extractor;
        let device = config.device;

        let dump_dir = dump_dir(config, pair);
        fs::create_dir_all(&dump_dir)
            .with_context(|| format!("unable to create {}", dump_dir.display()))?;
        {
            let path = dump_dir.join(params::CONFIG_SNAPSHOT_FILE_NAME);
            let file = File::create(&path)
                .with_context(|| format!("unable to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, config)?;
            writer.flush()?;
        }
        info!(
            "combining {} with {} into {}",
            pair.content.display(),
            pair.style.display(),
            dump_dir.display()
        );

        let content_image = imageio::load_image(&pair.content, Resize::Height(config.height), device)?;
        let style_image = imageio::load_image(&pair.style, Resize::Height(config.height), device)?;
        for (image, path) in [(&content_image, &pair.content), (&style_image, &pair.style)] {
            extractor
                .check_input(image)
                .with_context(|| format!("{} is too small after resizing", path.display()))?;
        }

        if config.dump_feature_maps {
            self.dump_reference_feature_maps(pair, &content_image, &style_image, &dump_dir)?;
        }

        let weights = LossWeights {
            content: config.content_weight,
            style: config.style_weight,
            tv: config.tv_weight,
        };
        let objective = StyleObjective::new(
            extractor,
            &content_image,
            &style_image,
            weights,
            config.normalize_losses,
        )?;

        // the canvas is the only trainable tensor
        let init_image =
            canvas::init_canvas(config.init_method, &content_image, &pair.style, config.seed)?;
        let canvas_vs = VarStore::new(device);
        let canvas = canvas_vs.root().var_copy("canvas", &init_image);
        let mut optimizer = config.optimizer.build(&canvas_vs, config.learning_rate)?;

        let mut metrics = if config.log_metrics {
            Some(MetricsWriter::create(dump_dir.join(params::METRICS_FILE_NAME))?)
        } else {
            None
        };

        let instant = Instant::now();
        let mut last_losses = None;
        let mut completed_iterations = 0;
        let mut interrupted = false;
        let mut final_image = None;

        for iteration in 0..config.iterations {
            if shutdown.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }

            let losses = objective.compute(extractor, &canvas)?;
            optimizer.backward_step(&losses.total);
            let values = losses.values();
            ensure!(
                values.total.is_finite(),
                "loss diverged at iteration {}",
                iteration
            );

            info!(
                "{} | iteration: {:03}, total loss={:12.4}, content_loss={:12.4}, style loss={:12.4}, tv loss={:12.4}",
                config.optimizer,
                iteration,
                values.total,
                weights.content * values.content,
                weights.style * values.style,
                weights.tv * values.tv,
            );

            if let Some(metrics) = &mut metrics {
                let elapsed_ms = instant.elapsed().as_millis() as u64;
                metrics.write(&LossRecord::new(iteration, values, elapsed_ms))?;
            }

            if should_save(iteration, config.iterations, config.saving_freq) {
                let path = dump_dir.join(output_file_name(config, pair, iteration));
                imageio::save_image(&canvas, &path)?;
                debug!("saved {}", path.display());
                final_image = Some(path);
            }

            last_losses = Some(values);
            completed_iterations = iteration + 1;
        }

        let final_image = match (interrupted, final_image) {
            (false, Some(path)) => path,
            _ => {
                warn!(
                    "stopped after {} of {} iterations",
                    completed_iterations, config.iterations
                );
                let path = dump_dir.join(interrupted_file_name(config, pair, completed_iterations));
                imageio::save_image(&canvas, &path)?;
                path
            }
        };
        info!("final image saved to {}", final_image.display());

        Ok(TransferOutcome {
            dump_dir,
            final_image,
            last_losses,
            completed_iterations,
            interrupted,
        })
    }

    fn dump_reference_feature_maps(
        &self,
        pair: &ImagePair,
        content_image: &Tensor,
        style_image: &Tensor,
        dump_dir: &Path,
    ) -> Fallible<()> {
        let maps_dir = dump_dir.join("feature_maps");

        for (kind, image, path) in [
            ("content", content_image, &pair.content),
            ("style", style_image, &pair.style),
        ] {
            let maps = tch::no_grad(|| self.extractor.forward(image));
            let saved =
                feature_maps::dump_feature_maps(&maps, maps_dir.join(kind), &imageio::file_stem(path))?;
            info!("saved {} {} feature maps", saved.len(), kind);
        }

        Ok(())
    }
}

/// `<output_dir>/combined_<content>_<style>`
pub fn dump_dir(config: &Config, pair: &ImagePair) -> PathBuf {
    config.output_dir.join(format!(
        "combined_{}_{}",
        imageio::file_stem(&pair.content),
        imageio::file_stem(&pair.style)
    ))
}

/// The last iteration is always saved, intermediate ones every `saving_freq`.
pub fn should_save(iteration: usize, iterations: usize, saving_freq: Option<NonZeroUsize>) -> bool {
    iteration + 1 == iterations
        || saving_freq
            .map(|freq| iteration % freq.get() == 0)
            .unwrap_or(false)
}

/// Numbered when intermediate images are dumped, descriptive otherwise.
pub fn output_file_name(config: &Config, pair: &ImagePair, iteration: usize) -> String {
    match config.saving_freq {
        Some(_) => format!(
            "{:0width$}.{}",
            iteration,
            params::DUMP_EXTENSION,
            width = params::DUMP_INDEX_WIDTH
        ),
        None => format!(
            "{}_{}_o_{}_i_{}_h_{}_m_{}_cw_{}_sw_{}_tv_{}.{}",
            imageio::file_stem(&pair.content),
            imageio::file_stem(&pair.style),
            config.optimizer,
            config.init_method,
            config.height,
            config.model,
            config.content_weight,
            config.style_weight,
            config.tv_weight,
            params::DUMP_EXTENSION
        ),
    }
}

/// Named like the scheduled dump of the last completed step, so `NNNN.jpg`
/// always holds the canvas after step `NNNN`.
fn interrupted_file_name(config: &Config, pair: &ImagePair, completed_iterations: usize) -> String {
    output_file_name(config, pair, completed_iterations.saturating_sub(1))
}
