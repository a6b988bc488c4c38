use crate::common::*;

const VGG16_BLOCKS: &[&[i64]] = &[
    &[64, 64],
    &[128, 128],
    &[256, 256, 256],
    &[512, 512, 512],
    &[512, 512, 512],
];

const VGG19_BLOCKS: &[&[i64]] = &[
    &[64, 64],
    &[128, 128],
    &[256, 256, 256, 256],
    &[512, 512, 512, 512],
    &[512, 512, 512, 512],
];

const VGG16_TAPS: &[&str] = &["relu1_2", "relu2_2", "relu3_3", "relu4_3"];
const VGG16_STYLE_LAYERS: &[&str] = &["relu1_2", "relu2_2", "relu3_3", "relu4_3"];

const VGG19_TAPS: &[&str] = &[
    "relu1_1", "relu2_1", "relu3_1", "relu4_1", "conv4_2", "relu5_1",
];
const VGG19_STYLE_LAYERS: &[&str] = &["relu1_1", "relu2_1", "relu3_1", "relu4_1", "relu5_1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
pub enum ModelKind {
    #[serde(rename = "vgg16")]
    Vgg16,
    #[serde(rename = "vgg19")]
    #[derivative(Default)]
    Vgg19,
}

impl ModelKind {
    fn blocks(&self) -> &'static [&'static [i64]] {
        match self {
            Self::Vgg16 => VGG16_BLOCKS,
            Self::Vgg19 => VGG19_BLOCKS,
        }
    }

    /// Layers whose activations are collected, ordered by depth.
    pub fn taps(&self) -> &'static [&'static str] {
        match self {
            Self::Vgg16 => VGG16_TAPS,
            Self::Vgg19 => VGG19_TAPS,
        }
    }

    pub fn content_layer(&self) -> &'static str {
        match self {
            Self::Vgg16 => "relu2_2",
            Self::Vgg19 => "conv4_2",
        }
    }

    pub fn style_layers(&self) -> &'static [&'static str] {
        match self {
            Self::Vgg16 => VGG16_STYLE_LAYERS,
            Self::Vgg19 => VGG19_STYLE_LAYERS,
        }
    }

    /// Smallest input side that survives every max-pool before the deepest tap.
    pub fn min_input_size(&self) -> usize {
        match self {
            // pool1..pool3 precede relu4_3
            Self::Vgg16 => 1 << 3,
            // pool1..pool4 precede relu5_1
            Self::Vgg19 => 1 << 4,
        }
    }

    pub fn weights_stem(&self) -> &'static str {
        match self {
            Self::Vgg16 => "vgg16",
            Self::Vgg19 => "vgg19",
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.weights_stem())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(text: &str) -> Fallible<Self> {
        let kind = match text {
            "vgg16" => Self::Vgg16,
            "vgg19" => Self::Vgg19,
            _ => bail!(r#"unknown model "{}", expect "vgg16" or "vgg19""#, text),
        };
        Ok(kind)
    }
}

#[derive(Debug)]
enum VggLayer {
    Conv(Conv2D),
    Relu,
    MaxPool,
}

#[derive(Debug)]
struct NamedLayer {
    name: String,
    layer: VggLayer,
}

#[derive(Debug, Clone)]
pub struct FeatureExtractorInit {
    pub kind: ModelKind,
}

impl FeatureExtractorInit {
    /// Builds the convolutional part of VGG up to the deepest tap.
    ///
    /// Variables are named `features.<index>.{weight,bias}` following the
    /// torchvision layout, so converted ImageNet weights load as is.
    pub fn build<'p, P>(self, path: P) -> FeatureExtractor
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { kind } = self;

        let features = path / "features";
        let deepest_tap = kind.taps()[kind.taps().len() - 1];
        let conv_config = ConvConfig {
            padding: 1,
            ..Default::default()
        };

        let mut layers: Vec<NamedLayer> = vec![];
        let mut in_channels = 3;

        'blocks: for (block_index, block) in kind.blocks().iter().enumerate() {
            for (conv_index, &out_channels) in block.iter().enumerate() {
                let suffix = format!("{}_{}", block_index + 1, conv_index + 1);

                let conv = nn::conv2d(
                    &features / layers.len(),
                    in_channels,
                    out_channels,
                    3,
                    conv_config,
                );
                in_channels = out_channels;

                for (name, layer) in [
                    (format!("conv{}", suffix), VggLayer::Conv(conv)),
                    (format!("relu{}", suffix), VggLayer::Relu),
                ] {
                    let is_last = name == deepest_tap;
                    layers.push(NamedLayer { name, layer });
                    if is_last {
                        break 'blocks;
                    }
                }
            }

            let name = format!("pool{}", block_index + 1);
            let is_last = name == deepest_tap;
            layers.push(NamedLayer {
                name,
                layer: VggLayer::MaxPool,
            });
            if is_last {
                break;
            }
        }

        FeatureExtractor { kind, layers }
    }
}

#[derive(Debug)]
pub struct FeatureExtractor {
    kind: ModelKind,
    layers: Vec<NamedLayer>,
}

impl FeatureExtractor {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Rejects inputs too small for the pooling layers.
    pub fn check_input(&self, input: &Tensor) -> Fallible<()> {
        let (_b, channels, height, width) = input.size4()?;
        let min_size = self.kind.min_input_size() as i64;
        ensure!(channels == 3, "expect 3 input channels, got {}", channels);
        ensure!(
            height >= min_size && width >= min_size,
            "{} needs images of at least {}x{} pixels, got {}x{}",
            self.kind,
            min_size,
            min_size,
            width,
            height
        );
        Ok(())
    }

    pub fn forward(&self, input: &Tensor) -> FeatureMaps {
        let taps = self.kind.taps();
        let mut maps = Vec::with_capacity(taps.len());
        let mut xs = input.shallow_clone();

        for NamedLayer { name, layer } in self.layers.iter() {
            xs = match layer {
                VggLayer::Conv(conv) => xs.apply(conv),
                VggLayer::Relu => xs.relu(),
                VggLayer::MaxPool => xs.max_pool2d_default(2),
            };

            if let Some(&tap) = taps.iter().find(|&&tap| tap == name.as_str()) {
                maps.push((tap, xs.shallow_clone()));
            }
        }

        debug_assert_eq!(maps.len(), taps.len());

        FeatureMaps {
            kind: self.kind,
            maps,
        }
    }
}

/// Activations of the tapped layers for one input batch.
#[derive(Debug)]
pub struct FeatureMaps {
    kind: ModelKind,
    maps: Vec<(&'static str, Tensor)>,
}

impl FeatureMaps {
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.maps
            .iter()
            .find(|(tap, _)| *tap == name)
            .map(|(_, map)| map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Tensor)> {
        self.maps.iter().map(|(name, map)| (*name, map))
    }

    pub fn content(&self) -> &Tensor {
        let name = self.kind.content_layer();
        self.get(name)
            .unwrap_or_else(|| panic!("the content layer {} is not tapped", name))
    }

    pub fn style(&self) -> Vec<&Tensor> {
        self.kind
            .style_layers()
            .iter()
            .map(|name| {
                self.get(name)
                    .unwrap_or_else(|| panic!("the style layer {} is not tapped", name))
            })
            .collect()
    }
}

/// Loads pretrained weights into a fresh, frozen var store.
pub fn load_feature_extractor<P>(
    kind: ModelKind,
    weights_path: P,
    device: Device,
) -> Fallible<(VarStore, FeatureExtractor)>
where
    P: AsRef<Path>,
{
    let weights_path = weights_path.as_ref();
    let mut vs = VarStore::new(device);
    let extractor = FeatureExtractorInit { kind }.build(vs.root());

    vs.load(weights_path).with_context(|| {
        format!(
            "unable to load {} weights from {}",
            kind,
            weights_path.display()
        )
    })?;
    vs.freeze();

    info!("Using {} in the optimization procedure", kind);
    Ok((vs, extractor))
}
