use crate::{common::*, params};

/// Optimizers shipped with libtorch. L-BFGS is not among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
pub enum OptimizerKind {
    #[serde(rename = "adam")]
    #[derivative(Default)]
    Adam,
    #[serde(rename = "adamw")]
    AdamW,
    #[serde(rename = "sgd")]
    Sgd,
    #[serde(rename = "rmsprop")]
    RmsProp,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adam => "adam",
            Self::AdamW => "adamw",
            Self::Sgd => "sgd",
            Self::RmsProp => "rmsprop",
        }
    }

    /// Builds an optimizer over every trainable variable in `vs`.
    pub fn build(&self, vs: &VarStore, learning_rate: f64) -> Fallible<nn::Optimizer> {
        let optimizer = match self {
            Self::Adam => nn::Adam::default().build(vs, learning_rate)?,
            Self::AdamW => nn::AdamW::default().build(vs, learning_rate)?,
            Self::Sgd => nn::Sgd {
                momentum: params::SGD_MOMENTUM,
                ..Default::default()
            }
            .build(vs, learning_rate)?,
            Self::RmsProp => nn::RmsProp::default().build(vs, learning_rate)?,
        };
        Ok(optimizer)
    }
}

impl Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(text: &str) -> Fallible<Self> {
        let kind = match text {
            "adam" => Self::Adam,
            "adamw" => Self::AdamW,
            "sgd" => Self::Sgd,
            "rmsprop" => Self::RmsProp,
            "lbfgs" => bail!("lbfgs is not provided by libtorch bindings, use adam instead"),
            _ => bail!(
                r#"unknown optimizer "{}", expect "adam", "adamw", "sgd" or "rmsprop""#,
                text
            ),
        };
        Ok(kind)
    }
}
