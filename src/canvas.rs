use crate::{
    common::*,
    imageio::{self, Resize},
    params,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
pub enum InitMethod {
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "content")]
    #[derivative(Default)]
    Content,
    #[serde(rename = "style")]
    Style,
}

impl InitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Content => "content",
            Self::Style => "style",
        }
    }
}

impl Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitMethod {
    type Err = Error;

    fn from_str(text: &str) -> Fallible<Self> {
        let method = match text {
            "random" => Self::Random,
            "content" => Self::Content,
            "style" => Self::Style,
            _ => bail!(
                r#"unknown init method "{}", expect "random", "content" or "style""#,
                text
            ),
        };
        Ok(method)
    }
}

/// Produces the starting image. Its shape always equals the content image's
/// shape since both go through the same feature extractor.
pub fn init_canvas<P>(
    method: InitMethod,
    content_image: &Tensor,
    style_path: P,
    seed: Option<i64>,
) -> Fallible<Tensor>
where
    P: AsRef<Path>,
{
    let (_b, _c, height, width) = content_image.size4()?;
    let device = content_image.device();

    let canvas = match method {
        InitMethod::Random => {
            let seed = seed.unwrap_or_else(|| (OsRng.next_u64() >> 1) as i64);
            debug!("random canvas seed {}", seed);
            tch::manual_seed(seed);
            Tensor::randn(&content_image.size(), (Kind::Float, device)) * params::RANDOM_INIT_STD
        }
        InitMethod::Content => content_image.detach().copy(),
        InitMethod::Style => imageio::load_image(
            style_path,
            Resize::Exact(width as usize, height as usize),
            device,
        )?,
    };

    ensure!(
        canvas.size() == content_image.size(),
        "canvas shape {:?} differs from content shape {:?}",
        canvas.size(),
        content_image.size()
    );
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_init_copies() {
        let content = Tensor::randn(&[1, 3, 6, 9], (Kind::Float, Device::Cpu));
        let canvas = init_canvas(InitMethod::Content, &content, "unused.jpg", None).unwrap();
        assert_eq!(canvas.size(), content.size());
        assert_eq!((&canvas - &content).abs().max().double_value(&[]), 0.0);
    }

    #[test]
    fn random_init_is_seeded() {
        let content = Tensor::zeros(&[1, 3, 20, 20], (Kind::Float, Device::Cpu));
        let lhs = init_canvas(InitMethod::Random, &content, "unused.jpg", Some(7)).unwrap();
        let rhs = init_canvas(InitMethod::Random, &content, "unused.jpg", Some(7)).unwrap();
        assert_eq!((&lhs - &rhs).abs().max().double_value(&[]), 0.0);

        // std is around 90
        let std = lhs.std(true).double_value(&[]);
        assert!(std > 60.0 && std < 120.0);
    }

    #[test]
    fn style_init_matches_content_shape() {
        let dir = std::env::temp_dir().join(format!("nstrs-canvas-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let style_path = dir.join("style.png");
        RgbImage::from_pixel(31, 17, Rgb([10, 200, 30]))
            .save(&style_path)
            .unwrap();

        let content = Tensor::zeros(&[1, 3, 8, 12], (Kind::Float, Device::Cpu));
        let canvas = init_canvas(InitMethod::Style, &content, &style_path, None).unwrap();
        assert_eq!(canvas.size(), vec![1, 3, 8, 12]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn parse_init_method() {
        assert_eq!("style".parse::<InitMethod>().unwrap(), InitMethod::Style);
        assert!("noise".parse::<InitMethod>().is_err());
        assert_eq!(InitMethod::Random.to_string(), "random");
    }
}
