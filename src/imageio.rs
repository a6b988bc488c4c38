use crate::{common::*, params};

/// How a loaded image is resized before entering the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resize {
    /// Scale to the height, keeping the aspect ratio.
    Height(usize),
    /// Scale to exactly `(width, height)`.
    Exact(usize, usize),
}

pub fn target_size(width: u32, height: u32, resize: Resize) -> Fallible<(u32, u32)> {
    ensure!(width > 0 && height > 0, "image has zero size");

    let (new_width, new_height) = match resize {
        Resize::Height(new_height) => {
            let new_width = (width as f64 * (new_height as f64 / height as f64)) as u32;
            (new_width, new_height as u32)
        }
        Resize::Exact(new_width, new_height) => (new_width as u32, new_height as u32),
    };

    ensure!(
        new_width > 0 && new_height > 0,
        "resizing {}x{} image with {:?} yields an empty image",
        width,
        height,
        resize
    );
    Ok((new_width, new_height))
}

pub fn load_image<P>(path: P, resize: Resize, device: Device) -> Fallible<Tensor>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let image = ImageReader::open(path)
        .with_context(|| format!("unable to open image {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("unable to decode image {}", path.display()))?
        .to_rgb8();

    let (width, height) = image.dimensions();
    let (new_width, new_height) = target_size(width, height, resize)?;
    let image = if (new_width, new_height) == (width, height) {
        image
    } else {
        imageops::resize(&image, new_width, new_height, FilterType::CatmullRom)
    };
    debug!(
        "loaded {} ({}x{} -> {}x{})",
        path.display(),
        width,
        height,
        new_width,
        new_height
    );

    Ok(image_to_tensor(&image).to_device(device))
}

/// Converts to a `[1, 3, h, w]` float tensor in the `[0, 255]` scale minus the
/// ImageNet mean.
pub fn image_to_tensor(image: &RgbImage) -> Tensor {
    let (width, height) = image.dimensions();
    let mean = Tensor::of_slice(&params::IMAGENET_MEAN_255).view([3, 1, 1]);

    let pixels = Tensor::of_slice(image.as_raw().as_slice())
        .to_kind(Kind::Float)
        .view([height as i64, width as i64, 3])
        .permute(&[2, 0, 1]);

    (pixels - mean).unsqueeze(0)
}

/// Inverse of [image_to_tensor]. Accepts `[1, 3, h, w]` or `[3, h, w]`.
pub fn tensor_to_image(tensor: &Tensor) -> Fallible<RgbImage> {
    let tensor = match tensor.dim() {
        4 => {
            ensure!(tensor.size()[0] == 1, "expect a batch of one image");
            tensor.get(0)
        }
        3 => tensor.shallow_clone(),
        dim => bail!("expect a 3 or 4 dimensional image tensor, got {} dims", dim),
    };
    let (channels, height, width) = tensor.size3()?;
    ensure!(channels == 3, "expect 3 channels, got {}", channels);

    let mean = Tensor::of_slice(&params::IMAGENET_MEAN_255)
        .view([3, 1, 1])
        .to_device(tensor.device());
    let pixels = (tensor.detach().to_kind(Kind::Float) + mean)
        .clamp(0.0, 255.0)
        .round()
        .to_kind(Kind::Uint8)
        .permute(&[1, 2, 0])
        .contiguous()
        .to_device(Device::Cpu);

    let buf_size = (height * width * channels) as usize;
    let mut buf = vec![0_u8; buf_size];
    pixels.copy_data(&mut buf, buf_size);

    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_vec(width as u32, height as u32, buf)
        .ok_or_else(|| format_err!("pixel buffer does not match {}x{}", width, height))
}

pub fn save_image<P>(tensor: &Tensor, path: P) -> Fallible<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    tensor_to_image(tensor)?
        .save(path)
        .with_context(|| format!("unable to save image {}", path.display()))?;
    Ok(())
}

/// File name without directories and extension.
pub fn file_stem<P>(path: P) -> String
where
    P: AsRef<Path>,
{
    let name = path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) => stem.to_owned(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 20) as u8, ((x + y) * 5) as u8])
        })
    }

    #[test]
    fn target_size_keeps_aspect_ratio() {
        assert_eq!(target_size(800, 600, Resize::Height(300)).unwrap(), (400, 300));
        assert_eq!(target_size(640, 480, Resize::Height(400)).unwrap(), (533, 400));
        assert_eq!(
            target_size(640, 480, Resize::Exact(120, 80)).unwrap(),
            (120, 80)
        );
        assert!(target_size(0, 480, Resize::Height(400)).is_err());
        assert!(target_size(1, 1000, Resize::Height(10)).is_err());
    }

    #[test]
    fn tensor_layout_and_mean() {
        let image = gradient_image(5, 4);
        let tensor = image_to_tensor(&image);
        assert_eq!(tensor.size(), vec![1, 3, 4, 5]);

        // pixel (x = 2, y = 1) is [20, 20, 15]
        let red = tensor.double_value(&[0, 0, 1, 2]);
        let blue = tensor.double_value(&[0, 2, 1, 2]);
        assert!((red - (20.0 - 123.675)).abs() < 1e-3);
        assert!((blue - (15.0 - 103.53)).abs() < 1e-3);
    }

    #[test]
    fn tensor_back_to_image() {
        let image = gradient_image(7, 3);
        let restored = tensor_to_image(&image_to_tensor(&image)).unwrap();
        assert_eq!(restored.dimensions(), (7, 3));
        assert_eq!(restored.get_pixel(6, 2), image.get_pixel(6, 2));
    }

    #[test]
    fn out_of_range_pixels_are_clamped() {
        let tensor = Tensor::ones(&[1, 3, 2, 2], (Kind::Float, Device::Cpu)) * 1000.0;
        let image = tensor_to_image(&tensor).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));

        let tensor = Tensor::ones(&[3, 2, 2], (Kind::Float, Device::Cpu)) * -1000.0;
        let image = tensor_to_image(&tensor).unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgb([0, 0, 0]));

        let tensor = Tensor::ones(&[1, 1, 2, 2], (Kind::Float, Device::Cpu));
        assert!(tensor_to_image(&tensor).is_err());
    }

    #[test]
    fn load_resizes_to_height() {
        let dir = std::env::temp_dir().join(format!("nstrs-imageio-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gradient.png");
        gradient_image(12, 8).save(&path).unwrap();

        let tensor = load_image(&path, Resize::Height(4), Device::Cpu).unwrap();
        assert_eq!(tensor.size(), vec![1, 3, 4, 6]);

        let tensor = load_image(&path, Resize::Exact(5, 3), Device::Cpu).unwrap();
        assert_eq!(tensor.size(), vec![1, 3, 3, 5]);

        assert!(load_image(dir.join("missing.png"), Resize::Height(4), Device::Cpu).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_stem_drops_all_extensions() {
        assert_eq!(file_stem("data/content/figures.jpg"), "figures");
        assert_eq!(file_stem("starry.night.png"), "starry");
        assert_eq!(file_stem("plain"), "plain");
    }
}
