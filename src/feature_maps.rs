use crate::{common::*, model::FeatureMaps};

/// Averages `[1, c, h, w]` activations over channels and stretches the result
/// to `[0, 255]`.
pub fn averaged_feature_map(map: &Tensor) -> Fallible<GrayImage> {
    let (batch_size, _c, height, width) = map.size4()?;
    ensure!(batch_size == 1, "expect a batch of one, got {}", batch_size);

    let averaged = map
        .detach()
        .to_kind(Kind::Float)
        .mean_dim(&[1], false, Kind::Float)
        .get(0);
    let shifted = &averaged - averaged.min();
    let range = shifted.max().double_value(&[]);
    let normalized = if range > 0.0 {
        shifted / range
    } else {
        shifted.zeros_like()
    };

    let pixels = (normalized * 255.0)
        .round()
        .to_kind(Kind::Uint8)
        .contiguous()
        .to_device(Device::Cpu);
    let buf_size = (height * width) as usize;
    let mut buf = vec![0_u8; buf_size];
    pixels.copy_data(&mut buf, buf_size);

    ImageBuffer::<Luma<u8>, Vec<u8>>::from_vec(width as u32, height as u32, buf)
        .ok_or_else(|| format_err!("pixel buffer does not match {}x{}", width, height))
}

pub fn save_averaged_feature_map<P>(map: &Tensor, path: P) -> Fallible<()>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    averaged_feature_map(map)?
        .save(path)
        .with_context(|| format!("unable to save feature map {}", path.display()))?;
    Ok(())
}

/// Writes `<image_name>_<layer>.png` for every tapped layer.
pub fn dump_feature_maps<P>(maps: &FeatureMaps, dir: P, image_name: &str) -> Fallible<Vec<PathBuf>>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    maps.iter()
        .map(|(layer, map)| {
            let path = dir.join(format!("{}_{}.png", image_name, layer));
            save_averaged_feature_map(map, &path)?;
            debug!("saved feature map {}", path.display());
            Ok(path)
        })
        .collect()
}
