use crate::{common::*, model::FeatureExtractor, params};

/// Channel correlations of `[b, c, h, w]` features, scaled by `1 / (c * h * w)`.
pub fn gram_matrix(features: &Tensor) -> Fallible<Tensor> {
    let (batch_size, channels, height, width) = features.size4()?;
    let flat = features.view([batch_size, channels, height * width]);
    let gram = flat.bmm(&flat.transpose(1, 2));
    Ok(gram / (channels * height * width) as f64)
}

pub fn content_loss(target: &Tensor, current: &Tensor) -> Tensor {
    target.mse_loss(current, Reduction::Mean)
}

/// Summed squared Gram differences, averaged over layers.
pub fn style_loss(target_grams: &[Tensor], current_grams: &[Tensor]) -> Fallible<Tensor> {
    ensure!(
        !target_grams.is_empty() && target_grams.len() == current_grams.len(),
        "expect equal, non-zero number of style layers, got {} and {}",
        target_grams.len(),
        current_grams.len()
    );

    let sum = target_grams
        .iter()
        .zip(current_grams.iter())
        .map(|(target, current)| {
            target
                .get(0)
                .mse_loss(&current.get(0), Reduction::Sum)
        })
        .reduce(|lhs, rhs| lhs + rhs)
        .unwrap();

    Ok(sum / target_grams.len() as f64)
}

/// Sum of absolute differences between horizontal and vertical neighbours.
pub fn total_variation(image: &Tensor) -> Fallible<Tensor> {
    let (_b, _c, height, width) = image.size4()?;

    let horizontal = if width > 1 {
        (image.narrow(3, 0, width - 1) - image.narrow(3, 1, width - 1))
            .abs()
            .sum(Kind::Float)
    } else {
        image.zeros_like().sum(Kind::Float)
    };
    let vertical = if height > 1 {
        (image.narrow(2, 0, height - 1) - image.narrow(2, 1, height - 1))
            .abs()
            .sum(Kind::Float)
    } else {
        image.zeros_like().sum(Kind::Float)
    };

    Ok(horizontal + vertical)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossWeights {
    pub content: f64,
    pub style: f64,
    pub tv: f64,
}

/// Scalar losses of one evaluation. `total` is the only one carrying gradients
/// that matter to the optimizer; the others are the raw, unweighted terms.
#[derive(Debug)]
pub struct LossOutput {
    pub total: Tensor,
    pub content: Tensor,
    pub style: Tensor,
    pub tv: Tensor,
}

impl LossOutput {
    pub fn values(&self) -> LossValues {
        LossValues {
            total: self.total.double_value(&[]),
            content: self.content.double_value(&[]),
            style: self.style.double_value(&[]),
            tv: self.tv.double_value(&[]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossValues {
    pub total: f64,
    pub content: f64,
    pub style: f64,
    pub tv: f64,
}

/// Reference representations of the content and style images, computed once.
#[derive(Debug)]
pub struct StyleObjective {
    content_target: Tensor,
    style_targets: Vec<Tensor>,
    weights: LossWeights,
    normalize: bool,
}

impl StyleObjective {
    pub fn new(
        extractor: &FeatureExtractor,
        content_image: &Tensor,
        style_image: &Tensor,
        weights: LossWeights,
        normalize: bool,
    ) -> Fallible<Self> {
        let (content_target, style_targets) = tch::no_grad(|| -> Fallible<_> {
            let content_maps = extractor.forward(content_image);
            let content_target = content_maps.content().get(0);

            let style_maps = extractor.forward(style_image);
            let style_targets = style_maps
                .style()
                .into_iter()
                .map(gram_matrix)
                .collect::<Fallible<Vec<_>>>()?;

            Ok((content_target, style_targets))
        })?;

        Ok(Self {
            content_target,
            style_targets,
            weights,
            normalize,
        })
    }

    pub fn compute(&self, extractor: &FeatureExtractor, canvas: &Tensor) -> Fallible<LossOutput> {
        let maps = extractor.forward(canvas);

        let content = content_loss(&self.content_target, &maps.content().get(0));

        let current_grams = maps
            .style()
            .into_iter()
            .map(gram_matrix)
            .collect::<Fallible<Vec<_>>>()?;
        let style = style_loss(&self.style_targets, &current_grams)?;

        let tv = total_variation(canvas)?;

        let (content_scale, style_scale, tv_scale) = if self.normalize {
            (
                params::MAX_CONTENT_LOSS,
                params::MAX_STYLE_LOSS,
                params::MAX_TV_LOSS,
            )
        } else {
            (1.0, 1.0, 1.0)
        };

        let LossWeights {
            content: content_weight,
            style: style_weight,
            tv: tv_weight,
        } = self.weights;

        let total = &content * (content_weight / content_scale)
            + &style * (style_weight / style_scale)
            + &tv * (tv_weight / tv_scale);

        Ok(LossOutput {
            total,
            content,
            style,
            tv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureExtractorInit, ModelKind};

    fn randn(shape: &[i64]) -> Tensor {
        Tensor::randn(shape, (Kind::Float, Device::Cpu))
    }

    #[test]
    fn gram_matrix_is_symmetric() {
        let features = randn(&[2, 4, 3, 5]);
        let gram = gram_matrix(&features).unwrap();
        assert_eq!(gram.size(), vec![2, 4, 4]);

        let diff = (&gram - gram.transpose(1, 2)).abs().max().double_value(&[]);
        assert!(diff < 1e-6);
    }

    #[test]
    fn gram_matrix_of_ones() {
        let features = Tensor::ones(&[1, 2, 2, 2], (Kind::Float, Device::Cpu));
        let gram = gram_matrix(&features).unwrap();
        // each entry is 4 / (2 * 2 * 2)
        let max_err = (gram - 0.5).abs().max().double_value(&[]);
        assert!(max_err < 1e-6);
    }

    #[test]
    fn total_variation_of_constant_is_zero() {
        let image = Tensor::ones(&[1, 3, 8, 6], (Kind::Float, Device::Cpu)) * 42.0;
        let tv = total_variation(&image).unwrap().double_value(&[]);
        assert_eq!(tv, 0.0);
    }

    #[test]
    fn total_variation_counts_both_directions() {
        // [[0, 1], [2, 3]]: horizontal |0-1| + |2-3| = 2, vertical |0-2| + |1-3| = 4
        let image = Tensor::of_slice(&[0f32, 1., 2., 3.]).view([1, 1, 2, 2]);
        let tv = total_variation(&image).unwrap().double_value(&[]);
        assert!((tv - 6.0).abs() < 1e-6);
    }

    #[test]
    fn style_loss_averages_layers() {
        let a = Tensor::zeros(&[1, 2, 2], (Kind::Float, Device::Cpu));
        let b = Tensor::ones(&[1, 2, 2], (Kind::Float, Device::Cpu));
        let c = Tensor::ones(&[1, 3, 3], (Kind::Float, Device::Cpu)) * 2.0;
        let d = Tensor::zeros(&[1, 3, 3], (Kind::Float, Device::Cpu));

        // (4 * 1 + 9 * 4) / 2
        let loss = style_loss(&[a, c], &[b, d]).unwrap().double_value(&[]);
        assert!((loss - 20.0).abs() < 1e-6);

        let empty: [Tensor; 0] = [];
        assert!(style_loss(&empty, &empty).is_err());
    }

    #[test]
    fn losses_are_non_negative_scalars() {
        let vs = VarStore::new(Device::Cpu);
        let extractor = FeatureExtractorInit {
            kind: ModelKind::Vgg16,
        }
        .build(vs.root());

        let content = randn(&[1, 3, 16, 16]);
        let style = randn(&[1, 3, 16, 16]);
        let canvas = randn(&[1, 3, 16, 16]);
        let weights = LossWeights {
            content: 1e5,
            style: 3e4,
            tv: 1.0,
        };

        let objective = StyleObjective::new(&extractor, &content, &style, weights, true).unwrap();
        let output = tch::no_grad(|| objective.compute(&extractor, &canvas)).unwrap();

        for loss in [&output.total, &output.content, &output.style, &output.tv] {
            assert!(loss.size().is_empty());
        }
        let LossValues {
            total,
            content,
            style,
            tv,
        } = output.values();
        assert!(total >= 0.0 && content >= 0.0 && style >= 0.0 && tv >= 0.0);

        let expected = 1e5 * content / params::MAX_CONTENT_LOSS
            + 3e4 * style / params::MAX_STYLE_LOSS
            + tv / params::MAX_TV_LOSS;
        assert!((total - expected).abs() <= 1e-3 * expected.max(1.0));
    }

    #[test]
    fn content_image_has_zero_content_loss() {
        let vs = VarStore::new(Device::Cpu);
        let extractor = FeatureExtractorInit {
            kind: ModelKind::Vgg16,
        }
        .build(vs.root());

        let content = randn(&[1, 3, 16, 16]);
        let style = randn(&[1, 3, 16, 16]);
        let weights = LossWeights {
            content: 1.0,
            style: 1.0,
            tv: 0.0,
        };
        let objective = StyleObjective::new(&extractor, &content, &style, weights, false).unwrap();

        let output = tch::no_grad(|| objective.compute(&extractor, &content)).unwrap();
        assert!(output.content.double_value(&[]) < 1e-8);

        let output = tch::no_grad(|| objective.compute(&extractor, &style)).unwrap();
        assert!(output.style.double_value(&[]) < 1e-8);
    }
}
