use std::path::Path;

use rand::Rng;

use crate::data::index::{DatasetIndex, Sample};
use crate::data::tensor::ImageTensor;
use crate::data::transform::{conform_channels, ChannelPolicy, ImageTransform, Mode};
use crate::error::Result;

/// A split of `(path, label)` samples decoded and transformed on access.
///
/// Nothing is cached: every `get` reads the file again, so a train-mode
/// dataset yields a fresh augmentation each epoch.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    samples: Vec<Sample>,
    transform: ImageTransform,
    mode: Mode,
    channel_policy: ChannelPolicy,
}

impl ImageDataset {
    pub fn new(samples: Vec<Sample>, transform: ImageTransform, mode: Mode, channel_policy: ChannelPolicy) -> Self {
        ImageDataset { samples, transform, mode, channel_policy }
    }

    pub fn from_index(index: &DatasetIndex, transform: ImageTransform, mode: Mode, channel_policy: ChannelPolicy) -> Self {
        ImageDataset::new(index.samples.clone(), transform, mode, channel_policy)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn transform(&self) -> &ImageTransform {
        &self.transform
    }

    /// Number of scalar inputs one transformed sample flattens to.
    pub fn input_size(&self) -> usize {
        let t = self.transform.target() as usize;
        self.transform.channels() * t * t
    }

    /// Decodes, conforms and transforms sample `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= self.len()`.
    pub fn get<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Result<(ImageTensor, usize)> {
        let sample = &self.samples[idx];
        let tensor = self.load(&sample.path, rng)?;
        Ok((tensor, sample.label))
    }

    fn load<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> Result<ImageTensor> {
        let img = image::open(path)?;
        let img = conform_channels(img, self.transform.channels(), self.channel_policy, path)?;
        self.transform.apply(img, self.mode, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::data::stats::NormalizationStats;
    use crate::data::transform::ResizeStrategy;
    use crate::error::Error;

    fn transform() -> ImageTransform {
        let stats = Arc::new(NormalizationStats::uniform(3, 0.5, 0.5).unwrap());
        ImageTransform::new(12, ResizeStrategy::Letterbox, stats).unwrap()
    }

    #[test]
    fn get_returns_tensor_and_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(20, 10, Rgb([10, 20, 30])).save(&path).unwrap();

        let ds = ImageDataset::new(vec![Sample { path, label: 1 }], transform(), Mode::Eval, ChannelPolicy::Strict);
        assert_eq!(ds.input_size(), 3 * 12 * 12);
        let (tensor, label) = ds.get(0, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(label, 1);
        assert_eq!(tensor.shape(), (3, 12, 12));
    }

    #[test]
    fn rgba_file_follows_channel_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])).save(&path).unwrap();
        let samples = vec![Sample { path, label: 0 }];

        let strict = ImageDataset::new(samples.clone(), transform(), Mode::Eval, ChannelPolicy::Strict);
        assert!(matches!(
            strict.get(0, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(Error::UnsupportedImageMode { .. })
        ));

        let coerce = ImageDataset::new(samples, transform(), Mode::Eval, ChannelPolicy::Coerce);
        assert!(coerce.get(0, &mut ChaCha8Rng::seed_from_u64(0)).is_ok());
    }
}
