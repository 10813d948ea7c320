//! The resize-and-pad transform: raw image in, normalized `C × T × T` tensor out.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use image::{ColorType, DynamicImage, GenericImageView};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::data::augment::{random_resized_crop, AugmentPolicy};
use crate::data::letterbox::{pad_to_tensor, resize_to_fit, LetterboxGeometry, RESIZE_FILTER};
use crate::data::stats::NormalizationStats;
use crate::data::tensor::ImageTensor;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// How an arbitrary-aspect image is brought to a square canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeStrategy {
    /// Fit the longer side, pad the shorter one with zeros.
    #[default]
    Letterbox,
    /// Resize the shorter side, then crop a square.
    CenterCrop,
}

impl ResizeStrategy {
    pub fn default_augment(self) -> AugmentPolicy {
        match self {
            ResizeStrategy::Letterbox => AugmentPolicy::letterbox(),
            ResizeStrategy::CenterCrop => AugmentPolicy::center_crop(),
        }
    }
}

/// What to do with an image whose channel count differs from the configured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelPolicy {
    /// Fail with `UnsupportedImageMode`.
    #[default]
    Strict,
    /// Convert to grayscale or RGB.
    Coerce,
}

fn mode_name(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".into(),
        ColorType::La8 => "LA".into(),
        ColorType::Rgb8 => "RGB".into(),
        ColorType::Rgba8 => "RGBA".into(),
        other => format!("{:?}", other),
    }
}

/// Brings `img` to 8-bit `channels`-channel layout (1 = Luma8, 3 = Rgb8).
///
/// Under `Strict` only an exact 8-bit match passes; anything else fails with
/// `UnsupportedImageMode`.
pub fn conform_channels(img: DynamicImage, channels: usize, policy: ChannelPolicy, path: &Path) -> Result<DynamicImage> {
    let ok = matches!(
        (channels, img.color()),
        (1, ColorType::L8) | (3, ColorType::Rgb8)
    );
    if ok {
        return Ok(img);
    }
    match (policy, channels) {
        (ChannelPolicy::Coerce, 1) => Ok(DynamicImage::ImageLuma8(img.to_luma8())),
        (ChannelPolicy::Coerce, 3) => Ok(DynamicImage::ImageRgb8(img.to_rgb8())),
        _ => Err(Error::UnsupportedImageMode {
            path: Some(path.to_path_buf()),
            found: mode_name(img.color()),
            expected: channels,
        }),
    }
}

/// Shorter-side resize target used by the center-crop strategy (256 for 224).
pub fn center_crop_resize_size(target: u32) -> u32 {
    ((target as f64 * 256.0 / 224.0).round() as u32).max(target)
}

fn resize_shorter_side(img: &DynamicImage, size: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let (nw, nh) = if w <= h {
        (size, ((h as f64 * size as f64 / w as f64).round() as u32).max(size))
    } else {
        (((w as f64 * size as f64 / h as f64).round() as u32).max(size), size)
    };
    img.resize_exact(nw, nh, RESIZE_FILTER)
}

fn center_crop(img: &DynamicImage, size: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let (cw, ch) = (size.min(w), size.min(h));
    let cropped = img.crop_imm((w - cw) / 2, (h - ch) / 2, cw, ch);
    if (cw, ch) == (size, size) {
        cropped
    } else {
        cropped.resize_exact(size, size, RESIZE_FILTER)
    }
}

/// Square-canvas transform shared by every sample of a dataset.
///
/// Holds only immutable configuration; `apply` takes the random source
/// explicitly so one transform can serve many worker threads.
#[derive(Debug, Clone)]
pub struct ImageTransform {
    target: u32,
    strategy: ResizeStrategy,
    augment: AugmentPolicy,
    stats: Arc<NormalizationStats>,
}

impl ImageTransform {
    pub fn new(target: u32, strategy: ResizeStrategy, stats: Arc<NormalizationStats>) -> Result<Self> {
        if target == 0 {
            return Err(Error::invalid_config("target image size must be positive"));
        }
        Ok(ImageTransform { target, strategy, augment: strategy.default_augment(), stats })
    }

    /// Replaces the strategy's default augmentation policy.
    pub fn with_augment(mut self, augment: AugmentPolicy) -> Self {
        self.augment = augment;
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn channels(&self) -> usize {
        self.stats.channels()
    }

    pub fn strategy(&self) -> ResizeStrategy {
        self.strategy
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    /// Transforms an 8-bit image that already has the configured channel layout.
    ///
    /// Eval mode never touches `rng`.
    pub fn apply<R: Rng + ?Sized>(&self, img: DynamicImage, mode: Mode, rng: &mut R) -> Result<ImageTensor> {
        let expected = self.channels();
        if !matches!((expected, img.color()), (1, ColorType::L8) | (3, ColorType::Rgb8)) {
            return Err(Error::UnsupportedImageMode {
                path: None,
                found: mode_name(img.color()),
                expected,
            });
        }
        let tensor = match self.strategy {
            ResizeStrategy::Letterbox => self.letterbox(img, mode, rng),
            ResizeStrategy::CenterCrop => self.center_crop(img, mode, rng),
        };
        Ok(tensor)
    }

    fn letterbox<R: Rng + ?Sized>(&self, img: DynamicImage, mode: Mode, rng: &mut R) -> ImageTensor {
        let (w, h) = img.dimensions();
        let geometry = LetterboxGeometry::compute(w, h, self.target);
        let img = resize_to_fit(img, &geometry);

        let (img, geometry) = match mode {
            Mode::Eval => (img, geometry),
            Mode::Train => {
                let img = self.augment.apply(img, rng);
                // Rotation may have grown the canvas, so fit it again.
                let (aw, ah) = img.dimensions();
                let geometry = LetterboxGeometry::compute(aw, ah, self.target);
                trace!(w = aw, h = ah, ?geometry, "refit after augmentation");
                (resize_to_fit(img, &geometry), geometry)
            }
        };
        pad_to_tensor(&img, &geometry, &self.stats)
    }

    fn center_crop<R: Rng + ?Sized>(&self, img: DynamicImage, mode: Mode, rng: &mut R) -> ImageTensor {
        let resized = resize_shorter_side(&img, center_crop_resize_size(self.target));
        let square = match mode {
            Mode::Eval => center_crop(&resized, self.target),
            Mode::Train => {
                let cropped = random_resized_crop(&resized, self.target, rng);
                // Non-expanding policies keep the size; refit anything else.
                let augmented = self.augment.apply(cropped, rng);
                if augmented.dimensions() == (self.target, self.target) {
                    augmented
                } else {
                    let geometry = LetterboxGeometry::compute(augmented.width(), augmented.height(), self.target);
                    return pad_to_tensor(&resize_to_fit(augmented, &geometry), &geometry, &self.stats);
                }
            }
        };
        pad_to_tensor(&square, &LetterboxGeometry::full(self.target), &self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage, Rgba};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn stats(channels: usize) -> Arc<NormalizationStats> {
        Arc::new(NormalizationStats::uniform(channels, 0.5, 0.5).unwrap())
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn strict_policy_rejects_rgba() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        let err = conform_channels(img, 3, ChannelPolicy::Strict, Path::new("x.png")).unwrap_err();
        match err {
            Error::UnsupportedImageMode { path, found, expected } => {
                assert_eq!(path.as_deref(), Some(Path::new("x.png")));
                assert_eq!(found, "RGBA");
                assert_eq!(expected, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn coerce_policy_converts() {
        let rgb = gradient(3, 3);
        let gray = conform_channels(rgb, 1, ChannelPolicy::Coerce, Path::new("x.png")).unwrap();
        assert_eq!(gray.color(), ColorType::L8);
        let back = conform_channels(gray, 3, ChannelPolicy::Coerce, Path::new("x.png")).unwrap();
        assert_eq!(back.color(), ColorType::Rgb8);
    }

    #[test]
    fn eval_letterbox_pads_wide_image() {
        let t = ImageTransform::new(8, ResizeStrategy::Letterbox, stats(1)).unwrap();
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 8, Luma([255])));
        let out = t.apply(img, Mode::Eval, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(out.shape(), (1, 8, 8));
        // 4 rows of image centered between 2 + 2 rows of padding.
        assert_eq!(out.get(0, 0, 0), -1.0);
        assert_eq!(out.get(0, 2, 0), 1.0);
        assert_eq!(out.get(0, 5, 7), 1.0);
        assert_eq!(out.get(0, 6, 3), -1.0);
    }

    #[test]
    fn channel_mismatch_is_an_error() {
        let t = ImageTransform::new(8, ResizeStrategy::Letterbox, stats(3)).unwrap();
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let err = t.apply(img, Mode::Eval, &mut ChaCha8Rng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImageMode { path: None, expected: 3, .. }));
        assert!(err.to_string().starts_with("decoded image has unsupported mode L"));
    }

    #[test]
    fn center_crop_shapes_in_both_modes() {
        let t = ImageTransform::new(16, ResizeStrategy::CenterCrop, stats(3)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for mode in [Mode::Eval, Mode::Train, Mode::Train] {
            let out = t.apply(gradient(50, 20), mode, &mut rng).unwrap();
            assert_eq!(out.shape(), (3, 16, 16));
        }
        assert_eq!(center_crop_resize_size(224), 256);
    }

    #[test]
    fn train_letterbox_is_reproducible_per_seed() {
        let t = ImageTransform::new(32, ResizeStrategy::Letterbox, stats(3)).unwrap();
        let a = t.apply(gradient(40, 25), Mode::Train, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        let b = t.apply(gradient(40, 25), Mode::Train, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), (3, 32, 32));
    }
}
