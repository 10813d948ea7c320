//! Stochastic training augmentations.
//!
//! Every function takes the random source explicitly; nothing here holds
//! state, so the same policy can run on many threads at once as long as
//! each call gets its own RNG.

use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use rand::Rng;

use crate::data::letterbox::RESIZE_FILTER;

/// Which augmentations run in train mode and how strong they are.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentPolicy {
    pub hflip_prob: f64,
    pub vflip_prob: f64,
    /// Brightness multiplier range, `None` to disable.
    pub brightness: Option<(f64, f64)>,
    /// Contrast multiplier range, `None` to disable.
    pub contrast: Option<(f64, f64)>,
    pub invert_prob: f64,
    /// Rotation angle is drawn from `[-rotation_degrees, rotation_degrees]`.
    pub rotation_degrees: f64,
    /// Grow the canvas so rotated corners are kept.
    pub rotate_expand: bool,
}

impl AugmentPolicy {
    /// Letterbox training policy: flips, strong jitter, ±20° expanding rotation.
    pub fn letterbox() -> Self {
        AugmentPolicy {
            hflip_prob: 0.5,
            vflip_prob: 0.5,
            brightness: Some((0.75, 1.5)),
            contrast: Some((1.25, 1.75)),
            invert_prob: 0.0,
            rotation_degrees: 20.0,
            rotate_expand: true,
        }
    }

    /// Center-crop training policy: flips, mild jitter, inversion, ±15° rotation.
    pub fn center_crop() -> Self {
        AugmentPolicy {
            hflip_prob: 0.5,
            vflip_prob: 0.5,
            brightness: Some((0.75, 1.25)),
            contrast: Some((0.75, 1.25)),
            invert_prob: 0.2,
            rotation_degrees: 15.0,
            rotate_expand: false,
        }
    }

    /// No augmentation at all.
    pub fn none() -> Self {
        AugmentPolicy {
            hflip_prob: 0.0,
            vflip_prob: 0.0,
            brightness: None,
            contrast: None,
            invert_prob: 0.0,
            rotation_degrees: 0.0,
            rotate_expand: false,
        }
    }

    /// Flip, color-jitter, invert, rotate, in that order.
    ///
    /// With `rotate_expand` the output may be larger than the input.
    pub fn apply<R: Rng + ?Sized>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let mut img = img;
        if self.hflip_prob > 0.0 && rng.gen_bool(self.hflip_prob) {
            img = img.fliph();
        }
        if self.vflip_prob > 0.0 && rng.gen_bool(self.vflip_prob) {
            img = img.flipv();
        }
        img = self.color_jitter(img, rng);
        if self.invert_prob > 0.0 && rng.gen_bool(self.invert_prob) {
            img = map_subpixels(&img, |v| 255.0 - v);
        }
        if self.rotation_degrees > 0.0 {
            let angle = rng.gen_range(-self.rotation_degrees..=self.rotation_degrees);
            img = rotate(&img, angle, self.rotate_expand);
        }
        img
    }

    /// Brightness and contrast with independently drawn factors, applied in
    /// random order.
    fn color_jitter<R: Rng + ?Sized>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let brightness = self.brightness.map(|(lo, hi)| rng.gen_range(lo..=hi));
        let contrast = self.contrast.map(|(lo, hi)| rng.gen_range(lo..=hi));
        let brightness_first = rng.gen_bool(0.5);

        let mut img = img;
        let ops: [Option<(bool, f64)>; 2] = if brightness_first {
            [brightness.map(|f| (true, f)), contrast.map(|f| (false, f))]
        } else {
            [contrast.map(|f| (false, f)), brightness.map(|f| (true, f))]
        };
        for (is_brightness, factor) in ops.into_iter().flatten() {
            img = if is_brightness {
                adjust_brightness(&img, factor)
            } else {
                adjust_contrast(&img, factor)
            };
        }
        img
    }
}

/// Multiplies every channel by `factor` (blend with black).
pub fn adjust_brightness(img: &DynamicImage, factor: f64) -> DynamicImage {
    map_subpixels(img, |v| v * factor)
}

/// Blends every channel with the image's mean gray level:
/// `mean + factor * (v - mean)`.
pub fn adjust_contrast(img: &DynamicImage, factor: f64) -> DynamicImage {
    let mean = mean_gray(img);
    map_subpixels(img, |v| mean + factor * (v - mean))
}

fn mean_gray(img: &DynamicImage) -> f64 {
    let raw = img.as_bytes();
    let channels = img.color().channel_count() as usize;
    if raw.is_empty() || channels == 0 {
        return 0.0;
    }
    let total: f64 = raw.chunks_exact(channels)
        .map(|px| match px {
            [r, g, b, ..] => 0.299 * *r as f64 + 0.587 * *g as f64 + 0.114 * *b as f64,
            [l, ..] => *l as f64,
            [] => 0.0,
        })
        .sum();
    total / (raw.len() / channels) as f64
}

/// Applies `f` to every 8-bit subpixel, clamping to [0, 255].
fn map_subpixels<F: Fn(f64) -> f64>(img: &DynamicImage, f: F) -> DynamicImage {
    let apply = |v: &mut u8| *v = f(*v as f64).round().clamp(0.0, 255.0) as u8;
    match img {
        DynamicImage::ImageLuma8(buf) => {
            let mut out = buf.clone();
            out.iter_mut().for_each(apply);
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageRgb8(buf) => {
            let mut out = buf.clone();
            out.iter_mut().for_each(apply);
            DynamicImage::ImageRgb8(out)
        }
        other => {
            let mut out = other.to_rgb8();
            out.iter_mut().for_each(apply);
            DynamicImage::ImageRgb8(out)
        }
    }
}

/// Size of the bounding box of a `width × height` rectangle rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (width as f64, height as f64);
    let new_w = (w * cos.abs() + h * sin.abs() - 1e-6).ceil().max(1.0) as u32;
    let new_h = (w * sin.abs() + h * cos.abs() - 1e-6).ceil().max(1.0) as u32;
    (new_w, new_h)
}

/// Rotates about the image center with bilinear sampling and zero fill.
///
/// With `expand` the canvas grows to the rotated bounding box; otherwise it
/// keeps the input size and corners are cropped.
pub fn rotate(img: &DynamicImage, degrees: f64, expand: bool) -> DynamicImage {
    if degrees.abs() < 1e-3 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let (out_w, out_h) = if expand { rotated_bounds(w, h, degrees) } else { (w, h) };
    match img {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(rotate_buffer(buf, degrees, out_w, out_h)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(rotate_buffer(buf, degrees, out_w, out_h)),
        other => DynamicImage::ImageRgb8(rotate_buffer(&other.to_rgb8(), degrees, out_w, out_h)),
    }
}

fn rotate_buffer<P>(src: &ImageBuffer<P, Vec<u8>>, degrees: f64, out_w: u32, out_h: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = src.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (in_cx, in_cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let (out_cx, out_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            // Inverse map from the output pixel center back into the source.
            let dx = x as f64 + 0.5 - out_cx;
            let dy = y as f64 + 0.5 - out_cy;
            let sx = in_cx + dx * cos + dy * sin;
            let sy = in_cy - dx * sin + dy * cos;
            if sx < 0.0 || sy < 0.0 || sx > w as f64 || sy > h as f64 {
                continue;
            }
            let sample = bilinear(src, sx - 0.5, sy - 0.5);
            let dst = out.get_pixel_mut(x, y).channels_mut();
            dst[..channels].copy_from_slice(&sample[..channels]);
        }
    }
    out
}

fn bilinear<P>(img: &ImageBuffer<P, Vec<u8>>, x: f64, y: f64) -> [u8; 4]
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (w, h) = img.dimensions();
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0).channels();
    let p10 = img.get_pixel(x1, y0).channels();
    let p01 = img.get_pixel(x0, y1).channels();
    let p11 = img.get_pixel(x1, y1).channels();

    let mut result = [0u8; 4];
    for c in 0..(P::CHANNEL_COUNT as usize).min(4) {
        let v = p00[c] as f64 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f64 * fx * (1.0 - fy)
            + p01[c] as f64 * (1.0 - fx) * fy
            + p11[c] as f64 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    result
}

/// Random crop covering `scale` of the area with aspect ratio in `ratio`
/// (log-uniform), resized to `size × size`. Falls back to the largest
/// central crop after ten rejected draws.
pub fn random_resized_crop<R: Rng + ?Sized>(img: &DynamicImage, size: u32, rng: &mut R) -> DynamicImage {
    const SCALE: (f64, f64) = (0.08, 1.0);
    const RATIO: (f64, f64) = (3.0 / 4.0, 4.0 / 3.0);

    let (w, h) = img.dimensions();
    let area = (w * h) as f64;
    let (log_lo, log_hi) = (RATIO.0.ln(), RATIO.1.ln());

    for _ in 0..10 {
        let target_area = area * rng.gen_range(SCALE.0..=SCALE.1);
        let aspect = rng.gen_range(log_lo..=log_hi).exp();
        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;
        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let x = rng.gen_range(0..=w - cw);
            let y = rng.gen_range(0..=h - ch);
            return img.crop_imm(x, y, cw, ch).resize_exact(size, size, RESIZE_FILTER);
        }
    }

    // Fallback: central crop clamped to the allowed ratio range.
    let in_ratio = w as f64 / h as f64;
    let (cw, ch) = if in_ratio < RATIO.0 {
        (w, ((w as f64 / RATIO.0).round() as u32).min(h))
    } else if in_ratio > RATIO.1 {
        (((h as f64 * RATIO.1).round() as u32).min(w), h)
    } else {
        (w, h)
    };
    img.crop_imm((w - cw) / 2, (h - ch) / 2, cw, ch).resize_exact(size, size, RESIZE_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn solid(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    #[test]
    fn rotation_by_right_angle_swaps_expanded_bounds() {
        assert_eq!(rotated_bounds(40, 20, 90.0), (20, 40));
        assert_eq!(rotated_bounds(40, 20, 0.0), (40, 20));
        let (w, h) = rotated_bounds(100, 100, 20.0);
        assert!(w > 100 && h > 100);
    }

    #[test]
    fn expanding_rotation_grows_canvas_and_fills_corners_with_zero() {
        let img = solid(30, 30, 200);
        let rotated = rotate(&img, 20.0, true);
        let (w, h) = rotated.dimensions();
        assert_eq!((w, h), rotated_bounds(30, 30, 20.0));
        assert_eq!(rotated.to_rgb8().get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rotated.to_rgb8().get_pixel(w / 2, h / 2), &Rgb([200, 200, 200]));
        assert_eq!(rotate(&img, 20.0, false).dimensions(), (30, 30));
    }

    #[test]
    fn brightness_and_contrast_clamp() {
        let img = solid(2, 2, 200);
        assert_eq!(adjust_brightness(&img, 1.5).to_rgb8().get_pixel(0, 0), &Rgb([255, 255, 255]));
        // Uniform image: contrast leaves it unchanged.
        assert_eq!(adjust_contrast(&img, 1.75).to_rgb8().get_pixel(1, 1), &Rgb([200, 200, 200]));
    }

    #[test]
    fn none_policy_is_identity() {
        let img = solid(5, 3, 77);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(AugmentPolicy::none().apply(img.clone(), &mut rng), img);
    }

    #[test]
    fn random_resized_crop_has_requested_size() {
        let img = solid(64, 20, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(random_resized_crop(&img, 16, &mut rng).dimensions(), (16, 16));
        }
    }

    #[test]
    fn same_seed_same_augmentation() {
        let mut img = RgbImage::new(12, 8);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 20) as u8, (y * 30) as u8, 90]);
        }
        let img = DynamicImage::ImageRgb8(img);
        let policy = AugmentPolicy::letterbox();
        let a = policy.apply(img.clone(), &mut ChaCha8Rng::seed_from_u64(42));
        let b = policy.apply(img, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
