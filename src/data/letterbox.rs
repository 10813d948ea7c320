//! Aspect-preserving resize and centered zero padding to a square canvas.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::data::stats::NormalizationStats;
use crate::data::tensor::ImageTensor;

/// Interpolation used for every resize in the pipeline (bilinear).
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Scaled size and padding that fit a `width × height` image into a
/// `target × target` canvas.
///
/// The longer side becomes `target`; the shorter side is scaled by the same
/// ratio and rounded, but never reaches `target` unless the image is square
/// (or `target` is 1). Padding centers the image, putting the odd pixel on
/// the right/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterboxGeometry {
    pub target: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
}

impl LetterboxGeometry {
    pub fn compute(width: u32, height: u32, target: u32) -> LetterboxGeometry {
        let t = target as f64;
        let (scaled_width, scaled_height) = if width > height {
            (target, (height as f64 * t / width as f64).round() as u32)
        } else if height > 0 {
            ((width as f64 * t / height as f64).round() as u32, target)
        } else {
            (target, target)
        };
        // A non-square image always keeps some padding on its short side.
        let short_max = if width != height { target.saturating_sub(1).max(1) } else { target.max(1) };
        let (width_max, height_max) = if width > height { (target, short_max) } else { (short_max, target) };
        let scaled_width = scaled_width.clamp(1, width_max.max(1));
        let scaled_height = scaled_height.clamp(1, height_max.max(1));

        let pad_left = (target - scaled_width) / 2;
        let pad_top = (target - scaled_height) / 2;
        LetterboxGeometry {
            target,
            scaled_width,
            scaled_height,
            pad_left,
            pad_right: target - scaled_width - pad_left,
            pad_top,
            pad_bottom: target - scaled_height - pad_top,
        }
    }

    /// Geometry for an image that already fills the canvas (no padding).
    pub fn full(target: u32) -> LetterboxGeometry {
        LetterboxGeometry::compute(target, target, target)
    }
}

/// Resizes `img` to the geometry's scaled size; a no-op when it already matches.
pub fn resize_to_fit(img: DynamicImage, geometry: &LetterboxGeometry) -> DynamicImage {
    if img.dimensions() == (geometry.scaled_width, geometry.scaled_height) {
        return img;
    }
    img.resize_exact(geometry.scaled_width, geometry.scaled_height, RESIZE_FILTER)
}

/// Pads `img` (already `scaled_width × scaled_height`) onto a zero canvas,
/// scales to [0, 1] and normalizes per channel.
///
/// Padding is zero in pixel space, so it normalizes to `-mean[c] / std[c]`.
pub fn pad_to_tensor(img: &DynamicImage, geometry: &LetterboxGeometry, stats: &NormalizationStats) -> ImageTensor {
    let channels = stats.channels();
    let target = geometry.target as usize;
    let mut tensor = ImageTensor::zeros(channels, target, target);

    let (w, h) = img.dimensions();
    debug_assert_eq!((w, h), (geometry.scaled_width, geometry.scaled_height));
    let raw = img.as_bytes();
    let (w, h) = (w as usize, h as usize);
    let (left, top) = (geometry.pad_left as usize, geometry.pad_top as usize);

    for y in 0..h.min(target - top) {
        for x in 0..w.min(target - left) {
            let px = (y * w + x) * channels;
            for c in 0..channels {
                let idx = tensor.index(c, y + top, x + left);
                tensor.data[idx] = raw[px + c] as f64 / 255.0;
            }
        }
    }

    for c in 0..channels {
        let plane = c * target * target;
        for v in &mut tensor.data[plane..plane + target * target] {
            *v = stats.normalize(c, *v);
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    #[test]
    fn wide_image_fills_width() {
        let g = LetterboxGeometry::compute(300, 150, 224);
        assert_eq!((g.scaled_width, g.scaled_height), (224, 112));
        assert_eq!((g.pad_top, g.pad_bottom), (56, 56));
        assert_eq!((g.pad_left, g.pad_right), (0, 0));
    }

    #[test]
    fn tall_image_fills_height_and_odd_pad_goes_last() {
        let g = LetterboxGeometry::compute(101, 200, 100);
        // 101 * 100 / 200 = 50.5 rounds to 51
        assert_eq!((g.scaled_width, g.scaled_height), (51, 100));
        assert_eq!((g.pad_left, g.pad_right), (24, 25));
        assert_eq!(g.pad_left + g.scaled_width + g.pad_right, 100);
    }

    #[test]
    fn square_image_has_no_padding() {
        assert_eq!(LetterboxGeometry::compute(64, 64, 32), LetterboxGeometry::full(32));
        let g = LetterboxGeometry::full(32);
        assert_eq!((g.scaled_width, g.scaled_height, g.pad_left, g.pad_top), (32, 32, 0, 0));
    }

    #[test]
    fn near_square_image_keeps_a_pad_row() {
        let g = LetterboxGeometry::compute(1000, 999, 224);
        assert_eq!((g.scaled_width, g.scaled_height), (224, 223));
        assert_eq!((g.pad_top, g.pad_bottom), (0, 1));

        let g = LetterboxGeometry::compute(301, 300, 224);
        assert_eq!((g.scaled_width, g.scaled_height), (224, 223));
        let g = LetterboxGeometry::compute(999, 1000, 224);
        assert_eq!((g.scaled_width, g.scaled_height), (223, 224));
        assert_eq!((g.pad_left, g.pad_right), (0, 1));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        let g = LetterboxGeometry::compute(10_000, 1, 16);
        assert_eq!(g.scaled_height, 1);
        assert_eq!(g.pad_top + g.scaled_height + g.pad_bottom, 16);
    }

    #[test]
    fn padding_normalizes_to_negative_mean_over_std() {
        let stats = NormalizationStats::uniform(1, 0.5, 0.25).unwrap();
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([255])));
        let g = LetterboxGeometry::compute(4, 2, 4);
        let t = pad_to_tensor(&img, &g, &stats);
        assert_eq!(t.shape(), (1, 4, 4));
        assert_eq!(t.get(0, 0, 0), -2.0);
        assert_eq!(t.get(0, 1, 2), 2.0);
        assert_eq!(t.get(0, 3, 3), -2.0);
    }
}
