use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::data::transform::{conform_channels, ChannelPolicy};
use crate::error::{Error, Result};

/// Per-channel mean and standard deviation of pixel values in [0, 1].
///
/// Computed once over the training split and shared read-only by every
/// transform, train and eval alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl NormalizationStats {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::invalid_config(format!(
                "normalization mean has {} channels but std has {}", mean.len(), std.len()
            )));
        }
        if !matches!(mean.len(), 1 | 3) {
            return Err(Error::invalid_config(format!(
                "normalization needs 1 or 3 channels (got {})", mean.len()
            )));
        }
        if std.iter().any(|&s| !(s > 0.0)) {
            return Err(Error::invalid_config("normalization std must be positive"));
        }
        Ok(NormalizationStats { mean, std })
    }

    /// Same `mean`/`std` for every channel.
    pub fn uniform(channels: usize, mean: f64, std: f64) -> Result<Self> {
        NormalizationStats::new(vec![mean; channels], vec![std; channels])
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// `(value - mean[c]) / std[c]` for a value already scaled to [0, 1].
    #[inline]
    pub fn normalize(&self, channel: usize, value: f64) -> f64 {
        (value - self.mean[channel]) / self.std[channel]
    }

    /// Averages each image's per-channel mean and standard deviation.
    ///
    /// Images go through the same channel policy as the transform, so a
    /// strict policy rejects mismatched files here too.
    pub fn compute(paths: &[PathBuf], channels: usize, policy: ChannelPolicy) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::invalid_config("cannot compute normalization stats over zero images"));
        }

        let per_image: Vec<(Vec<f64>, Vec<f64>)> = paths
            .par_iter()
            .map(|path| image_channel_stats(path, channels, policy))
            .collect::<Result<_>>()?;

        let n = per_image.len() as f64;
        let mut mean = vec![0.0; channels];
        let mut std = vec![0.0; channels];
        for (m, s) in &per_image {
            for c in 0..channels {
                mean[c] += m[c] / n;
                std[c] += s[c] / n;
            }
        }

        for (c, s) in std.iter_mut().enumerate() {
            if *s <= f64::EPSILON {
                warn!(channel = c, "channel has zero variance across the split, using std = 1");
                *s = 1.0;
            }
        }

        info!(?mean, ?std, images = per_image.len(), "computed normalization stats");
        NormalizationStats::new(mean, std)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<NormalizationStats> {
        let file = std::fs::File::open(path)?;
        let stats: NormalizationStats = serde_json::from_reader(std::io::BufReader::new(file))?;
        NormalizationStats::new(stats.mean, stats.std)
    }
}

/// Population mean and std of each channel of one image, in [0, 1] units.
fn image_channel_stats(path: &Path, channels: usize, policy: ChannelPolicy) -> Result<(Vec<f64>, Vec<f64>)> {
    let img = conform_channels(image::open(path)?, channels, policy, path)?;
    let raw = img.as_bytes();
    let pixels = (raw.len() / channels).max(1) as f64;

    let mut sum = vec![0.0; channels];
    let mut sum_sq = vec![0.0; channels];
    for px in raw.chunks_exact(channels) {
        for (c, &v) in px.iter().enumerate() {
            let v = v as f64 / 255.0;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }

    let mean: Vec<f64> = sum.iter().map(|s| s / pixels).collect();
    let std = sum_sq.iter().zip(&mean)
        .map(|(sq, m)| (sq / pixels - m * m).max(0.0).sqrt())
        .collect();
    Ok((mean, std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    #[test]
    fn rejects_bad_channel_counts() {
        assert!(NormalizationStats::new(vec![0.5; 2], vec![0.2; 2]).is_err());
        assert!(NormalizationStats::new(vec![0.5; 3], vec![0.2; 1]).is_err());
        assert!(NormalizationStats::new(vec![0.5], vec![0.0]).is_err());
    }

    #[test]
    fn compute_averages_per_image_statistics() {
        let dir = tempfile::tempdir().unwrap();
        // Half black, half white in the red channel; green constant 51; blue 0.
        let mut img = RgbImage::new(4, 2);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = Rgb([if x < 2 { 0 } else { 255 }, 51, 0]);
        }
        let a = dir.path().join("a.png");
        img.save(&a).unwrap();
        let b = dir.path().join("b.png");
        RgbImage::from_pixel(4, 2, Rgb([255, 51, 0])).save(&b).unwrap();

        let stats = NormalizationStats::compute(&[a, b], 3, ChannelPolicy::Strict).unwrap();
        assert_relative_eq!(stats.mean[0], 0.75, epsilon = 1e-9);
        assert_relative_eq!(stats.mean[1], 0.2, epsilon = 1e-9);
        assert_relative_eq!(stats.std[0], 0.25, epsilon = 1e-9);
        // Zero-variance channels fall back to 1.
        assert_relative_eq!(stats.std[2], 1.0);
    }
}
