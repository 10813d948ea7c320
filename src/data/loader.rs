//! Shuffled mini-batches with per-sample transforms run on a worker pool.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::data::dataset::ImageDataset;
use crate::error::{Error, Result};

/// Builds the worker pool shared by the loaders and the gradient pass.
///
/// `num_workers == 0` lets rayon pick one thread per core.
pub fn build_pool(num_workers: usize) -> Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("ferrite-worker-{i}"))
        .build()?;
    debug!(threads = pool.current_num_threads(), "worker pool ready");
    Ok(Arc::new(pool))
}

/// Mixes `(seed, epoch, stream)` into one well-spread 64-bit seed (splitmix64).
pub fn derive_seed(seed: u64, epoch: u64, stream: u64) -> u64 {
    fn splitmix(mut z: u64) -> u64 {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
    splitmix(splitmix(splitmix(seed) ^ epoch) ^ stream)
}

/// One mini-batch of flattened inputs.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Dataset indices the batch was drawn from.
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Iterates a dataset in mini-batches.
///
/// Every sample gets its own `ChaCha8Rng` seeded from `(seed, epoch, index)`,
/// so a batch is identical no matter how many workers produced it.
#[derive(Clone)]
pub struct DataLoader {
    dataset: Arc<ImageDataset>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    pool: Arc<ThreadPool>,
}

impl DataLoader {
    pub fn new(dataset: Arc<ImageDataset>, batch_size: usize, shuffle: bool, seed: u64, pool: Arc<ThreadPool>) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid_config("batch size must be at least 1"));
        }
        Ok(DataLoader { dataset, batch_size, shuffle, seed, pool })
    }

    pub fn dataset(&self) -> &ImageDataset {
        &self.dataset
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Number of batches per epoch (the last one may be short).
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Sample order for `epoch`: a seeded permutation, or `0..n` without shuffling.
    pub fn order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(self.seed, epoch as u64, u64::MAX));
            order.shuffle(&mut rng);
        }
        order
    }

    pub fn batches(&self, epoch: usize) -> Batches<'_> {
        Batches { loader: self, order: self.order(epoch), epoch, cursor: 0 }
    }

    fn load_batch(&self, indices: &[usize], epoch: usize) -> Result<Batch> {
        let loaded: Vec<(Vec<f64>, usize)> = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&idx| {
                    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(self.seed, epoch as u64, idx as u64));
                    let (tensor, label) = self.dataset.get(idx, &mut rng)?;
                    Ok((tensor.into_vec(), label))
                })
                .collect::<Result<_>>()
        })?;

        let (inputs, labels) = loaded.into_iter().unzip();
        Ok(Batch { inputs, labels, indices: indices.to_vec() })
    }
}

/// Iterator returned by [`DataLoader::batches`].
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    epoch: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;
        Some(self.loader.load_batch(indices, self.epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    use crate::data::index::Sample;
    use crate::data::stats::NormalizationStats;
    use crate::data::transform::{ChannelPolicy, ImageTransform, Mode, ResizeStrategy};

    fn dataset(dir: &std::path::Path, n: usize, mode: Mode) -> Arc<ImageDataset> {
        let samples = (0..n)
            .map(|i| {
                let path = dir.join(format!("{i}.png"));
                RgbImage::from_pixel(10 + i as u32, 6, Rgb([i as u8 * 20, 0, 0])).save(&path).unwrap();
                Sample { path, label: i % 2 }
            })
            .collect();
        let stats = Arc::new(NormalizationStats::uniform(3, 0.5, 0.5).unwrap());
        let transform = ImageTransform::new(8, ResizeStrategy::Letterbox, stats).unwrap();
        Arc::new(ImageDataset::new(samples, transform, mode, ChannelPolicy::Strict))
    }

    #[test]
    fn batches_cover_every_sample_once() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DataLoader::new(dataset(dir.path(), 5, Mode::Eval), 2, true, 7, build_pool(2).unwrap()).unwrap();
        assert_eq!(loader.len(), 3);

        let batches: Vec<Batch> = loader.batches(0).collect::<Result<_>>().unwrap();
        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        let mut seen: Vec<usize> = batches.iter().flat_map(|b| b.indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(batches.iter().all(|b| b.inputs.iter().all(|x| x.len() == 3 * 8 * 8)));
    }

    #[test]
    fn training_batches_do_not_depend_on_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset(dir.path(), 4, Mode::Train);
        let one = DataLoader::new(ds.clone(), 4, true, 3, build_pool(1).unwrap()).unwrap();
        let four = DataLoader::new(ds, 4, true, 3, build_pool(4).unwrap()).unwrap();

        let a = one.batches(2).next().unwrap().unwrap();
        let b = four.batches(2).next().unwrap().unwrap();
        assert_eq!(a.indices, b.indices);
        assert_eq!(a.inputs, b.inputs);
    }

    #[test]
    fn unshuffled_order_is_sequential_and_seeds_differ_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DataLoader::new(dataset(dir.path(), 3, Mode::Eval), 8, false, 0, build_pool(1).unwrap()).unwrap();
        assert_eq!(loader.order(5), vec![0, 1, 2]);
        assert_ne!(derive_seed(1, 0, 0), derive_seed(1, 1, 0));
        assert_ne!(derive_seed(1, 0, 0), derive_seed(1, 0, 1));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DataLoader::new(dataset(dir.path(), 1, Mode::Eval), 0, false, 0, build_pool(1).unwrap()).is_err());
    }
}
