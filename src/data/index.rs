//! Dataset index builder for `root/<split>/<class>/<image>` trees.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::data::class_index::{ClassIndex, CLASS_INDICES_FILE};
use crate::error::{Error, Result};

/// Extensions accepted by the scanner. Matching is exact (case-sensitive).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".jpg", ".JPG", ".png", ".PNG"];

/// One image on disk and its class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: usize,
}

/// Everything `read_split` learns about one split.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    pub split: String,
    pub classes: ClassIndex,
    pub samples: Vec<Sample>,
    /// Number of images per class, in class-id order.
    pub per_class_counts: Vec<usize>,
}

impl DatasetIndex {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.samples.iter().map(|s| s.path.clone()).collect()
    }
}

fn is_supported(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| SUPPORTED_EXTENSIONS.iter().any(|ext| {
            name.len() > ext.len() && name.ends_with(ext)
        }))
        .unwrap_or(false)
}

/// Direct children of `dir`, sorted by file name. Any read error is fatal.
fn sorted_entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn class_name(entry: &walkdir::DirEntry) -> Result<String> {
    entry.file_name().to_str().map(str::to_string).ok_or_else(|| {
        Error::invalid_config(format!(
            "class directory name is not valid UTF-8: {}",
            entry.path().display()
        ))
    })
}

/// Scans `root/<split>`, assigns class ids in sorted directory order and
/// writes the id → name map to `root/class_indices.json`.
///
/// Fails with `SplitNotFound` when the split directory is missing, with
/// `Walk` when a directory cannot be read, with `InvalidConfig` for a class
/// directory whose name is not UTF-8 and with `EmptyDataset` when no file
/// with a supported extension is found.
pub fn read_split(root: &Path, split: &str) -> Result<DatasetIndex> {
    let split_dir = root.join(split);
    if !split_dir.is_dir() {
        return Err(Error::SplitNotFound { split: split.to_string(), path: split_dir });
    }

    let class_names: Vec<String> = sorted_entries(&split_dir)?
        .iter()
        .filter(|e| e.file_type().is_dir())
        .map(class_name)
        .collect::<Result<_>>()?;
    let classes = ClassIndex::from_names(class_names);
    classes.save_json(&root.join(CLASS_INDICES_FILE))?;

    let mut samples = Vec::new();
    let mut per_class_counts = Vec::with_capacity(classes.len());
    for (label, name) in classes.names().iter().enumerate() {
        let before = samples.len();
        samples.extend(
            sorted_entries(&split_dir.join(name))?
                .into_iter()
                .filter(|e| e.file_type().is_file() && is_supported(e.path()))
                .map(|e| Sample { path: e.into_path(), label }),
        );
        let count = samples.len() - before;
        debug!(class = %name, label, count, "scanned class directory");
        per_class_counts.push(count);
    }

    info!("{} images were found in the dataset.", per_class_counts.iter().sum::<usize>());
    info!("{} images for {}.", samples.len(), split);

    if samples.is_empty() {
        return Err(Error::EmptyDataset { split: split.to_string(), path: split_dir });
    }

    Ok(DatasetIndex { split: split.to_string(), classes, samples, per_class_counts })
}
