pub mod augment;
pub mod class_index;
pub mod dataset;
pub mod index;
pub mod letterbox;
pub mod loader;
pub mod stats;
pub mod tensor;
pub mod transform;

pub use augment::AugmentPolicy;
pub use class_index::{ClassIndex, CLASS_INDICES_FILE};
pub use dataset::ImageDataset;
pub use index::{read_split, DatasetIndex, Sample, SUPPORTED_EXTENSIONS};
pub use letterbox::LetterboxGeometry;
pub use loader::{build_pool, Batch, DataLoader};
pub use stats::NormalizationStats;
pub use tensor::ImageTensor;
pub use transform::{conform_channels, ChannelPolicy, ImageTransform, Mode, ResizeStrategy};
