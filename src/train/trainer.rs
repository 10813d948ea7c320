use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::checkpoint::{load_into, load_pretrained, Checkpoint};
use crate::config::RunConfig;
use crate::data::dataset::ImageDataset;
use crate::data::index::{read_split, DatasetIndex};
use crate::data::loader::{build_pool, DataLoader};
use crate::data::stats::NormalizationStats;
use crate::data::transform::{ChannelPolicy, ImageTransform, Mode};
use crate::error::{Error, Result};
use crate::metrics::confusion::ConfusionMatrix;
use crate::network::metadata::{InputType, ModelMetadata};
use crate::network::network::Network;
use crate::network::spec::{NetworkSpec, HEAD_NAME};
use crate::optim::param_groups::get_params_groups;
use crate::optim::scheduler::{LrScheduler, WarmupCosine};
use crate::plot::charts::{plot_test_metrics, plot_training_loss, render_confusion_matrix, save_png, TestMetrics};
use crate::train::epoch_stats::{save_history, EpochStats};
use crate::train::loop_fn::{evaluate, train_one_epoch, EvalOutput};

/// The best checkpoint is only considered once this many epochs have passed.
pub const BEST_CHECKPOINT_MIN_EPOCH: usize = 5;

/// Files and numbers produced by a `fit` run.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub history: Vec<EpochStats>,
    pub best_accuracy: Option<f64>,
    pub best_checkpoint: Option<PathBuf>,
    pub last_checkpoint: PathBuf,
    pub loss_plot: PathBuf,
    pub class_names: Vec<String>,
}

fn check_device(device: &str) {
    if device != "cpu" {
        warn!("device {} is not available, falling back to cpu", device);
    }
    info!("using cpu device.");
}

fn check_splits(config: &RunConfig, train: &DatasetIndex, val: &DatasetIndex) -> Result<()> {
    if train.classes.len() != config.num_classes {
        return Err(Error::invalid_config(format!(
            "num_classes is {} but {} has {} class directories",
            config.num_classes, train.split, train.classes.len()
        )));
    }
    if val.classes.names() != train.classes.names() {
        return Err(Error::invalid_config(format!(
            "class directories differ between {} ({:?}) and {} ({:?})",
            train.split, train.classes.names(), val.split, val.classes.names()
        )));
    }
    Ok(())
}

/// Trains a classifier on `<data_path>/train`, validating on `<data_path>/val`.
///
/// Writes into `weights_dir`:
/// - `<model>_best.json` whenever validation accuracy matches or beats the
///   best so far, once past `BEST_CHECKPOINT_MIN_EPOCH`;
/// - `<model>_last.json` after the final epoch;
/// - `<model>_normalization.json`, the training-split statistics.
///
/// and into `results_dir` the loss plot, the epoch history and the effective
/// config.
pub fn fit(config: &RunConfig) -> Result<TrainSummary> {
    config.validate()?;
    check_device(&config.device);
    std::fs::create_dir_all(&config.weights_dir)?;
    std::fs::create_dir_all(&config.results_dir)?;
    let model_name = config.model_config.name();

    // ── Data ───────────────────────────────────────────────────────────────
    let train_index = read_split(&config.data_path, "train")?;
    let val_index = read_split(&config.data_path, "val")?;
    check_splits(config, &train_index, &val_index)?;

    let pool = build_pool(config.num_workers)?;
    let stats = Arc::new(pool.install(|| {
        NormalizationStats::compute(&train_index.paths(), config.channels, config.channel_policy)
    })?);
    stats.save_json(&config.weights_dir.join(format!("{}_normalization.json", model_name)))?;

    let transform = ImageTransform::new(config.image_size, config.strategy, stats.clone())?;
    let train_set = Arc::new(ImageDataset::from_index(&train_index, transform.clone(), Mode::Train, config.channel_policy));
    let val_set = Arc::new(ImageDataset::from_index(&val_index, transform, Mode::Eval, config.channel_policy));
    let train_loader = DataLoader::new(train_set, config.batch_size, true, config.seed, pool.clone())?;
    let val_loader = DataLoader::new(val_set, config.batch_size, false, config.seed, pool)?;

    // ── Model ──────────────────────────────────────────────────────────────
    let input_type = InputType::from_channels(config.channels, config.image_size)?;
    let spec = NetworkSpec::for_model(config.model_config, input_type.input_size(), config.num_classes)?;
    let mut network = spec.build(&mut ChaCha8Rng::seed_from_u64(config.seed));
    info!(model = model_name, input_size = spec.input_size, hidden = ?spec.hidden, "built network");

    if let Some(path) = &config.pretrained {
        if !path.exists() {
            return Err(Error::invalid_config(format!("pretrained file: '{}' not exist.", path.display())));
        }
        load_pretrained(&mut network, path, Some(HEAD_NAME))?;
    }
    if config.freeze_layers {
        for name in network.freeze_except(HEAD_NAME) {
            info!("training {}", name);
        }
    }

    let groups = get_params_groups(&network, config.weight_decay);
    let mut optimizer = config.optimizer.build(&groups);
    let schedule = WarmupCosine::new(train_loader.len(), config.epochs, config.warmup, config.warmup_epochs)?;
    let mut scheduler = LrScheduler::new(config.lr, schedule);

    let metadata_for = |epoch: usize, val_accuracy: f64| ModelMetadata {
        model: config.model_config,
        input_type,
        strategy: config.strategy,
        normalization: (*stats).clone(),
        output_labels: train_index.classes.names().to_vec(),
        epoch,
        val_accuracy: Some(val_accuracy),
    };

    // ── Epochs ─────────────────────────────────────────────────────────────
    let best_path = config.weights_dir.join(format!("{}_best.json", model_name));
    let mut history: Vec<EpochStats> = Vec::with_capacity(config.epochs);
    let mut max_accuracy = 0.0;
    let mut best_accuracy = None;

    for epoch in 0..config.epochs {
        let t_start = Instant::now();
        let train = train_one_epoch(&mut network, optimizer.as_mut(), &train_loader, &mut scheduler, epoch)?;
        let val = evaluate(&network, &val_loader, epoch)?;

        let epoch_stats = EpochStats {
            epoch: epoch + 1,
            total_epochs: config.epochs,
            train_loss: train.loss,
            train_accuracy: train.accuracy,
            val_loss: val.loss,
            val_accuracy: val.accuracy,
            lr: train.lr,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        info!(
            "[epoch {}] train loss: {:.3}, train acc: {:.3}, val loss: {:.3}, accuracy: {:.3}, lr: {:.6}",
            epoch,
            epoch_stats.train_loss,
            epoch_stats.train_accuracy,
            epoch_stats.val_loss,
            epoch_stats.val_accuracy,
            epoch_stats.lr
        );

        if max_accuracy <= val.accuracy && epoch > BEST_CHECKPOINT_MIN_EPOCH {
            Checkpoint::new(&network, Some(metadata_for(epoch + 1, val.accuracy))).save_json(&best_path)?;
            max_accuracy = val.accuracy;
            best_accuracy = Some(val.accuracy);
        }
        history.push(epoch_stats);
    }

    let last_val = history.last().map(|s| s.val_accuracy).unwrap_or(0.0);
    let last_path = config.weights_dir.join(format!("{}_last.json", model_name));
    Checkpoint::new(&network, Some(metadata_for(config.epochs, last_val))).save_json(&last_path)?;

    let train_losses: Vec<f64> = history.iter().map(|s| s.train_loss).collect();
    let val_losses: Vec<f64> = history.iter().map(|s| s.val_loss).collect();
    let loss_plot = plot_training_loss(&train_losses, &val_losses, &config.results_dir, model_name)?;
    save_history(&history, &config.results_dir.join(format!("{}_history.json", model_name)))?;
    config.save_json(&config.output_path())?;

    Ok(TrainSummary {
        history,
        best_accuracy,
        best_checkpoint: best_accuracy.map(|_| best_path),
        last_checkpoint: last_path,
        loss_plot,
        class_names: train_index.classes.names().to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Test
// ---------------------------------------------------------------------------

/// Inputs of `evaluate_checkpoint`.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub checkpoint: PathBuf,
    pub data_path: PathBuf,
    pub split: String,
    pub batch_size: usize,
    pub num_workers: usize,
    pub results_dir: PathBuf,
    pub channel_policy: ChannelPolicy,
}

/// What `evaluate_checkpoint` measured.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub eval: EvalOutput,
    pub metrics: TestMetrics,
}

fn network_from_checkpoint(checkpoint: &Checkpoint, metadata: &ModelMetadata) -> Result<Network> {
    let spec = NetworkSpec::for_model(metadata.model, metadata.input_type.input_size(), metadata.output_labels.len())?;
    let mut network = spec.build(&mut ChaCha8Rng::seed_from_u64(0));
    let report = load_into(&mut network, &checkpoint.state_dict);
    if !report.is_exact() {
        return Err(Error::invalid_config(format!(
            "checkpoint does not match its {} metadata: missing {:?}, unexpected {:?}, mismatched {:?}",
            metadata.model.name(), report.missing_keys, report.unexpected_keys, report.mismatched_keys
        )));
    }
    Ok(network)
}

/// Evaluates a checkpoint written by `fit` on `<data_path>/<split>` and
/// writes the test plots named after the checkpoint's model.
///
/// Two-class models get ROC, PR and a thresholded confusion matrix from the
/// class-1 probability; larger heads get an argmax confusion matrix only.
pub fn evaluate_checkpoint(options: &TestOptions) -> Result<TestReport> {
    let checkpoint = Checkpoint::load_json(&options.checkpoint)?;
    let metadata = checkpoint.metadata.clone().ok_or_else(|| {
        Error::invalid_config(format!(
            "{} has no metadata; test needs a checkpoint written by `train`",
            options.checkpoint.display()
        ))
    })?;
    metadata.validate()?;
    let network = network_from_checkpoint(&checkpoint, &metadata)?;
    std::fs::create_dir_all(&options.results_dir)?;

    let index = read_split(&options.data_path, &options.split)?;
    if index.classes.names() != metadata.output_labels.as_slice() {
        warn!(
            expected = ?metadata.output_labels,
            found = ?index.classes.names(),
            "class directories differ from the ones the model was trained on"
        );
    }

    let stats = Arc::new(NormalizationStats::new(metadata.normalization.mean.clone(), metadata.normalization.std.clone())?);
    let transform = ImageTransform::new(metadata.input_type.size(), metadata.strategy, stats)?;
    let dataset = Arc::new(ImageDataset::from_index(&index, transform, Mode::Eval, options.channel_policy));
    let loader = DataLoader::new(dataset, options.batch_size, false, 0, build_pool(options.num_workers)?)?;

    let eval = evaluate(&network, &loader, 0)?;
    info!(split = %options.split, loss = eval.loss, accuracy = eval.accuracy, "evaluated checkpoint");

    let model_name = metadata.model.name();
    let metrics = if metadata.output_labels.len() == 2 {
        plot_test_metrics(&eval.labels, &eval.class_scores(1), &options.results_dir, model_name)?
    } else {
        let confusion = ConfusionMatrix::from_predictions(&eval.predictions(), &eval.labels, metadata.output_labels.len());
        save_png(
            &render_confusion_matrix(
                &confusion,
                0.5,
                &format!("{} Confusion Matrix", model_name),
                &metadata.output_labels,
            ),
            &options.results_dir.join(format!("{}_Confusion_Matrix.png", model_name)),
        )?;
        TestMetrics { auroc: None, auprc: None, confusion }
    };
    Ok(TestReport { eval, metrics })
}
