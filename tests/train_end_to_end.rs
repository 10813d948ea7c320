use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use ferrite_cls::checkpoint::Checkpoint;
use ferrite_cls::train::epoch_stats::load_history;
use ferrite_cls::train::TestOptions;
use ferrite_cls::{evaluate_checkpoint, fit, ChannelPolicy, ModelKind, NormalizationStats, RunConfig};

/// Dark reddish "cat" images and bright bluish "dog" images of varying shape.
fn write_dataset(root: &Path) {
    for split in ["train", "val"] {
        for (class, base) in [("cat", [160u8, 30, 30]), ("dog", [30u8, 60, 200])] {
            let dir = root.join(split).join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..4u32 {
                let (w, h) = (12 + i * 3, 10 + i * 2);
                let mut img = RgbImage::new(w, h);
                for (x, y, p) in img.enumerate_pixels_mut() {
                    let jitter = ((x + y + i) % 5) as u8 * 4;
                    *p = Rgb([base[0] + jitter, base[1] + jitter, base[2] + jitter]);
                }
                img.save(dir.join(format!("{i}.png"))).unwrap();
            }
        }
    }
}

fn config(root: &Path, out: &Path) -> RunConfig {
    RunConfig {
        epochs: 8,
        batch_size: 4,
        num_workers: 2,
        lr: 1e-2,
        data_path: root.to_path_buf(),
        weights_dir: out.join("weights"),
        results_dir: out.join("results"),
        model_config: ModelKind::MlpTiny,
        warmup_epochs: 1,
        image_size: 8,
        seed: 17,
        ..RunConfig::default()
    }
}

fn file(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

#[test]
fn fit_writes_checkpoints_plots_and_history() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_dataset(data.path());
    let cfg = config(data.path(), out.path());

    let summary = fit(&cfg).unwrap();
    assert_eq!(summary.history.len(), 8);
    assert_eq!(summary.class_names, vec!["cat".to_string(), "dog".to_string()]);
    assert!(summary.history.iter().all(|s| s.train_loss.is_finite() && s.val_loss.is_finite()));
    // Epochs 0..=5 never qualify, so the best checkpoint comes from epoch 7 or 8.
    assert!(summary.best_checkpoint.as_ref().unwrap().is_file());
    assert!(summary.last_checkpoint.is_file());

    let weights = out.path().join("weights");
    let results = out.path().join("results");
    assert!(file(&weights, "mlp-tiny_best.json").is_file());
    assert!(file(&weights, "mlp-tiny_last.json").is_file());
    assert!(file(&weights, "mlp-tiny_normalization.json").is_file());
    assert!(file(&results, "mlp-tiny_train_loss.png").is_file());
    assert!(file(&results, "mlp-tiny_config.json").is_file());
    assert!(data.path().join("class_indices.json").is_file());

    let history = load_history(&file(&results, "mlp-tiny_history.json")).unwrap();
    assert_eq!(history, summary.history);
    assert_eq!(history[0].epoch, 1);

    let last = Checkpoint::load_json(&summary.last_checkpoint).unwrap();
    let meta = last.metadata.unwrap();
    assert_eq!(meta.model, ModelKind::MlpTiny);
    assert_eq!(meta.output_labels, vec!["cat".to_string(), "dog".to_string()]);
    assert_eq!(meta.input_type.input_size(), 3 * 8 * 8);

    let report = evaluate_checkpoint(&TestOptions {
        checkpoint: summary.last_checkpoint.clone(),
        data_path: data.path().to_path_buf(),
        split: "val".into(),
        batch_size: 3,
        num_workers: 1,
        results_dir: results.clone(),
        channel_policy: ChannelPolicy::Strict,
    })
    .unwrap();
    assert_eq!(report.eval.labels.len(), 8);
    assert!(report.metrics.auroc.is_some());
    assert_eq!(report.metrics.confusion.total(), 8);
    for name in ["mlp-tiny_AUROC.png", "mlp-tiny_AUPRC.png", "mlp-tiny_Confusion_Matrix.png"] {
        assert!(file(&results, name).is_file(), "{name} missing");
    }
}

#[test]
fn same_seed_trains_identically() {
    let data = tempfile::tempdir().unwrap();
    write_dataset(data.path());
    let a_out = tempfile::tempdir().unwrap();
    let b_out = tempfile::tempdir().unwrap();

    let a = fit(&RunConfig { epochs: 3, ..config(data.path(), a_out.path()) }).unwrap();
    let b = fit(&RunConfig { epochs: 3, num_workers: 3, ..config(data.path(), b_out.path()) }).unwrap();
    let losses = |s: &ferrite_cls::train::TrainSummary| s.history.iter().map(|e| e.train_loss).collect::<Vec<_>>();
    assert_eq!(losses(&a), losses(&b));
}

#[test]
fn frozen_fine_tuning_keeps_pretrained_backbone() {
    let data = tempfile::tempdir().unwrap();
    write_dataset(data.path());
    let first_out = tempfile::tempdir().unwrap();
    let first = fit(&RunConfig { epochs: 2, warmup: false, ..config(data.path(), first_out.path()) }).unwrap();

    let second_out = tempfile::tempdir().unwrap();
    let second = fit(&RunConfig {
        epochs: 2,
        warmup: false,
        seed: 99,
        pretrained: Some(first.last_checkpoint.clone()),
        freeze_layers: true,
        ..config(data.path(), second_out.path())
    })
    .unwrap();

    let before = Checkpoint::load_json(&first.last_checkpoint).unwrap().state_dict;
    let after = Checkpoint::load_json(&second.last_checkpoint).unwrap().state_dict;
    assert_eq!(before["layers.0.weight"], after["layers.0.weight"]);
    assert_eq!(before["layers.0.bias"], after["layers.0.bias"]);
    assert_ne!(before["head.weight"], after["head.weight"]);
}

#[test]
fn checkpoint_with_inconsistent_metadata_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_dataset(data.path());
    let summary = fit(&RunConfig { epochs: 1, warmup: false, ..config(data.path(), out.path()) }).unwrap();

    let mut checkpoint = Checkpoint::load_json(&summary.last_checkpoint).unwrap();
    if let Some(meta) = checkpoint.metadata.as_mut() {
        meta.normalization = NormalizationStats::uniform(1, 0.5, 0.5).unwrap();
    }
    let edited = out.path().join("edited.json");
    checkpoint.save_json(&edited).unwrap();

    let err = evaluate_checkpoint(&TestOptions {
        checkpoint: edited,
        data_path: data.path().to_path_buf(),
        split: "val".into(),
        batch_size: 4,
        num_workers: 1,
        results_dir: out.path().join("results"),
        channel_policy: ChannelPolicy::Strict,
    })
    .unwrap_err();
    assert!(matches!(err, ferrite_cls::Error::InvalidConfig(_)), "{err}");
}

#[test]
fn missing_split_aborts_before_training() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(data.path().join("train/cat")).unwrap();
    let err = fit(&config(data.path(), out.path())).unwrap_err();
    assert!(matches!(err, ferrite_cls::Error::EmptyDataset { .. } | ferrite_cls::Error::SplitNotFound { .. }));
}
