//! Command-line entry point: `ferrite-cls train` and `ferrite-cls test`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ferrite_cls::optim::OptimizerKind;
use ferrite_cls::train::TestOptions;
use ferrite_cls::{evaluate_checkpoint, fit, ChannelPolicy, Error, ModelKind, ResizeStrategy, Result, RunConfig};

/// Image-classification training and evaluation
#[derive(Parser, Debug)]
#[command(name = "ferrite-cls", version, about = "Train and evaluate image classifiers with letterbox augmentation")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on <data-path>/train, validate on <data-path>/val
    Train(TrainArgs),
    /// Evaluate a checkpoint on one split and write the metric plots
    Test(TestArgs),
}

/// Every flag overrides the matching field of `--config` (or the defaults).
#[derive(Args, Debug)]
struct TrainArgs {
    /// Base configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    num_classes: Option<usize>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    num_workers: Option<usize>,

    #[arg(long)]
    lr: Option<f64>,

    #[arg(long)]
    weight_decay: Option<f64>,

    #[arg(long, value_name = "DIR")]
    data_path: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    weights_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    model_config: Option<ModelKind>,

    /// Initial weights path
    #[arg(long, value_name = "FILE")]
    pretrained: Option<PathBuf>,

    /// Train only the classifier head
    #[arg(long)]
    freeze_layers: bool,

    /// Device id; only cpu is available
    #[arg(long)]
    device: Option<String>,

    /// Disable the learning-rate warmup
    #[arg(long)]
    no_warmup: bool,

    #[arg(long)]
    warmup_epochs: Option<usize>,

    /// Side of the square network input
    #[arg(long)]
    image_size: Option<u32>,

    /// 1 (grayscale) or 3 (RGB)
    #[arg(long)]
    channels: Option<usize>,

    #[arg(long, value_enum)]
    strategy: Option<ResizeStrategy>,

    #[arg(long, value_enum)]
    channel_policy: Option<ChannelPolicy>,

    #[arg(long, value_enum)]
    optimizer: Option<OptimizerKind>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Checkpoint written by `train`
    #[arg(long, value_name = "FILE")]
    checkpoint: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "dataset/Task3clsAug")]
    data_path: PathBuf,

    #[arg(long, default_value = "test")]
    split: String,

    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    #[arg(long, default_value_t = 8)]
    num_workers: usize,

    #[arg(long, value_name = "DIR", default_value = "results")]
    results_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ChannelPolicy::Strict)]
    channel_policy: ChannelPolicy,
}

impl TrainArgs {
    /// Layers the flags over the base config.
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load_json(path)?,
            None => RunConfig::default(),
        };

        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        set!(
            num_classes, epochs, batch_size, num_workers, lr, weight_decay,
            data_path, weights_dir, results_dir, model_config, device,
            warmup_epochs, image_size, channels, strategy, channel_policy,
            optimizer, seed,
        );
        if self.pretrained.is_some() {
            cfg.pretrained = self.pretrained;
        }
        if self.freeze_layers {
            cfg.freeze_layers = true;
        }
        if self.no_warmup {
            cfg.warmup = false;
        }
        Ok(cfg)
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| Error::invalid_config(format!("failed to initialize logger: {e}")))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train(args) => {
            let config = args.into_config()?;
            let summary = fit(&config)?;
            match (summary.best_accuracy, &summary.best_checkpoint) {
                (Some(acc), Some(path)) => info!("best accuracy {:.3} saved to {}", acc, path.display()),
                _ => info!("no epoch qualified for a best checkpoint"),
            }
            info!("last weights saved to {}", summary.last_checkpoint.display());
        }
        Command::Test(args) => {
            let report = evaluate_checkpoint(&TestOptions {
                checkpoint: args.checkpoint,
                data_path: args.data_path,
                split: args.split,
                batch_size: args.batch_size,
                num_workers: args.num_workers,
                results_dir: args.results_dir,
                channel_policy: args.channel_policy,
            })?;
            info!(
                accuracy = report.eval.accuracy,
                auroc = ?report.metrics.auroc,
                auprc = ?report.metrics.auprc,
                "test finished"
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from([
            "ferrite-cls", "train", "--epochs", "12", "--strategy", "center-crop",
            "--model-config", "mlp-tiny", "--freeze-layers", "--no-warmup",
        ]);
        let Command::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.epochs, 12);
        assert_eq!(cfg.strategy, ResizeStrategy::CenterCrop);
        assert_eq!(cfg.model_config, ModelKind::MlpTiny);
        assert!(cfg.freeze_layers);
        assert!(!cfg.warmup);
        assert_eq!(cfg.batch_size, 16);
    }

    #[test]
    fn test_subcommand_defaults() {
        let cli = Cli::parse_from(["ferrite-cls", "-v", "test", "--checkpoint", "w.json"]);
        assert!(cli.verbose);
        let Command::Test(args) = cli.command else { panic!("expected test") };
        assert_eq!(args.split, "test");
        assert_eq!(args.channel_policy, ChannelPolicy::Strict);
    }
}
