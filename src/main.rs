use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tickcast::application::ml::trainer::ForecastService;
use tickcast::application::pipeline::MarketPipeline;
use tickcast::config::Config;
use tickcast::domain::ml::dataset::build_range_dataset;
use tickcast::domain::ml::feature_registry::RANGE_FEATURES;
use tickcast::domain::ml::labels::{build_future_ranges, label_names};
use tickcast::domain::ml::model::ModelKind;
use tickcast::infrastructure::export::candle_csv::write_candles;
use tickcast::infrastructure::persistence::market_files::{MarketFileStore, find_data_dir};
use tickcast::infrastructure::persistence::model_store::ModelStore;
use tracing::info;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Tick-trade candles and next-candle forecasting",
    long_about = None
)]
struct Cli {
    /// TOML file overriding built-in defaults (environment variables still win)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the <SYMBOL>/<day>/<file>.json tree
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Where models and scalers are written
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a next-candle model for a symbol
    Train {
        symbol: String,

        #[arg(long)]
        lookback: Option<usize>,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// lstm or forest
        #[arg(long)]
        model: Option<ModelKind>,
    },
    /// Predict the next candle's open and close
    Predict {
        symbol: String,

        /// Must match the lookback the model was trained with
        #[arg(long)]
        lookback: Option<usize>,
    },
    /// Export candles with future-range labels as CSV
    Candles {
        symbol: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        n_future: Option<usize>,
    },
    /// Build the future-range dataset and report its shape
    Dataset {
        symbol: String,

        #[arg(long)]
        lookback: Option<usize>,

        #[arg(long)]
        n_future: Option<usize>,
    },
}

impl Cli {
    /// Directory flags win over file and environment settings
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.data.data_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.model_dir {
            config.model.model_dir = dir.clone();
        }
    }
}

/// Market directories and artifacts use upper-case symbols
fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Commands::Train {
            symbol,
            lookback,
            epochs,
            batch_size,
            model,
        } => {
            let model_config = &mut config.model;
            model_config.lookback = lookback.unwrap_or(model_config.lookback);
            model_config.epochs = epochs.unwrap_or(model_config.epochs);
            model_config.batch_size = batch_size.unwrap_or(model_config.batch_size);
            model_config.kind = model.unwrap_or(model_config.kind);
            model_config.validate()?;

            let symbol = normalize_symbol(&symbol);
            let service = forecast_service(&config)?;
            let report = service.train(&symbol, &config.model.training_settings())?;

            info!(
                "Trained {} {} model on {} windows ({} train / {} val)",
                report.symbol, report.kind, report.samples, report.train_samples, report.val_samples
            );
            if let Some(stats) = report.final_stats() {
                info!(
                    "Final epoch {}: loss={:.6} val_loss={:?} val_mae={:?}",
                    stats.epoch, stats.train_loss, stats.val_loss, stats.val_mae
                );
            }
            info!("Saved model to: {}", report.weights_path.display());
        }
        Commands::Predict { symbol, lookback } => {
            let symbol = normalize_symbol(&symbol);
            // A missing model is reported before the data tree is searched
            ModelStore::new(config.model.model_dir.clone()).load_metadata(&symbol)?;
            let forecast = forecast_service(&config)?.predict(&symbol, lookback)?;
            println!(
                "Predicted next open: {:.6}   next close: {:.6}",
                forecast.open, forecast.close
            );
        }
        Commands::Candles {
            symbol,
            output,
            n_future,
        } => {
            let n_future = n_future.unwrap_or(config.model.n_future);
            let symbol = normalize_symbol(&symbol);
            let series = market_pipeline(&config)?.load(&symbol)?;
            let labels = build_future_ranges(&series.candles, n_future);

            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_candles(
                        BufWriter::new(file),
                        &series.candles,
                        Some((&labels, n_future)),
                    )?;
                    info!("Wrote {} candles to {}", series.len(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    write_candles(&mut handle, &series.candles, Some((&labels, n_future)))?;
                    handle.flush()?;
                }
            }
        }
        Commands::Dataset {
            symbol,
            lookback,
            n_future,
        } => {
            let lookback = lookback.unwrap_or(config.model.lookback);
            let n_future = n_future.unwrap_or(config.model.n_future);
            let symbol = normalize_symbol(&symbol);
            let series = market_pipeline(&config)?.load(&symbol)?;
            let labels = build_future_ranges(&series.candles, n_future);
            let dataset =
                build_range_dataset(&series.candles, &labels, lookback, n_future, RANGE_FEATURES);

            let ((samples, steps, features), (_, targets)) = dataset.shape();
            println!("X shape: ({}, {}, {})", samples, steps, features);
            println!("y shape: ({}, {})", samples, targets);
            println!(
                "Features: {}",
                RANGE_FEATURES
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("Labels: {}", label_names(n_future).join(", "));
        }
    }

    Ok(())
}

fn resolve_data_dir(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.data.data_dir {
        return Ok(dir.clone());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let dir = find_data_dir(&cwd, config.data.search_depth)?;
    info!("Using data directory {}", dir.display());
    Ok(dir)
}

fn market_pipeline(config: &Config) -> Result<MarketPipeline> {
    let data_dir = resolve_data_dir(config)?;
    Ok(MarketPipeline::new(
        MarketFileStore::new(data_dir),
        config.data.candle_interval,
    ))
}

fn forecast_service(config: &Config) -> Result<ForecastService> {
    Ok(ForecastService::new(
        market_pipeline(config)?,
        ModelStore::new(config.model.model_dir.clone()),
    ))
}
