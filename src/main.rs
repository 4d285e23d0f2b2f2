//! coinmood CLI: crypto market sentiment from news.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};

use coinmood::analyzer::{self, AnalysisRequest, SentimentAnalyzer};
use coinmood::config::MoodConfig;
use coinmood::news::{NewsApiClient, NewsSource, StaticNewsSource};
use coinmood::paths::MoodPaths;
use coinmood::rollup::category;
use coinmood::trainer::TrainingSet;

#[derive(Parser)]
#[command(name = "coinmood", version, about = "Crypto market sentiment from news")]
struct Cli {
    /// Keep config, lexicons, weights and cache under this directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (TOML). Defaults to the one under the config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default config, lexicons, credibility table and weights.
    Init,

    /// Analyze market sentiment and print the report as JSON.
    Analyze {
        /// Search keywords (comma-separated). Defaults to the configured keywords.
        #[arg(long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        /// Look-back window in days.
        #[arg(long, default_value_t = analyzer::DEFAULT_DAYS)]
        days: u32,

        /// Ignore the cache and recompute.
        #[arg(long)]
        refresh: bool,

        /// Entity id or alias to report on in detail.
        #[arg(long)]
        focus: Option<String>,

        /// Read articles from a JSON file instead of NewsAPI.
        #[arg(long)]
        articles: Option<PathBuf>,
    },

    /// Inspect or change ensemble signal weights.
    Weights {
        #[command(subcommand)]
        action: WeightsAction,
    },

    /// Learn ensemble weights from a JSON training set.
    Train {
        /// File with {"observations": [{signal: score}], "outcomes": [..]}.
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the category label for a compound score.
    Category {
        /// Score in [-1, 1].
        #[arg(allow_hyphen_values = true)]
        score: f64,
    },
}

#[derive(Subcommand)]
enum WeightsAction {
    /// Show the current weight table.
    Show,

    /// Merge new weights, e.g. `lexicon=0.5,ProsusAI/finbert=0.5`.
    Set {
        weights: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ureq=warn")),
        )
        .init();

    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => MoodPaths::with_root(dir),
        None => MoodPaths::resolve()?,
    };
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = MoodConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Init => {
            analyzer::init_files(&paths, &config)?;
            println!("Initialized coinmood at {}", paths.data_dir.display());
        }

        Commands::Analyze {
            keywords,
            days,
            refresh,
            focus,
            articles,
        } => {
            let news = news_source(articles.as_deref())?;
            let analyzer = SentimentAnalyzer::open(&paths, config, news)?;
            let report = analyzer.analyze(&AnalysisRequest {
                keywords,
                days,
                refresh,
                focus,
            });
            print_json(&report)?;
        }

        Commands::Weights { action } => {
            let analyzer = SentimentAnalyzer::open(&paths, config, offline())?;
            match action {
                WeightsAction::Show => print_json(&analyzer.combiner().weights())?,
                WeightsAction::Set { weights } => {
                    analyzer.update_weights(&parse_weights(&weights)?)?;
                    print_json(&analyzer.combiner().weights())?;
                }
            }
        }

        Commands::Train { file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let set: TrainingSet = serde_json::from_str(&content).into_diagnostic()?;
            let analyzer = SentimentAnalyzer::open(&paths, config, offline())?;
            let importances = analyzer.train(&set)?;
            println!("importances:");
            for (id, value) in &importances {
                println!("  {id}: {value:.4}");
            }
            print_json(&analyzer.combiner().weights())?;
        }

        Commands::Category { score } => {
            println!("{}", category(score));
        }
    }

    Ok(())
}

/// Articles from a file when given, otherwise NewsAPI.
///
/// A missing API key is not fatal: the analysis runs on an empty corpus.
fn news_source(articles: Option<&Path>) -> Result<Box<dyn NewsSource>> {
    if let Some(path) = articles {
        return Ok(Box::new(StaticNewsSource::from_file(path)?));
    }
    match NewsApiClient::from_env() {
        Ok(client) => Ok(Box::new(client)),
        Err(e) => {
            tracing::error!(error = %e, "news retrieval unavailable");
            Ok(offline())
        }
    }
}

fn offline() -> Box<dyn NewsSource> {
    Box::new(StaticNewsSource::new(Vec::new()))
}

/// Parse `id=weight` pairs separated by commas.
fn parse_weights(raw: &str) -> Result<BTreeMap<String, f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (id, weight) = pair
                .split_once('=')
                .ok_or_else(|| miette!("expected id=weight, got \"{pair}\""))?;
            let weight: f64 = weight
                .trim()
                .parse()
                .map_err(|_| miette!("invalid weight \"{weight}\" for signal \"{id}\""))?;
            Ok((id.trim().to_string(), weight))
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}
