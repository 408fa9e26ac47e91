use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cluster_lens::clients::{ArticleSource, JsonFileSource};
use cluster_lens::clusters::{aggregate, coverage, parse_annotations_with_report, ranked_categories};
use cluster_lens::config::Config;
use cluster_lens::reports::{JsonDirReportStore, ReportStore, SavedReport};

/// Cluster Lens - thought-cluster annotation and aggregation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse annotated text (file or stdin) and print spans, summary and coverage
    Parse {
        /// Annotated text file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Character length of the original source text
        #[arg(long)]
        source_len: Option<usize>,
    },
    /// Analyse a JSON file of articles
    Analyze {
        /// JSON array of articles or a search response with an `articles` field
        #[arg(short, long)]
        articles: PathBuf,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Rewrite a topic into a query, then analyse the retrieved articles
    Topic {
        topic: String,
        #[arg(short, long)]
        articles: PathBuf,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Manage saved reports
    Reports {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(clap::Args, Debug)]
struct SaveArgs {
    /// Save the result as a report with this name
    #[arg(long)]
    save: Option<String>,
    #[arg(long, requires = "save")]
    description: Option<String>,
    /// Comma-separated report tags
    #[arg(long, requires = "save", value_delimiter = ',')]
    tags: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum ReportAction {
    List,
    Show { id: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // stdout carries JSON; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.runtime.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = JsonDirReportStore::new(&config.runtime.reports_dir);

    match cli.command {
        Command::Parse { file, source_len } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let (spans, report) = parse_annotations_with_report(&raw);
            let summary = aggregate(&spans);
            let stats = coverage(&spans, source_len);
            print_json(&json!({
                "spans": spans,
                "clusterSummary": summary,
                "rankedCategories": ranked_categories(&summary, &[]),
                "coverage": stats,
                "parseReport": report,
            }))?;
        }
        Command::Analyze { articles, save } => {
            let pipeline = cluster_lens::build_pipeline(&config)?;
            let source = JsonFileSource::new(articles);
            let fetched = source
                .fetch("", usize::MAX)
                .await
                .context("Failed to load articles")?;
            let report = pipeline.run(&fetched).await;
            let stats = report.analysis.coverage(&fetched);
            info!(
                "Overall coverage {:.1}% across {} articles",
                stats.coverage_percentage, report.analysis.total_articles_analyzed
            );
            if let Some(name) = &save.save {
                let saved = SavedReport::new(name, report.analysis.clone())?;
                save_report(&store, saved, &save).await?;
            }
            print_json(&report.analysis)?;
        }
        Command::Topic {
            topic,
            articles,
            save,
        } => {
            let pipeline = cluster_lens::build_pipeline(&config)?;
            let source = JsonFileSource::new(articles);
            let result = pipeline
                .analyze_topic(&topic, &source)
                .await
                .map_err(|e| {
                    if e.is_run_level() {
                        anyhow::anyhow!("Topic run aborted before analysis: {}", e)
                    } else {
                        e.into()
                    }
                })?;
            if let Some(name) = &save.save {
                let saved = SavedReport::from_topic(name, result.clone())?;
                save_report(&store, saved, &save).await?;
            }
            print_json(&result)?;
        }
        Command::Reports { action } => match action {
            ReportAction::List => {
                let listing: Vec<_> = store
                    .list()
                    .await?
                    .into_iter()
                    .map(|r| {
                        json!({
                            "id": r.id,
                            "name": r.name,
                            "createdAt": r.created_at,
                            "originalTopic": r.original_topic,
                            "totalArticlesAnalyzed": r.thought_cluster_analysis.total_articles_analyzed,
                            "tags": r.tags,
                        })
                    })
                    .collect();
                print_json(&listing)?;
            }
            ReportAction::Show { id } => match store.load(&id).await? {
                Some(report) => print_json(&report)?,
                None => anyhow::bail!("No report with id {}", id),
            },
            ReportAction::Delete { id } => {
                if !store.delete(&id).await? {
                    anyhow::bail!("No report with id {}", id);
                }
                info!("Deleted report {}", id);
            }
        },
    }

    Ok(())
}

async fn save_report(store: &dyn ReportStore, report: SavedReport, args: &SaveArgs) -> Result<()> {
    let report = report
        .with_description(args.description.as_deref().unwrap_or_default())
        .with_tags(&args.tags);
    store.save(&report).await?;
    info!("Saved report {:?} as {}", report.name, report.id);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
