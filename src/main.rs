//! CLI interface for the forest index

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forest_index::vector::{parse_components, parse_record};
use forest_index::{
    AnnoyIndex, BuildOptions, IdentifiedVector, IdentifierCodec, Metric, Neighbor, StringCodec,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forest-index")]
#[command(about = "Build and query approximate nearest neighbor indexes", long_about = None)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    Angular,
    Euclidean,
    Manhattan,
    Hamming,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Angular => Metric::Angular,
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::Manhattan => Metric::Manhattan,
            MetricArg::Hamming => Metric::Hamming,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a text file of `<id> <f1> <f2> ...` lines
    Build {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Number of trees
        #[arg(short, long, default_value = "10")]
        trees: usize,
        /// Distance metric
        #[arg(short, long, value_enum, default_value = "angular")]
        metric: MetricArg,
        /// Seed for tree construction
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Query an index by identifier or by vector
    Query {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        /// Identifier to query from
        #[arg(long, conflicts_with = "vector", required_unless_present = "vector")]
        id: Option<String>,
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(long)]
        vector: Option<String>,
        /// Number of results to return
        #[arg(short, long, default_value = "10")]
        k: usize,
        /// Candidates to inspect; engine default when omitted
        #[arg(long)]
        search_k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the stored vector of an identifier
    Get {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        /// Identifier
        #[arg(long)]
        id: String,
    },
    /// Show index metadata
    Info {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
    },
}

#[derive(Serialize)]
struct ResultRow<'a> {
    rank: usize,
    id: &'a str,
    distance: f32,
}

fn read_items(path: &Path) -> Result<Vec<IdentifiedVector<String>>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| parse_record(line).with_context(|| format!("line {}", n + 1)))
        .collect()
}

fn open(dir: &Path) -> Result<AnnoyIndex<String>> {
    AnnoyIndex::load(dir, &StringCodec).with_context(|| format!("loading index {}", dir.display()))
}

fn print_results(results: &[Neighbor<String>], json: bool) -> Result<()> {
    if json {
        let rows: Vec<ResultRow<'_>> = results
            .iter()
            .enumerate()
            .map(|(rank, n)| ResultRow {
                rank: rank + 1,
                id: &n.id,
                distance: n.distance,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if results.is_empty() {
        println!("No results found");
    } else {
        println!("Top {} results:", results.len());
        for (i, result) in results.iter().enumerate() {
            println!("{}. {} (distance: {:.4})", i + 1, result.id, result.distance);
        }
    }
    Ok(())
}

fn run(command: Commands, verbose: bool) -> Result<()> {
    match command {
        Commands::Build {
            input,
            output,
            trees,
            metric,
            seed,
        } => {
            let items = read_items(&input)?;
            let mut options = BuildOptions::new(trees, metric.into()).verbose(verbose);
            if let Some(seed) = seed {
                options = options.seed(seed);
            }
            let codec: &dyn IdentifierCodec<String> = &StringCodec;
            let index =
                AnnoyIndex::<String>::build_and_save(items, &options, Some(output.as_path()), Some(codec))?;
            println!(
                "Built {} index with {} items ({} dimensions, {} trees) in {}",
                index.metric(),
                index.len(),
                index.dimension(),
                trees,
                output.display()
            );
        }
        Commands::Query {
            index,
            id,
            vector,
            k,
            search_k,
            json,
        } => {
            let index = open(&index)?;
            let results = match (id, vector) {
                (Some(id), _) => match index.query_by_identifier(&id, k, search_k)? {
                    Some(results) => results,
                    None => bail!("identifier {:?} is not in the index", id),
                },
                (None, Some(vector)) => {
                    let q = parse_components(&vector)?;
                    index.query_by_vector(&q, k, search_k)?
                }
                (None, None) => bail!("either --id or --vector is required"),
            };
            print_results(&results, json)?;
        }
        Commands::Get { index, id } => {
            let index = open(&index)?;
            match index.get_vector(&id)? {
                Some(vector) => {
                    let text: Vec<String> = vector.iter().map(|x| x.to_string()).collect();
                    println!("{}", text.join(","));
                }
                None => bail!("identifier {:?} is not in the index", id),
            }
        }
        Commands::Info { index } => {
            let dir = index;
            let index = open(&dir)?;
            println!("Index: {}", dir.display());
            println!("  metric:     {}", index.metric());
            println!("  dimension:  {}", index.dimension());
            println!("  items:      {}", index.len());
            println!("  trees:      {}", index.n_trees()?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli.command, cli.verbose)
}
