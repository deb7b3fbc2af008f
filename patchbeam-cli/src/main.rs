use clap::Parser;
use ndarray::Array3;
use patchbeam::{BeamSearch, PatchShape, ScoringMethod, SearchConfig, ValueParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "patchbeam CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for the search phases.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchConfigJson {
    beam_width: usize,
    proposals: usize,
    target_size: usize,
    search_steps: usize,
    method: String,
    parallel: bool,
}

impl Default for SearchConfigJson {
    fn default() -> Self {
        let cfg = SearchConfig::default();
        Self {
            beam_width: cfg.beam_width,
            proposals: cfg.proposals,
            target_size: cfg.target_size,
            search_steps: cfg.search_steps,
            method: cfg.method.name().to_owned(),
            parallel: cfg.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScoringConfigJson {
    max_mindex: Option<usize>,
    edge_weight: f32,
    /// `[frames, channels, height, width]`.
    patch_shape: Option<[usize; 4]>,
    needle_groups: usize,
}

impl Default for ScoringConfigJson {
    fn default() -> Self {
        let params = ValueParams::default();
        Self {
            max_mindex: params.max_mindex,
            edge_weight: params.edge_weight,
            patch_shape: None,
            needle_groups: params.needle_groups,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    data_path: String,
    output_path: Option<String>,
    sigma: f32,
    search: SearchConfigJson,
    scoring: ScoringConfigJson,
}

#[derive(Debug, Serialize)]
struct SelectionRecord {
    score: f32,
    indices: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct Output {
    method: String,
    results: Vec<SelectionRecord>,
}

/// Reads a `[batch][candidate][feature]` JSON array into a dense pool.
fn load_pool(path: &str) -> Result<Array3<f32>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let nested: Vec<Vec<Vec<f32>>> = serde_json::from_str(&text)?;
    let batch = nested.len();
    let num = nested.first().map_or(0, Vec::len);
    let dim = nested
        .first()
        .and_then(|problem| problem.first())
        .map_or(0, Vec::len);
    if batch == 0 || num == 0 || dim == 0 {
        return Err("candidate pool must be non-empty".into());
    }

    let mut flat = Vec::with_capacity(batch * num * dim);
    for problem in &nested {
        if problem.len() != num {
            return Err("every search problem needs the same number of candidates".into());
        }
        for candidate in problem {
            if candidate.len() != dim {
                return Err("every candidate needs the same feature length".into());
            }
            flat.extend_from_slice(candidate);
        }
    }
    Ok(Array3::from_shape_vec((batch, num, dim), flat)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("patchbeam=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.data_path.is_empty() {
        return Err("data_path must be set in the config".into());
    }
    if config.sigma < 0.0 {
        return Err("sigma must be non-negative".into());
    }

    let data = load_pool(&config.data_path)?;
    tracing::info!(shape = ?data.dim(), "loaded candidate pool");

    let method: ScoringMethod = config.search.method.parse()?;
    let search = BeamSearch::new(SearchConfig {
        beam_width: config.search.beam_width,
        proposals: config.search.proposals,
        target_size: config.search.target_size,
        search_steps: config.search.search_steps,
        method,
        parallel: config.search.parallel,
    })
    .with_params(ValueParams {
        sigma: config.sigma,
        max_mindex: config.scoring.max_mindex,
        edge_weight: config.scoring.edge_weight,
        patch_shape: config
            .scoring
            .patch_shape
            .map(|[frames, channels, height, width]| PatchShape {
                frames,
                channels,
                height,
                width,
            }),
        needle_groups: config.scoring.needle_groups,
        learned: None,
    });

    let selection = search.run(data.view())?;
    let results = selection
        .vals
        .iter()
        .zip(selection.inds.outer_iter())
        .map(|(&score, inds)| SelectionRecord {
            score,
            indices: inds.to_vec(),
        })
        .collect();
    let output = Output {
        method: method.name().to_owned(),
        results,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
