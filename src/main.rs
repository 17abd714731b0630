//! Rule search CLI - Generate rules, score simulator output, rank results.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::{info, warn};

use ca_rule_search::{
    Error, Result,
    compute::{RuleGenerator, RuleValueFunction, TransitionTable, rank, rule_string, save_ranking},
    schema::{GeneratorConfig, Rule, SimulationResult, StateBias, ValueFunctionConfig},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate rule files.
    Generate {
        /// Generator configuration file; flags override its fields.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        n_dims: Option<u32>,
        #[arg(long)]
        n_states: Option<usize>,
        #[arg(long)]
        beta_live: Option<f64>,
        /// Per-state bias, e.g. `dead:4,live:2,dying:1.5`.
        #[arg(long)]
        beta_sparse: Option<StateBias>,
        #[arg(long)]
        beta_want: Option<StateBias>,
        #[arg(long)]
        beta_unused: Option<StateBias>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        beta_noise: Option<f64>,
        /// Number of rules to write.
        #[arg(short, long, default_value_t = 1)]
        count: usize,
        /// Output directory; files are numbered after any existing ones.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Score one simulation result.
    Evaluate {
        result: PathBuf,
        /// Value function configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the score here as JSON.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Score and rank every result file in a directory.
    Rank {
        dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
        /// Drop results scoring below this value.
        #[arg(long)]
        min_value: Option<f64>,
        /// Print the top N entries.
        #[arg(long, default_value_t = 10)]
        print: usize,
    },
    /// Print a rule file's table and live states.
    Describe { rule: PathBuf },
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            config,
            n_dims,
            n_states,
            beta_live,
            beta_sparse,
            beta_want,
            beta_unused,
            seed,
            beta_noise,
            count,
            out,
        } => {
            let mut config = match config {
                Some(path) => GeneratorConfig::load(path)?,
                None => GeneratorConfig::default(),
            };
            config.n_dims = n_dims.unwrap_or(config.n_dims);
            config.n_states = n_states.unwrap_or(config.n_states);
            config.beta_live = beta_live.unwrap_or(config.beta_live);
            config.beta_sparse = beta_sparse.unwrap_or(config.beta_sparse);
            config.beta_want = beta_want.unwrap_or(config.beta_want);
            config.beta_unused = beta_unused.unwrap_or(config.beta_unused);
            config.seed = seed.or(config.seed);
            config.beta_noise = beta_noise.unwrap_or(config.beta_noise);
            generate(config, count, &out)
        }
        Command::Evaluate {
            result,
            config,
            out,
        } => evaluate(load_value_fn(config)?, &result, out.as_deref()),
        Command::Rank {
            dir,
            config,
            out,
            min_value,
            print,
        } => rank_dir(load_value_fn(config)?, &dir, &out, min_value, print),
        Command::Describe { rule } => describe(&rule),
    }
}

fn load_value_fn(config: Option<PathBuf>) -> Result<RuleValueFunction> {
    let config = match config {
        Some(path) => ValueFunctionConfig::load(path)?,
        None => ValueFunctionConfig::default(),
    };
    RuleValueFunction::new(config)
}

/// `.json` files directly under `dir`, sorted by path.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// First free index after the numbered rule files already in `dir`.
fn next_index(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let next = json_files(dir)?
        .iter()
        .filter_map(|p| p.file_stem()?.to_str()?.parse::<usize>().ok())
        .max()
        .map_or(0, |n| n + 1);
    Ok(next)
}

fn generate(config: GeneratorConfig, count: usize, out: &Path) -> Result<()> {
    let generator = RuleGenerator::new(config)?;
    let start = Instant::now();
    let rules = generator.generate_batch(count)?;
    info!("generation took {:.2?}", start.elapsed());

    let first = next_index(out)?;
    for (i, rule) in rules.iter().enumerate() {
        let path = out.join(format!("{:03}.json", first + i));
        rule.save(&path)?;
        println!("{}  {}", path.display(), rule_string(rule));
    }
    Ok(())
}

fn evaluate(value_fn: RuleValueFunction, path: &Path, out: Option<&Path>) -> Result<()> {
    let result = SimulationResult::load(path)?;
    let score = value_fn.evaluate(&result);

    println!("value: {:.6}", score.value);
    if let Some(reason) = &score.reason {
        println!("reason: {}", reason);
    }
    for (name, loss) in score.breakdown() {
        println!("  {}: {:.6}", name, loss);
    }

    if let Some(out) = out {
        score.save(out)?;
    }
    Ok(())
}

fn rank_dir(
    value_fn: RuleValueFunction,
    dir: &Path,
    out: &Path,
    min_value: Option<f64>,
    print: usize,
) -> Result<()> {
    let mut results = Vec::new();
    for path in json_files(dir)? {
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match SimulationResult::load(&path) {
            Ok(result) => results.push((label, result)),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    let ranked = rank(&value_fn, &results, min_value);
    save_ranking(out, &ranked)?;

    println!("Ranked {} of {} results", ranked.len(), results.len());
    for (i, entry) in ranked.iter().take(print).enumerate() {
        match &entry.score.reason {
            Some(reason) => println!(
                "{:>4}. {:<24} {:>10.6}  ({})",
                i + 1,
                entry.label,
                entry.score.value,
                reason
            ),
            None => println!(
                "{:>4}. {:<24} {:>10.6}",
                i + 1,
                entry.label,
                entry.score.value
            ),
        }
    }
    Ok(())
}

fn describe(path: &Path) -> Result<()> {
    let rule = Rule::load(path)?;
    let table = TransitionTable::from_rule(&rule)?;

    println!("Rule: {}", rule_string(&rule));
    println!(
        "States: {} ({}D, {} neighbours)",
        rule.n_states(),
        rule.params.n_dims,
        rule.max_neighbors()?
    );
    let live: Vec<String> = rule.live_states.iter().map(|s| s.to_string()).collect();
    println!("Live states: {}", live.join(", "));
    for state in 0..rule.n_states() {
        println!("  {}: {}", state, rule.state_type(state));
    }
    if let Some(seed) = rule.params.seed {
        println!("Seed: {}", seed);
    }
    if !table.is_total() {
        println!("Note: some neighbour counts have no transition");
    }
    Ok(())
}
