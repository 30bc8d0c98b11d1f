/**
 * Void-and-Cluster CLI - generate blue noise rank masks from the command line
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use void_and_cluster::{
    CandidateSpread, ConvolutionStrategy, GeneratorConfig, KernelOptions, KernelShape,
    KernelSpec, MaskGenerator, RankMap, RankingMode, SeedSamples,
};

/// Blue noise rank mask generation
#[derive(Parser)]
#[command(name = "void-and-cluster")]
#[command(version)]
#[command(about = "Blue noise rank masks via extended void-and-cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a rank mask from command-line parameters
    Generate {
        /// Output JSON file for the rank array (summary only if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mask width in cells
        #[arg(long, default_value = "64")]
        width: usize,

        /// Mask height in cells
        #[arg(long, default_value = "64")]
        height: usize,

        /// Gaussian sigma for ranking (1.5-2.5, higher = more spread)
        #[arg(long, default_value = "1.9")]
        sigma: f64,

        /// Separate sigma for refining the seed pattern
        #[arg(long)]
        candidate_sigma: Option<f64>,

        /// Derive the candidate sigma from the seed sample count
        #[arg(long, conflicts_with = "candidate_sigma")]
        adaptive: bool,

        /// Seed pattern density
        #[arg(long, default_value = "0.1", conflicts_with = "samples")]
        density: f64,

        /// Exact seed sample count
        #[arg(long)]
        samples: Option<usize>,

        /// Kernel radius as a multiple of sigma
        #[arg(long, default_value_t = KernelSpec::DEFAULT_RADIUS_MULTIPLIER)]
        radius_multiplier: f64,

        /// Use a tail Gaussian with this exponent
        #[arg(long)]
        tail_exponent: Option<f64>,

        /// Compute full convolutions with FFT
        #[arg(long)]
        fft: bool,

        /// Rank the upper half by inverted cluster removal
        #[arg(long)]
        classic: bool,

        /// Use double precision energy maps
        #[arg(long)]
        double: bool,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Show generation progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a rank mask from a JSON configuration file
    Config {
        /// Path to the configuration
        config: PathBuf,

        /// Output JSON file for the rank array (summary only if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use double precision energy maps
        #[arg(long)]
        double: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Result<GeneratorConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn run(config: GeneratorConfig, double: bool) -> Result<RankMap> {
    let mask = if double {
        MaskGenerator::<f64>::new(config)
            .context("Failed to create generator")?
            .generate()
    } else {
        MaskGenerator::<f32>::new(config)
            .context("Failed to create generator")?
            .generate()
    };
    mask.context("Failed to generate rank mask")
}

fn write_mask(mask: &RankMap, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, mask).context("Failed to encode rank mask")?;
    writer.flush().context("Failed to write rank mask")?;
    Ok(())
}

fn report(config: &GeneratorConfig, mask: &RankMap, output: Option<&Path>) -> Result<()> {
    println!("Generated {}×{} rank mask", mask.width, mask.height);
    println!("Sigma: {}", config.sigma);
    println!("Seed samples: {}", mask.seed_samples);
    if let Some(seed) = config.seed {
        println!("Seed: {}", seed);
    }

    if let Some(path) = output {
        write_mask(mask, path)?;
        println!("Rank mask saved to: {}", path.display());
    }

    println!();
    println!("Done!");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            output,
            width,
            height,
            sigma,
            candidate_sigma,
            adaptive,
            density,
            samples,
            radius_multiplier,
            tail_exponent,
            fft,
            classic,
            double,
            seed,
            verbose,
        } => {
            let config = GeneratorConfig {
                width,
                height,
                sigma,
                candidate_sigma,
                seed_samples: match samples {
                    Some(count) => SeedSamples::Count(count),
                    None => SeedSamples::Density(density),
                },
                kernel: KernelOptions {
                    radius_multiplier,
                    shape: match tail_exponent {
                        Some(exponent) => KernelShape::TailGaussian { exponent },
                        None => KernelShape::Gaussian,
                    },
                },
                candidate_spread: if adaptive {
                    CandidateSpread::adaptive()
                } else {
                    CandidateSpread::Fixed
                },
                convolution: if fft {
                    ConvolutionStrategy::Fft
                } else {
                    ConvolutionStrategy::Direct
                },
                ranking: if classic {
                    RankingMode::Classic
                } else {
                    RankingMode::Extended
                },
                seed,
                verbose,
                ..Default::default()
            };

            let mask = run(config.clone(), double)?;
            report(&config, &mask, output.as_deref())?;
        }

        Commands::Config {
            config,
            output,
            double,
        } => {
            if !config.exists() {
                anyhow::bail!("Config file does not exist: {}", config.display());
            }
            let config = load_config(&config)?;

            let mask = run(config.clone(), double)?;
            report(&config, &mask, output.as_deref())?;
        }
    }

    Ok(())
}
