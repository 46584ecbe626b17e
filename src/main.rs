use clap::{Parser, Subcommand};
use midi2tensor::encode::batch::TensorExport;
use midi2tensor::{decode, events, Config, MidiToTensor};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// MIDI-to-Tensor Encoder
#[derive(Parser)]
#[command(name = "midi2tensor")]
#[command(about = "Encode MIDI note streams into fixed-shape tensors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode MIDI files (or directories of them) into one tensor
    Encode {
        /// Input MIDI files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output JSON file
        #[arg(short, long, default_value = "./tensor.json")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Encode and decode a MIDI file (lossy round trip)
    Identity {
        /// Input MIDI file
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long, default_value = "./identity.mid")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => midi2tensor::config::load_config(path),
        None => Ok(Config::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Encode {
            inputs,
            output,
            config,
        } => {
            let processor = MidiToTensor::new(load_config(config)?)?;
            let result = processor.encode_paths(&inputs)?;
            for failure in &result.failures {
                tracing::warn!("{}: {}", failure.file, failure.error);
            }

            let export = TensorExport::from(&result);
            std::fs::write(&output, serde_json::to_string(&export)?)?;
            info!("Tensor {:?} saved to {}", export.shape, output.display());
        }
        Commands::Identity {
            input,
            output,
            config,
        } => {
            let processor = MidiToTensor::new(load_config(config)?)?;
            let stream = events::load_midi_file(&input)?;
            let decoded = processor.identity(&stream)?;
            let bytes = decode::write_smf(processor.encoder().context(), &decoded)?;
            std::fs::write(&output, bytes)?;
            info!(
                "Round trip kept {} of {} events, saved to {}",
                decoded.len(),
                stream.len(),
                output.display()
            );
        }
        Commands::ValidateConfig { config } => {
            let config = midi2tensor::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
