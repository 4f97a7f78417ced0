//! Chatgen - Synthetic Conversation Generator
//!
//! Main CLI entry point for generating training conversations from a tiered
//! question/answer corpus.

use anyhow::{Context, Result};
use chatgen::config::{ChatgenConfig, CONFIG_FILE_NAME};
use chatgen::conversation::ConversationGenerator;
use chatgen::dataset::load_corpus;
use chatgen::export::{write_conversations, ExportFormat};
use chatgen::report::{sample_conversation, summary_line, CorpusStats};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;

#[derive(Parser)]
#[command(name = "chatgen")]
#[command(version)]
#[command(about = "Synthetic multi-turn conversation generator", long_about = None)]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate conversations from a corpus
    Generate {
        /// Corpus rows (.json array or .jsonl)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (.json or .jsonl)
        #[arg(short, long, default_value = "conversations.json")]
        output: PathBuf,

        /// Config file (default: chatgen.toml in this or a parent directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of conversations to generate
        #[arg(short = 'n', long)]
        generate_times: Option<usize>,

        /// Maximum rounds per conversation
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// System prompt written into every conversation
        #[arg(long)]
        system_prompt: Option<String>,

        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output format (json, jsonl); inferred from the extension if omitted
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Print one random conversation after generating
        #[arg(long)]
        show_sample: bool,
    },

    /// Show the shape of a corpus
    Inspect {
        /// Corpus rows (.json array or .jsonl)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a default chatgen.toml
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Command-line overrides for the generation section
struct GenerateOverrides {
    seed: Option<u64>,
    generate_times: Option<usize>,
    max_depth: Option<usize>,
    system_prompt: Option<String>,
    workers: Option<usize>,
}

impl GenerateOverrides {
    fn apply(self, config: &mut ChatgenConfig) {
        let generation = &mut config.generation;
        if let Some(seed) = self.seed {
            generation.seed = Some(seed);
        }
        if let Some(n) = self.generate_times {
            generation.generate_times = n;
        }
        if let Some(depth) = self.max_depth {
            generation.max_depth = depth;
        }
        if let Some(prompt) = self.system_prompt {
            generation.system_prompt = prompt;
        }
        if let Some(workers) = self.workers {
            generation.workers = workers;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Generate {
            input,
            output,
            config,
            seed,
            generate_times,
            max_depth,
            system_prompt,
            workers,
            format,
            show_sample,
        } => {
            let overrides = GenerateOverrides {
                seed,
                generate_times,
                max_depth,
                system_prompt,
                workers,
            };
            cmd_generate(
                &input,
                &output,
                config.as_deref(),
                overrides,
                format,
                show_sample,
            )
        }
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::InitConfig { output, force } => cmd_init_config(&output, force),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_generate(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    overrides: GenerateOverrides,
    format: Option<ExportFormat>,
    show_sample: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ChatgenConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ChatgenConfig::load_from_cwd().context("Failed to load chatgen.toml")?,
    };
    overrides.apply(&mut config);

    let corpus = load_corpus(input).context("Failed to load corpus")?;
    let generator = ConversationGenerator::new(&corpus, &config)?;

    println!("Chatgen Conversation Generator");
    println!("==============================");
    println!("Input: {} ({} records)", input.display(), corpus.len());
    println!("Output: {}", output.display());
    println!("Conversations: {}", config.generation.generate_times);
    println!("Max Depth: {}", config.generation.max_depth);
    match config.generation.seed {
        Some(seed) => println!("Seed: {}", seed),
        None => println!("Seed: (entropy)"),
    }
    println!("System Prompt: {}", generator.system_prompt());
    println!();

    let start = Instant::now();
    let result = generator.run()?;
    let elapsed = start.elapsed();

    let format = format.unwrap_or_else(|| ExportFormat::from_path(output));
    write_conversations(output, &result.conversations, format)
        .context("Failed to write conversations")?;

    println!("Generation complete!");
    println!(
        "Total conversations: {} in {:?}",
        result.conversations.len(),
        elapsed
    );
    println!("{}", summary_line(&result.counters));

    if show_sample {
        let mut rng = match config.generation.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        if let Some(sample) = sample_conversation(&result.conversations, &mut rng) {
            println!();
            println!("{}", sample);
        }
    }

    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<()> {
    let corpus = load_corpus(input).context("Failed to load corpus")?;
    let stats = CorpusStats::collect(&corpus);

    println!("Corpus: {}", input.display());
    println!("{}", stats.render());

    if let Err(err) = corpus.ensure_populated() {
        println!();
        println!("Warning: {} (generation will refuse this corpus)", err);
    }
    Ok(())
}

fn cmd_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    ChatgenConfig::default()
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}
