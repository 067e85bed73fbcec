use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "errpress", version, about = "Automated error-article pipeline CLI")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Config file path (default: ~/.config/errpress/config.toml)"
    )]
    pub config: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Seed the random source for reproducible selection"
    )]
    pub seed: Option<u64>,
    #[arg(long, global = true, help = "Verbose logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full cycle: discover, collect, synthesize, gate, store, publish.
    Run {
        #[arg(long, help = "Stop before publishing")]
        dry_run: bool,
        #[arg(long, help = "Store and publish even when the quality gate fails")]
        allow_low_quality: bool,
    },
    /// Discovery stage only; prints the selected candidate.
    Discover,
    /// Skip discovery and run the pipeline for a given error message.
    Compose {
        error: String,
        #[arg(long, help = "Stop before publishing")]
        dry_run: bool,
        #[arg(long, help = "Store and publish even when the quality gate fails")]
        allow_low_quality: bool,
    },
    /// Run the quality gate over an article JSON file.
    Gate {
        article: String,
        #[arg(long, help = "Driving keyword; defaults to the article's error context")]
        keyword: Option<String>,
    },
    /// Filter and select from a candidate pool JSON file.
    Select { pool: String },
    /// Stored article inspection.
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommands {
    List,
    Show { number: u32 },
}
