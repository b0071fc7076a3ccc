use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tiekou", version, about = "铁口直断 — the fortune teller that picks its verdicts from the book")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask one question in the terminal
    Ask {
        /// The question; empty is allowed (the book has a verdict for that too)
        #[arg(default_value = "")]
        question: String,
        /// Reply locale: zh or en
        #[arg(long, short)]
        language: Option<String>,
        /// Print the intermediate trace (features, state, mother verdict)
        #[arg(long)]
        reasoning: bool,
    },
    /// Show recent stored readings
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete all stored readings
    Clear,
}
