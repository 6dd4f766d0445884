use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML config file
    #[clap(long, default_value = "config.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the matching daemon
    Daemon {},

    /// Run a one-shot match query from the terminal
    Match {
        /// Requesting user id
        #[clap(long)]
        user_id: String,

        /// Free-text preference query
        query: String,

        /// Number of matches to return
        #[clap(long, default_value = "5")]
        limit: usize,

        /// Pagination offset
        #[clap(long, default_value = "0")]
        offset: usize,
    },

    /// Compile a pack submissions JSON file and print the summary and
    /// synthesized wingman prompt
    CompilePack {
        /// JSON file containing an array of pack submissions
        file: String,
    },
}
