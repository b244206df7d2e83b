// src/cli.rs

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Turns numbers into videos through a configurable encoder command.",
    long_about = None
)]
pub struct Cli {
    /// Path to the config JSON. Defaults to the NUM2VID_CONFIG environment variable.
    #[clap(short, long, global = true)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (calculator form and /convert endpoint).
    Serve,

    /// Ask the server for the video of a number and save it.
    /// Prompts interactively when no number is given.
    Submit {
        num: Option<u64>,

        /// Where to save the video. Defaults to ~/{num}.{vid_format}.
        #[clap(short, long)]
        output: Option<String>,

        /// Open the saved video with the system player.
        #[clap(long, action = clap::ArgAction::SetTrue)]
        open: bool,
    },

    /// Evaluate a math expression the same way the server form does.
    Calc {
        #[clap(allow_hyphen_values = true)]
        expr: String,
    },

    /// Inspect or edit the config document.
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the whole document.
    Show,
    /// Print a single value.
    Get { key: String },
    /// Set a value. VALUE is parsed as JSON, falling back to a plain string.
    Set { key: String, value: String },
    /// Reset the document to an empty object.
    Clear,
}
