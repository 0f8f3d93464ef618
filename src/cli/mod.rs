//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ServeCommand, ValidateCommand};
use std::ffi::OsString;

/// Pull request CI service
#[derive(Debug, Parser, Clone)]
#[command(name = "bomba")]
#[command(version)]
#[command(about = "Runs build and test pipelines for pull requests and reports commit statuses", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the pull request webhook
    Serve(ServeCommand),

    /// Run the pipeline of one repository branch without a webhook
    Run(RunCommand),

    /// Validate a pipeline definition file
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
