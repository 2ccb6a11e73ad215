use clap::Subcommand;

use super::config::ConfigArgs;
use super::parse::ParseArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Drive the device toward a natural-language goal
    Run(RunArgs),

    /// Parse a model reply and print the extracted action
    Parse(ParseArgs),

    /// Show or validate the effective configuration
    Config(ConfigArgs),
}
