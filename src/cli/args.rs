use std::path::PathBuf;

use clap::Parser;

/// Fetches repositories into a directory through pluggable content providers.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Configuration file, defaults to $HOME/.contentfetch/config.toml
    #[clap(short, long, env = "CONTENTFETCH_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Prints the name of the provider that would handle a source
    Detect {
        source: String,
        #[clap(short, long = "ref")]
        reference: Option<String>,
    },
    ///Fetches a source into the output directory
    Fetch {
        /// Repository path or URL, required unless --spec is given
        #[clap(required_unless_present = "spec", conflicts_with = "spec")]
        source: Option<String>,
        #[clap(short, long)]
        output_dir: PathBuf,
        #[clap(short, long = "ref", conflicts_with = "spec")]
        reference: Option<String>,
        /// TOML file with `repo` and optional `ref` keys
        #[clap(short, long)]
        spec: Option<PathBuf>,
        /// Print every line of git output
        #[clap(long)]
        raw: bool,
    },
}
