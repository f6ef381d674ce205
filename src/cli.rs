use clap::Parser;

/// The crawl engine's only external surface (§6): a single positional
/// argument naming the config file to load.
#[derive(Parser)]
#[command(name = "newsbot", about = "Persistent multi-source news crawler")]
pub struct Cli {
    /// Path to the TOML config file.
    pub config: String,
}
