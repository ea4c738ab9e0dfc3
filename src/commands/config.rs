use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use medgif::Limits;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print the hosted deployment limits instead of the local ones
    #[arg(long)]
    pub cloud: bool,

    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save the default limits as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let limits = if args.cloud {
        Limits::cloud()
    } else {
        Limits::default()
    };
    let toml_str = limits.to_toml_string()?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default limits saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
