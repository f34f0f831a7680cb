//! Settings file management command.

use super::common::load_settings;
use clap::{Args, Subcommand};
use std::path::Path;
use tonegen_config::{Settings, default_settings_path, ensure_user_config_dir};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings as TOML
    Show,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the default settings file location
    Path,
}

pub fn run(args: ConfigArgs, config: Option<&Path>) -> anyhow::Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            let settings = load_settings(config)?;
            print!("{}", settings.to_toml()?);
        }
        ConfigCommand::Init { force } => {
            let path = match config {
                Some(path) => path.to_path_buf(),
                None => {
                    ensure_user_config_dir()?;
                    default_settings_path()
                }
            };
            if path.exists() && !force {
                anyhow::bail!(
                    "'{}' already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            Settings::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Path => {
            println!("{}", default_settings_path().display());
        }
    }
    Ok(())
}
