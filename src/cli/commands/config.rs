//! Implementation of the `metacontrol config` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::load_config;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration after all layers are merged
    Show,
    /// Validate a configuration file (or the default layers)
    Validate {
        /// Configuration file to check
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    pub source: String,
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        let body = serde_yaml::to_string(&self.config)
            .unwrap_or_else(|err| format!("<unprintable configuration: {err}>"));
        format!("# source: {}\n{}", self.source, body.trim_end())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    pub source: String,
    pub valid: bool,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        format!("✓ {} is valid", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(
        || "defaults + .metacontrol/ + METACONTROL_* environment".to_string(),
        |p| p.display().to_string(),
    )
}

pub fn execute(args: ConfigArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            output(
                &ConfigShowOutput {
                    source: describe(config_path),
                    config,
                },
                json_mode,
            );
        }
        ConfigCommands::Validate { file } => {
            let path = file.as_deref().or(config_path);
            if let Some(path) = path {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
            }
            load_config(path)
                .with_context(|| format!("{} is not a valid configuration", describe(path)))?;
            output(
                &ConfigValidateOutput {
                    source: describe(path),
                    valid: true,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
