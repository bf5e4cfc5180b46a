use std::fs::{read_to_string, write};
use std::path::Path;

use anyhow::{Result, bail};

use serde_derive::{Deserialize, Serialize};

use toml::from_str;

use crate::core::common::{LoggingOptions, ResolveOptions};

#[derive(Clone, Default, Deserialize, Debug, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub resolve_options: ResolveOptions,
    pub logging_options: LoggingOptions,
}

impl Config {
    pub fn load(filename: &str) -> Result<Config> {
        let config = read_to_string(filename)?;
        let config: Config = from_str(&config)?;
        Ok(config)
    }

    /// Write the default configuration to `filename`.
    pub fn generate(filename: &str, force: bool) -> Result<()> {
        if Path::new(filename).exists() && !force {
            bail!("config file `{filename}` already exists, use --force to overwrite")
        }
        let config = Config::default();
        let toml_config = toml::to_string(&config)?;
        write(filename, toml_config)?;
        println!("Configuration written to `{filename}`.");
        Ok(())
    }
}
