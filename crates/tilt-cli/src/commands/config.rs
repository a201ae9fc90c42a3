//! `tilt config`

use anyhow::Result;

use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub fn execute(config: &AppConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Table => {
            if let Some(path) = AppConfig::config_path() {
                println!("# {}", path.display());
            }
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}
