use crate::cli::ConfigCommands;
use crate::config::BacklinksConfig;
use anyhow::Result;
use std::path::Path;

pub fn run(cmd: ConfigCommands, config_path: &Path, config: &BacklinksConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config),
    }
}

fn validate(config_path: &Path) -> Result<()> {
    match BacklinksConfig::load(config_path) {
        Ok(config) => {
            let errors = config.validate();
            if errors.is_empty() {
                println!("✅ {} is valid.", config_path.display());
            } else {
                println!("❌ Validation errors in {}:", config_path.display());
                for e in &errors {
                    println!("  - {}", e);
                }
                std::process::exit(1);
            }
        }
        Err(e) => {
            println!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn show(config: &BacklinksConfig) -> Result<()> {
    println!("Item types:  {}", config.graph.item_types.join(","));
    println!("Statuses:    {}", config.graph.statuses.join(","));
    println!("Database:    {}", config.db_path().display());
    println!();
    match toml::to_string_pretty(config) {
        Ok(s) => println!("{}", s),
        Err(e) => anyhow::bail!("Failed to serialize config: {}", e),
    }
    Ok(())
}
