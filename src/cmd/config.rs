//! Configuration view and validation commands (`metritask config`).

use anyhow::Result;
use std::path::Path;

use metritask::config::{
    API_URL_ENV, CONFIG_FILE_NAME, Config, MetritaskToml, PAGE_SIZE_ENV,
};

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, working_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("MetriTask Configuration");
            println!("=======================");
            println!();

            match &config.path {
                Some(path) => println!("Config file: {}", path.display()),
                None => {
                    println!("No {} found. Using defaults.", CONFIG_FILE_NAME);
                    println!("Run 'metritask config init' to create one.");
                }
            }
            println!();

            let toml = &config.toml;
            println!("[api]");
            if let Some(url) = &toml.api.base_url {
                println!("  base_url = \"{}\"", url);
            }
            if let Some(secs) = toml.api.timeout_secs {
                println!("  timeout_secs = {}", secs);
            }
            println!();
            println!("[view]");
            println!("  page_size = {}", toml.view.page_size);
            println!("  sort = \"{}\"", toml.view.sort);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  api_url = \"{}\"", config.api_url());
            println!("  page_size = {}", config.page_size());
            match config.session_path() {
                Ok(path) => println!("  session = \"{}\"", path.display()),
                Err(e) => println!("  session = unavailable ({})", e),
            }
            println!();
            println!("Environment: {}, {}", API_URL_ENV, PAGE_SIZE_ENV);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let path = working_dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            MetritaskToml::default().save(&path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, timeout_secs");
            println!("  - [view] page_size, sort");
            println!("  - [session] path");
            println!();
        }
    }

    Ok(())
}
