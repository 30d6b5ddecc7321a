//! Configuration paths for Reshelf
//!
//! All paths are under ~/.reshelf/ unless RESHELF_HOME is set.

use anyhow::Context;
use reshelf::config::default_config_path;
use reshelf::ReshelfConfig;
use reshelf_logging::{logs_dir, reshelf_home};
use std::path::PathBuf;

/// Arguments for the config command
#[derive(Debug, Clone)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    /// Write a default config file if none exists
    pub init: bool,
    /// Show resolved paths in JSON format
    pub json: bool,
}

/// Run the config command - shows resolved paths and effective settings
pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let home = reshelf_home();
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let initialized = args.init && !config_path.exists();
    if initialized {
        ReshelfConfig::default()
            .save(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }
    let config = ReshelfConfig::load_or_default(args.config.as_deref())?;
    let logs = logs_dir();

    if args.json {
        let value = serde_json::json!({
            "home": home.to_string_lossy(),
            "config": {
                "path": config_path.to_string_lossy(),
                "exists": config_path.exists(),
                "initialized": initialized,
            },
            "rules": {
                "path": config.rules.to_string_lossy(),
                "exists": config.rules.exists(),
            },
            "logs": {
                "path": logs.to_string_lossy(),
                "exists": logs.exists(),
            },
            "default_root": config.default_root,
            "workers": config.workers,
            "item_timeout_ms": config.item_timeout_ms,
            "unmapped": config.unmapped,
            "classify": config.classify,
            "fallback_tag": config.fallback_tag,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if initialized {
        println!("Wrote default config to {}", config_path.display());
        println!();
    } else if args.init {
        println!("Config already exists at {}; left unchanged", config_path.display());
        println!();
    }

    println!("RESHELF CONFIGURATION");
    println!("=====================");
    println!();
    println!("Home:     {}", home.display());
    println!("Config:   {} {}", config_path.display(), exists_marker(config_path.exists()));
    println!("Rules:    {} {}", config.rules.display(), exists_marker(config.rules.exists()));
    println!("Logs:     {}", logs.display());
    println!();
    println!("Default root:    {}", config.default_root);
    println!("Workers:         {}", config.workers);
    match config.item_timeout_ms {
        Some(ms) => println!("Item timeout:    {} ms", ms),
        None => println!("Item timeout:    none"),
    }
    println!(
        "Unmapped policy: {}",
        serde_json::to_value(config.unmapped)?
            .as_str()
            .unwrap_or("leave")
    );
    println!("Classify rules:  {}", config.classify.len());
    if let Some(tag) = &config.fallback_tag {
        println!("Fallback tag:    {}", tag);
    }
    Ok(())
}

fn exists_marker(exists: bool) -> &'static str {
    if exists {
        "(exists)"
    } else {
        "(not created)"
    }
}
