//! Status command implementation

use chrono::Utc;
use colored::Colorize;
use serde_json::json;

use crate::cli::cache::EntrySummary;
use crate::cli::{CommandContext, GlobalOptions};
use crate::config::{Config, OPENAI_API_KEY_ENV};
use crate::error::Result;

/// Display configuration and cache status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    let config_path = Config::resolve_path(opts.config_ref())?;
    let config_found = config_path.exists();
    let ctx = CommandContext::new(opts)?;
    let config = &ctx.config;

    let key_source = if config.openai_api_key.is_some() {
        Some("config")
    } else if config.resolved_api_key().is_some() {
        Some(OPENAI_API_KEY_ENV)
    } else {
        None
    };
    let cached = ctx.cache().read()?;

    if ctx.format.is_json() {
        let value = json!({
            "config_path": config_path.display().to_string(),
            "config_found": config_found,
            "api_key_source": key_source,
            "proxy_url": config.proxy_url,
            "recommendation_url": config.recommendation_url,
            "horizon_years": config.generation.horizon_years,
            "model": config.generation.model,
            "cached_photo": cached.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}\n", "Med Mirror Configuration Status".bold());

    if config_found {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not found, using defaults)".dimmed()
        );
    }
    println!();

    match key_source {
        Some(source) => println!("{} OpenAI API key configured (from {})", "✓".green(), source),
        None => {
            println!("{} OpenAI API key not configured", "✗".red());
            println!("  → Run 'med-mirror init' or set {}", OPENAI_API_KEY_ENV);
        }
    }

    println!("{} Prediction proxy: {}", "✓".green(), config.proxy_url);

    match &config.recommendation_url {
        Some(url) => println!("{} Recommendation service: {}", "✓".green(), url),
        None => println!("{} No recommendation service configured", "○".dimmed()),
    }

    println!(
        "{} Forecast: {} years with {} ({}, {})",
        "○".dimmed(),
        config.generation.horizon_years,
        config.generation.model,
        config.generation.size,
        config.generation.quality
    );

    match cached {
        Some(entry) => {
            let summary = EntrySummary::from_entry(&entry);
            println!(
                "{} Cached photo ({}), expires {}",
                "✓".green(),
                summary.mime_type,
                summary.expires_in(Utc::now())
            );
        }
        None => println!("{} No cached photo", "○".dimmed()),
    }

    println!();
    Ok(())
}
