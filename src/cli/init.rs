//! Init command implementation

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;

/// Run the init command
///
/// Existing settings are offered as defaults, so re-running init only changes
/// what the user edits.
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let theme = ColorfulTheme::default();
    let mut config = Config::load_or_default_at(opts.config_ref())?;

    println!("{}", "Welcome to Med Mirror!".bold().green());
    println!("Let's set up your configuration.\n");

    let key_prompt = if config.openai_api_key.is_some() {
        "OpenAI API key (leave empty to keep the current one)"
    } else {
        "OpenAI API key (leave empty to use OPENAI_API_KEY)"
    };
    let api_key: String = Password::with_theme(&theme)
        .with_prompt(key_prompt)
        .allow_empty_password(true)
        .interact()?;
    if !api_key.trim().is_empty() {
        config.openai_api_key = Some(api_key.trim().to_string());
    }

    config.proxy_url = Input::with_theme(&theme)
        .with_prompt("Prediction proxy URL")
        .default(config.proxy_url.clone())
        .interact_text()?;

    let recommendation_url: String = Input::with_theme(&theme)
        .with_prompt("Recommendation service URL (optional)")
        .default(config.recommendation_url.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.recommendation_url =
        Some(recommendation_url.trim().to_string()).filter(|u| !u.is_empty());

    config.generation.horizon_years = Input::with_theme(&theme)
        .with_prompt("Forecast horizon in years")
        .default(config.generation.horizon_years)
        .validate_with(|years: &u32| {
            if *years >= 1 {
                Ok(())
            } else {
                Err("must be at least 1")
            }
        })
        .interact_text()?;

    config.validate()?;
    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Start the prediction proxy", "med-mirror serve".cyan());
    println!("  {} - Cache a photo", "med-mirror upload <FILE>".cyan());
    println!(
        "  {} - Generate a forecast",
        "med-mirror predict -c <CONTEXT>".cyan()
    );

    Ok(())
}
