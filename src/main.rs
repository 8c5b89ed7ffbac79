//! Med Mirror - capture a photo, forecast your future self

use clap::Parser;
use log::LevelFilter;

mod cache;
mod capture;
mod cli;
mod client;
mod config;
mod error;
mod health;
mod proxy;

use cli::{CacheCommands, Cli, Commands, CommandContext, GlobalOptions};
use config::Config;
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// Level precedence: `--debug`, then `log_level` in config, then `RUST_LOG`.
fn init_logging(cli: &Cli) {
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if cli.debug {
        builder.filter_level(LevelFilter::Debug);
    } else if let Some(level) = configured_level(cli.config.as_deref()) {
        builder.filter_level(level);
    }

    let _ = builder.try_init();
}

fn configured_level(config_path: Option<&str>) -> Option<LevelFilter> {
    let config = Config::load_at(config_path).ok()?;
    config.log_level?.parse().ok()
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("med-mirror version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Serve { host, port } => {
            let config = Config::load_or_default_at(opts.config_ref())?;
            cli::serve::run(config, host, port).await
        }
        Commands::Upload { file } => {
            let ctx = CommandContext::new(&opts)?;
            cli::capture::upload(&ctx, &file).await
        }
        Commands::Capture { command, output } => {
            let ctx = CommandContext::new(&opts)?;
            cli::capture::capture(&ctx, &command, output.as_deref()).await
        }
        Commands::Predict {
            context,
            image,
            proxy,
            output,
        } => {
            let ctx = CommandContext::new(&opts)?;
            cli::capture::predict(
                &ctx,
                &context,
                image.as_deref(),
                proxy.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Commands::Cache(cache_cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match cache_cmd {
                CacheCommands::Show { raw } => cli::cache::show(&ctx, raw),
                CacheCommands::Status => cli::cache::status(&ctx),
                CacheCommands::Clear => cli::cache::clear(&ctx),
                CacheCommands::Path => cli::cache::path(&ctx),
            }
        }
        Commands::ImportHealth { file, output } => {
            cli::health::import(opts.format, &file, output.as_deref()).await
        }
        Commands::Recommend { file, url } => {
            let ctx = CommandContext::new(&opts)?;
            cli::recommend::run(&ctx, &file, url.as_deref()).await
        }
    }
}
