//! Recommend command implementation

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::cli::CommandContext;
use crate::client::models::RatedRecommendation;
use crate::client::{PatientRecord, RecommendationApi, RecommendationClient, VisitResponse};
use crate::error::Result;

/// Forward a patient record and print the recommendations
pub async fn run(ctx: &CommandContext, file: &Path, url: Option<&str>) -> Result<()> {
    let contents = tokio::fs::read_to_string(file).await?;
    let record: Value = serde_json::from_str(&contents)?;
    let patient = PatientRecord::from_value(record.clone())?;

    let base_url = match url {
        Some(url) => url,
        None => ctx.config.require_recommendation_url()?,
    };
    let client = RecommendationClient::new(base_url)?;

    if !ctx.format.is_json() {
        for line in patient.summary() {
            println!("{}", line.dimmed());
        }
    }

    let spinner = (!ctx.format.is_json()).then(|| {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Consulting recommendation service...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let result = client.visit(&record).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let visit = result?;

    if ctx.format.is_json() {
        println!("{}", serde_json::to_string_pretty(&visit)?);
    } else {
        print_visit(&visit);
    }
    Ok(())
}

fn print_rated(label: &str, rec: Option<&RatedRecommendation>) {
    match rec {
        Some(rec) => println!(
            "  {:<10} {} {}",
            label.bold(),
            rec.description,
            format!("({}/10)", rec.rating).dimmed()
        ),
        None => println!("  {:<10} {}", label.bold(), "no recommendation".dimmed()),
    }
}

fn print_visit(visit: &VisitResponse) {
    let recs = &visit.recommendations;

    println!("\n{}", "Recommendations".bold());
    print_rated("Alcohol", recs.alcohol.as_ref());
    print_rated("Sleep", recs.sleep.as_ref());
    print_rated("Exercise", recs.exercise.as_ref());
    for supplement in &recs.supplements {
        print_rated("Supplement", Some(supplement));
    }

    if let Some(forecast) = visit.forecast() {
        println!("\n{}", "Forecast".bold());
        if let Some(fields) = forecast.as_object() {
            for (key, value) in fields {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                println!("  {:<40} {}", key.replace('_', " "), shown);
            }
        }
    }

    if let Some(urls) = &visit.evidence_urls {
        if !urls.is_empty() {
            println!("\n{}", "Evidence".bold());
            for url in urls {
                println!("  {}", url.cyan());
            }
        }
    }

    let missing = visit.missing_sections();
    if !missing.is_empty() {
        println!(
            "\n{} Incomplete response, missing: {}",
            "⚠".yellow(),
            missing.join(", ")
        );
    }
}
