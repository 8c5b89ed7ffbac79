//! Health app import command

use chrono::Local;
use colored::Colorize;
use serde_json::json;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::client::PatientRecord;
use crate::client::models::RatedRecommendation;
use crate::error::{Error, Result};
use crate::health;

/// Convert `file` into a patient record, written to `output` or stdout
pub async fn import(format: OutputFormat, file: &Path, output: Option<&Path>) -> Result<()> {
    let path = file.to_path_buf();
    let now = Local::now().naive_local();
    let summary = tokio::task::spawn_blocking(move || health::read_export(&path, now))
        .await
        .map_err(|e| Error::Other(format!("health import task failed: {}", e)))??;

    let value = summary.to_value();
    let record = PatientRecord::from_value(value.clone())?;
    let json = serde_json::to_string_pretty(&value)?;

    let Some(output) = output else {
        println!("{}", json);
        return Ok(());
    };
    tokio::fs::write(output, &json).await?;

    if format.is_json() {
        let report = json!({
            "output": output.display().to_string(),
            "records": summary.record_count(),
            "workouts": summary.workout_count(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Imported {} records and {} workouts from {}",
        "✓".green(),
        summary.record_count(),
        summary.workout_count(),
        file.display()
    );
    if let Some(social) = &record.social_history {
        print_rated("Exercise", social.exercise.as_ref());
        print_rated("Sleep", social.sleep.as_ref());
    }
    println!("  Patient record written to {}", output.display().to_string().bold());
    Ok(())
}

fn print_rated(label: &str, rated: Option<&RatedRecommendation>) {
    if let Some(rated) = rated {
        println!(
            "  {:<9} {} {}",
            label,
            rated.description,
            format!("({}/10)", rated.rating).dimmed()
        );
    }
}
