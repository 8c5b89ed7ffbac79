use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

fn write_config(temp: &Path, extra: &str) -> PathBuf {
    let path = temp.join("config.yaml");
    let contents = format!(
        "cache_dir: {}\nproxy_url: http://127.0.0.1:9\n{extra}",
        temp.join("cache").display()
    );
    fs::write(&path, contents).expect("failed to write config");
    path
}

/// Command with an isolated home and config
fn med_mirror(temp: &TempDir, config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("med-mirror"));
    cmd.arg("--config")
        .arg(config)
        .env("HOME", temp.path())
        .env_remove("MED_MIRROR_CONFIG")
        .env_remove("MED_MIRROR_FORMAT")
        .env_remove("MED_MIRROR_PROXY_URL")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_photo(temp: &Path) -> PathBuf {
    let path = temp.join("face.png");
    fs::write(&path, PNG_BYTES).expect("failed to write photo");
    path
}

fn write_context(temp: &Path) -> PathBuf {
    let path = temp.join("patient.json");
    fs::write(
        &path,
        r#"{"social_history": {"sleep": {"description": "6 hours", "rating": 5}}}"#,
    )
    .expect("failed to write context");
    path
}

#[test]
fn version_prints_package_version() -> Result<(), Box<dyn std::error::Error>> {
    Command::new(assert_cmd::cargo::cargo_bin!("med-mirror"))
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn status_uses_custom_config_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "recommendation_url: http://crew.local\n");

    let assert = med_mirror(&temp, &config_path)
        .arg("status")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains(&config_path.to_string_lossy().to_string()));
    assert!(stdout.contains("OpenAI API key not configured"));
    assert!(stdout.contains("Recommendation service: http://crew.local"));
    assert!(stdout.contains("No cached photo"));

    Ok(())
}

#[test]
fn status_reports_key_from_environment() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");

    med_mirror(&temp, &config_path)
        .env("OPENAI_API_KEY", "sk-test")
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"api_key_source\": \"OPENAI_API_KEY\""));

    Ok(())
}

#[test]
fn invalid_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "generation:\n  size: 1024x512\n");

    med_mirror(&temp, &config_path)
        .args(["cache", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("square"));

    Ok(())
}

#[test]
fn upload_caches_photo_and_clear_removes_it() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let photo = write_photo(temp.path());

    med_mirror(&temp, &config_path)
        .arg("upload")
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Photo cached"));

    med_mirror(&temp, &config_path)
        .args(["cache", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cached\": true"))
        .stdout(predicate::str::contains("image/png"));

    med_mirror(&temp, &config_path)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared cached photo"));

    med_mirror(&temp, &config_path)
        .args(["cache", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached photo"));

    Ok(())
}

#[test]
fn upload_json_reports_component_state() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let photo = write_photo(temp.path());

    med_mirror(&temp, &config_path)
        .args(["upload", "--format", "json"])
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"has_image\""));

    Ok(())
}

#[test]
fn clearing_empty_cache_is_fine() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");

    med_mirror(&temp, &config_path)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache was already empty"));

    Ok(())
}

#[test]
fn upload_rejects_non_image() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let notes = temp.path().join("notes.txt");
    fs::write(&notes, "not a photo")?;

    med_mirror(&temp, &config_path)
        .arg("upload")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only image files can be selected"));

    med_mirror(&temp, &config_path)
        .args(["cache", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cached\": false"));

    Ok(())
}

#[test]
fn predict_without_photo_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let context = write_context(temp.path());

    med_mirror(&temp, &config_path)
        .arg("predict")
        .arg("--context")
        .arg(&context)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Select or capture an image first"));

    Ok(())
}

#[test]
fn predict_writes_forecast_from_proxy() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _predict = server
        .mock("POST", "/api/predict")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("multipart/form-data".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "prediction": "data:image/png;base64,ZnV0dXJl",
                "model_used": "gpt-image-1",
                "timestamp": "2025-06-01T12:00:00Z"
            }"#,
        )
        .expect(1)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let photo = write_photo(temp.path());
    let context = write_context(temp.path());
    let output = temp.path().join("future.png");

    med_mirror(&temp, &config_path)
        .arg("upload")
        .arg(&photo)
        .assert()
        .success();

    med_mirror(&temp, &config_path)
        .arg("predict")
        .arg("--context")
        .arg(&context)
        .arg("--proxy")
        .arg(server.url())
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Forecast saved"));

    assert_eq!(fs::read(&output)?, b"future");
    Ok(())
}

#[test]
fn predict_reports_proxy_failure() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _predict = server
        .mock("POST", "/api/predict")
        .with_status(502)
        .with_body(r#"{"error": "Failed to generate prediction"}"#)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let photo = write_photo(temp.path());
    let context = write_context(temp.path());

    med_mirror(&temp, &config_path)
        .arg("predict")
        .arg("--context")
        .arg(&context)
        .arg("--image")
        .arg(&photo)
        .arg("--proxy")
        .arg(server.url())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to generate prediction"));

    Ok(())
}

fn write_health_export(temp: &Path) -> PathBuf {
    let path = temp.join("export.zip");
    let file = fs::File::create(&path).expect("failed to create export");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(
        "apple_health_export/export.xml",
        zip::write::SimpleFileOptions::default(),
    )
    .expect("failed to start entry");
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
 <Record type="HKQuantityTypeIdentifierBodyMass" unit="lb" startDate="2025-05-20 08:00:00 -0700" endDate="2025-05-20 08:00:00 -0700" value="168.2"/>
</HealthData>
"#,
    )
    .expect("failed to write entry");
    zip.finish().expect("failed to finish export");
    path
}

#[test]
fn import_health_prints_patient_record() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let export = write_health_export(temp.path());

    let assert = med_mirror(&temp, &config_path)
        .arg("import-health")
        .arg(&export)
        .assert()
        .success();

    let record: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(record["data_source"], "apple_health");
    assert_eq!(record["measurements"]["weight"], 168);
    assert_eq!(record["social_history"]["exercise"]["description"], "No workout data");

    Ok(())
}

#[test]
fn import_health_writes_output_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let export = write_health_export(temp.path());
    let output = temp.path().join("patient.json");

    med_mirror(&temp, &config_path)
        .arg("import-health")
        .arg(&export)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 records and 0 workouts"));

    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    assert_eq!(record["measurements"]["weight"], 168);

    Ok(())
}

#[test]
fn import_health_rejects_archive_without_export() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let bogus = temp.path().join("photos.zip");
    let mut zip = zip::ZipWriter::new(fs::File::create(&bogus)?);
    zip.start_file("readme.txt", zip::write::SimpleFileOptions::default())?;
    zip.write_all(b"nothing here")?;
    zip.finish()?;

    med_mirror(&temp, &config_path)
        .arg("import-health")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No export.xml found"));

    Ok(())
}

#[test]
fn recommend_requires_service_url() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let record = write_context(temp.path());

    med_mirror(&temp, &config_path)
        .env_remove("MED_MIRROR_RECOMMENDATION_URL")
        .arg("recommend")
        .arg(&record)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Recommendation service URL not configured",
        ));

    Ok(())
}

#[test]
fn recommend_prints_service_response() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _visit = server
        .mock("POST", "/visit-crew")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "forecast": { "life_expectancy_years": 82.0 },
                "recommendations": {
                    "alcohol": { "description": "Keep it under 3 drinks a week", "rating": 7 },
                    "sleep": { "description": "Aim for 7.5 hours", "rating": 8 },
                    "exercise": { "description": "Add a weekly long walk", "rating": 6 },
                    "supplements": [{ "description": "Omega-3 1g daily", "rating": 5 }]
                }
            }"#,
        )
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "");
    let record = write_context(temp.path());

    med_mirror(&temp, &config_path)
        .arg("recommend")
        .arg(&record)
        .arg("--url")
        .arg(server.url())
        .assert()
        .success()
        .stdout(predicate::str::contains("Aim for 7.5 hours"))
        .stdout(predicate::str::contains("Omega-3 1g daily"));

    Ok(())
}
