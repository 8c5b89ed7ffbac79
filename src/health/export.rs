//! Reading Health app `export.zip` archives

use chrono::{DateTime, NaiveDateTime};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use super::summary::{HealthRecord, HealthSummary, Workout};
use crate::error::HealthImportError;

type Result<T> = std::result::Result<T, HealthImportError>;

/// Name of the XML document inside the archive, possibly under a folder
const EXPORT_FILE: &str = "export.xml";

/// Summarize the export at `path` as of `now`
pub fn read_export(path: &Path, now: NaiveDateTime) -> Result<HealthSummary> {
    let file = File::open(path).map_err(|e| HealthImportError::Archive(e.to_string()))?;
    read_archive(file, now)
}

pub fn read_archive<R: Read + Seek>(reader: R, now: NaiveDateTime) -> Result<HealthSummary> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let name = archive
        .file_names()
        .find(|name| name.ends_with(EXPORT_FILE))
        .map(str::to_string)
        .ok_or(HealthImportError::MissingExport)?;

    log::debug!("Reading {} from health export", name);
    let entry = archive.by_name(&name)?;
    parse_export(BufReader::new(entry), now)
}

/// Stream `<Record>` and `<Workout>` elements into a summary
pub fn parse_export<R: BufRead>(input: R, now: NaiveDateTime) -> Result<HealthSummary> {
    let mut reader = Reader::from_reader(input);
    let mut summary = HealthSummary::new(now);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"Record" => summary.add_record(record_from(&e)?),
                b"Workout" => summary.add_workout(workout_from(&e)?),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    log::info!(
        "Read {} records and {} workouts",
        summary.record_count(),
        summary.workout_count()
    );
    Ok(summary)
}

fn record_from(element: &BytesStart<'_>) -> Result<HealthRecord> {
    let mut record = HealthRecord::default();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| HealthImportError::Xml(e.to_string()))?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"type" => record.kind = value.into_owned(),
            b"unit" => record.unit = Some(value.into_owned()),
            b"value" => {
                record.value = value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
            }
            b"startDate" => record.start = parse_date(&value),
            b"endDate" => record.end = parse_date(&value),
            _ => {}
        }
    }
    Ok(record)
}

fn workout_from(element: &BytesStart<'_>) -> Result<Workout> {
    let mut workout = Workout::default();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| HealthImportError::Xml(e.to_string()))?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"workoutActivityType" => workout.activity = value.into_owned(),
            b"startDate" => workout.start = parse_date(&value),
            _ => {}
        }
    }
    Ok(workout)
}

/// Wall-clock time of a HealthKit date such as `2025-05-30 23:00:00 -0700`
fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| dt.naive_local())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_local()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
