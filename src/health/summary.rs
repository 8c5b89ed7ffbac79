//! Folding HealthKit records into a patient record

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};

/// Trailing window for workout and sleep trends
const RECENT_DAYS: i64 = 30;

const WEEKS_PER_WINDOW: f64 = 4.3;

const NOT_AVAILABLE: &str = "Not available in HealthKit";

const BODY_MASS: &str = "HKQuantityTypeIdentifierBodyMass";
const HEIGHT: &str = "HKQuantityTypeIdentifierHeight";
const SYSTOLIC: &str = "HKQuantityTypeIdentifierBloodPressureSystolic";
const HEART_RATE: &str = "HKQuantityTypeIdentifierHeartRate";
const BLOOD_GLUCOSE: &str = "HKQuantityTypeIdentifierBloodGlucose";
const CHOLESTEROL: &str = "HKQuantityTypeIdentifierDietaryCholesterol";
const SLEEP_ANALYSIS: &str = "HKCategoryTypeIdentifierSleepAnalysis";
const WORKOUT_PREFIX: &str = "HKWorkoutActivityType";

const TRACKED: &[&str] = &[
    BODY_MASS,
    HEIGHT,
    SYSTOLIC,
    HEART_RATE,
    BLOOD_GLUCOSE,
    CHOLESTEROL,
];

/// One `<Record>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthRecord {
    pub kind: String,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// One `<Workout>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workout {
    pub activity: String,
    pub start: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
struct Reading {
    at: NaiveDateTime,
    value: f64,
    unit: Option<String>,
}

/// Running summary of an export.
///
/// Elements are folded in one at a time so a multi-gigabyte export never has
/// to sit in memory. Dates are wall-clock times with the offset dropped.
#[derive(Debug)]
pub struct HealthSummary {
    now: NaiveDateTime,
    records: usize,
    workouts: usize,
    latest: HashMap<&'static str, Reading>,
    recent_workouts: HashMap<String, usize>,
    sleep_records: usize,
    nightly_sleep_hours: BTreeMap<NaiveDate, f64>,
}

impl HealthSummary {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            records: 0,
            workouts: 0,
            latest: HashMap::new(),
            recent_workouts: HashMap::new(),
            sleep_records: 0,
            nightly_sleep_hours: BTreeMap::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn workout_count(&self) -> usize {
        self.workouts
    }

    fn cutoff(&self) -> NaiveDateTime {
        self.now - Duration::days(RECENT_DAYS)
    }

    pub fn add_record(&mut self, record: HealthRecord) {
        self.records += 1;

        if record.kind == SLEEP_ANALYSIS {
            self.add_sleep(&record);
            return;
        }

        let Some(kind) = TRACKED.iter().copied().find(|k| *k == record.kind) else {
            return;
        };
        let (Some(at), Some(value)) = (record.start, record.value) else {
            return;
        };
        // Ties keep the first reading seen
        let newer = self.latest.get(kind).is_none_or(|r| at > r.at);
        if newer {
            self.latest.insert(
                kind,
                Reading {
                    at,
                    value,
                    unit: record.unit,
                },
            );
        }
    }

    fn add_sleep(&mut self, record: &HealthRecord) {
        self.sleep_records += 1;
        let Some(start) = record.start else {
            return;
        };
        if start <= self.cutoff() {
            return;
        }
        let hours = record
            .end
            .map(|end| (end - start).num_seconds() as f64 / 3600.0)
            .unwrap_or(0.0);
        *self.nightly_sleep_hours.entry(start.date()).or_default() += hours;
    }

    pub fn add_workout(&mut self, workout: Workout) {
        self.workouts += 1;
        if workout.start.is_some_and(|start| start > self.cutoff()) {
            *self.recent_workouts.entry(workout.activity).or_default() += 1;
        }
    }

    fn latest_whole(&self, kind: &str) -> i64 {
        self.latest.get(kind).map_or(0, |r| r.value as i64)
    }

    /// Height in inches; exports without a unit are in feet
    fn height_inches(&self) -> i64 {
        let Some(reading) = self.latest.get(HEIGHT) else {
            return 0;
        };
        let factor = match reading.unit.as_deref() {
            Some("in") => 1.0,
            Some("cm") => 1.0 / 2.54,
            Some("m") => 100.0 / 2.54,
            _ => 12.0,
        };
        (reading.value * factor) as i64
    }

    pub fn measurements(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("weight".to_string(), json!(self.latest_whole(BODY_MASS)));
        m.insert("height".to_string(), json!(self.height_inches()));
        m.insert("blood_pressure".to_string(), json!(self.latest_whole(SYSTOLIC)));
        m.insert("blood_sugar".to_string(), json!(self.latest_whole(BLOOD_GLUCOSE)));
        m.insert("cholesterol".to_string(), json!(self.latest_whole(CHOLESTEROL)));
        m.insert("hdl".to_string(), json!(0));
        m.insert("ldl".to_string(), json!(0));
        m.insert("triglycerides".to_string(), json!(0));

        let heart_rate = self.latest_whole(HEART_RATE);
        if heart_rate != 0 {
            m.insert("resting_heart_rate".to_string(), json!(heart_rate));
        }
        m
    }

    /// Workout frequency over the last 30 days, rated 0-9
    pub fn exercise(&self) -> Value {
        if self.workouts == 0 {
            return rated("No workout data", 0);
        }
        let count: usize = self.recent_workouts.values().sum();
        if count == 0 {
            return rated("No recent workout data", 0);
        }

        let weekly = count as f64 / WEEKS_PER_WINDOW;
        let (rating, frequency) = if weekly >= 5.0 {
            (9, "5+ times/week")
        } else if weekly >= 3.0 {
            (8, "3-4 times/week")
        } else if weekly >= 1.0 {
            (6, "1-2 times/week")
        } else {
            (3, "Less than weekly")
        };

        let most_common = self
            .recent_workouts
            .iter()
            .filter(|(activity, _)| !activity.is_empty())
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(activity, _)| activity.trim_start_matches(WORKOUT_PREFIX));

        match most_common {
            Some(activity) => rated(&format!("{} {}", activity, frequency), rating),
            None => rated(frequency, rating),
        }
    }

    /// Average nightly sleep over the last 30 days, rated 4-9
    pub fn sleep(&self) -> Value {
        if self.sleep_records == 0 {
            return rated("No sleep data", 5);
        }
        if self.nightly_sleep_hours.is_empty() {
            return rated("No recent sleep data", 5);
        }

        let total: f64 = self.nightly_sleep_hours.values().sum();
        let average = total / self.nightly_sleep_hours.len() as f64;
        let rating = if average >= 7.5 {
            9
        } else if average >= 6.5 {
            8
        } else if average >= 5.5 {
            6
        } else {
            4
        };
        rated(&format!("{:.1} hours/night", average), rating)
    }

    /// The full patient record
    pub fn to_value(&self) -> Value {
        json!({
            "data_source": "apple_health",
            "social_history": {
                "food": NOT_AVAILABLE,
                "exercise": self.exercise(),
                "drugs": NOT_AVAILABLE,
                "tobacco": NOT_AVAILABLE,
                "alcohol": rated(NOT_AVAILABLE, 0),
                "sleep": self.sleep(),
                "occupation": NOT_AVAILABLE,
                "sexual_history": NOT_AVAILABLE,
            },
            "medical_history": {
                "conditions": [],
                "immunizations": [],
                "health_maintenance": {},
            },
            "allergies": [],
            "surgical_history": [],
            "hospitalizations": [],
            "family_history": { "mother": [], "father": [], "siblings": [] },
            "medications": [],
            "pcp": {
                "name": NOT_AVAILABLE,
                "clinic": "",
                "address": "",
                "phone": "",
                "email": "",
                "last_visit": "",
            },
            "forecast": {
                "life_expectancy_years": 0,
                "cardiovascular_event_10yr_probability": 0,
                "energy_level": "Unknown",
                "metabolic_disease_risk": "Unknown",
                "dementia_risk": "Unknown",
                "last_updated": self.now.format("%Y-%m-%d").to_string(),
            },
            "measurements": self.measurements(),
        })
    }
}

fn rated(description: &str, rating: u8) -> Value {
    json!({ "description": description, "rating": rating })
}
