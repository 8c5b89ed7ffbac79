//! Request and response shapes for the hosted services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw image bytes plus the metadata needed to upload them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let file_name = format!("image.{}", extension_for(&mime_type));
        Self {
            bytes,
            mime_type,
            file_name,
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// One image-edit call against the generation API
#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub image: ImageUpload,
    pub prompt: String,
    pub model: String,
    /// Square size such as `1024x1024`
    pub size: String,
    /// Rendering quality tier such as `medium`
    pub quality: String,
    /// Number of images; the proxy always asks for one
    pub n: u8,
}

/// Body of `POST /v1/images/edits` responses
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<GeneratedImage>,
}

/// A single generated image
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub b64_json: Option<String>,
}

/// Successful prediction proxy response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    /// Generated forecast as a data URL
    pub prediction: Option<String>,

    /// Model identifier that produced the image
    pub model_used: String,

    /// When the forecast was generated
    pub timestamp: DateTime<Utc>,
}

/// Error body returned by the proxy for every non-200 status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// A recommendation with its projected benefit (1-10)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatedRecommendation {
    pub description: String,
    pub rating: u8,
}

/// Recommendations section added by the visit service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendations {
    pub alcohol: Option<RatedRecommendation>,
    pub sleep: Option<RatedRecommendation>,
    pub exercise: Option<RatedRecommendation>,
    #[serde(default)]
    pub supplements: Vec<RatedRecommendation>,
}

/// Augmented patient record returned by the visit service.
///
/// Fields other than `recommendations` and `evidence_urls` are kept as-is in
/// `record` so the response can be forwarded without loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitResponse {
    pub recommendations: Recommendations,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_urls: Option<Vec<String>>,

    #[serde(flatten)]
    pub record: Map<String, Value>,
}

impl VisitResponse {
    /// Updated forecast, if the service returned one
    pub fn forecast(&self) -> Option<&Value> {
        self.record.get("forecast")
    }

    /// List what a complete visit response is missing
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let recs = &self.recommendations;
        let mut missing = Vec::new();
        if recs.alcohol.is_none() {
            missing.push("alcohol");
        }
        if recs.sleep.is_none() {
            missing.push("sleep");
        }
        if recs.exercise.is_none() {
            missing.push("exercise");
        }
        if recs.supplements.is_empty() {
            missing.push("supplements");
        }
        if self.forecast().is_none() {
            missing.push("forecast");
        }
        missing
    }
}

/// Patient record in the shape the visit service consumes.
///
/// Sections the service does not require are optional, and unknown keys are
/// kept in `extra` so a record round-trips unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_history: Option<SocialHistory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<MedicalHistory>,

    #[serde(default)]
    pub medications: Vec<Medication>,

    #[serde(default)]
    pub allergies: Vec<Allergy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_history: Option<FamilyHistory>,

    /// Latest vitals and labs; values are numbers or strings such as `120/80`
    #[serde(default)]
    pub measurements: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Recommendations>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SocialHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<RatedRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alcohol: Option<RatedRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<RatedRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalHistory {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allergy {
    pub allergen: String,
    #[serde(default)]
    pub reaction: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FamilyHistory {
    #[serde(default)]
    pub mother: Vec<String>,
    #[serde(default)]
    pub father: Vec<String>,
    #[serde(default)]
    pub siblings: Vec<String>,
}

/// Projected outcomes attached to a record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_expectancy_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardiovascular_event_10yr_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metabolic_disease_risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dementia_risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl PatientRecord {
    /// Parse a record, rejecting documents that are not JSON objects
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// One line per populated section, for CLI output
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(history) = &self.medical_history {
            if !history.conditions.is_empty() {
                lines.push(format!("Conditions: {}", history.conditions.join(", ")));
            }
        }
        if !self.medications.is_empty() {
            let meds: Vec<String> = self
                .medications
                .iter()
                .map(|m| format!("{} {}", m.name, m.dose).trim().to_string())
                .collect();
            lines.push(format!("Medications: {}", meds.join(", ")));
        }
        if !self.allergies.is_empty() {
            let allergies: Vec<String> = self
                .allergies
                .iter()
                .map(|a| format!("{} ({})", a.allergen, a.reaction))
                .collect();
            lines.push(format!("Allergies: {}", allergies.join(", ")));
        }
        if let Some(forecast) = &self.forecast {
            if let Some(years) = forecast.life_expectancy_years {
                lines.push(format!("Life expectancy: {:.1} years", years));
            }
        }
        lines
    }
}
