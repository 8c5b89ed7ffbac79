//! Client for the remote recommendation ("visit-crew") service

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;

use super::RecommendationApi;
use super::models::VisitResponse;
use crate::error::{ApiError, Result};

/// Forwards a patient record to `POST {base}/visit-crew`.
///
/// The service is treated as one atomic call: no retries, no backoff.
pub struct RecommendationClient {
    http: HttpClient,
    base_url: String,
}

impl RecommendationClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RecommendationApi for RecommendationClient {
    async fn visit(&self, record: &Value) -> Result<VisitResponse> {
        let url = format!("{}/visit-crew", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let visit = response.json::<VisitResponse>().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse visit response: {}", e))
        })?;

        let missing = visit.missing_sections();
        if !missing.is_empty() {
            log::warn!("Visit response is missing: {}", missing.join(", "));
        }

        Ok(visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_visit_forwards_record_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let record = json!({
            "social_history": { "occupation": "Software engineer - sedentary" },
            "medications": [{ "name": "Lisinopril", "dose": "10mg daily" }]
        });
        let mock = server
            .mock("POST", "/visit-crew")
            .match_body(Matcher::Json(record.clone()))
            .with_status(200)
            .with_body(
                json!({
                    "social_history": { "occupation": "Software engineer - sedentary" },
                    "recommendations": {
                        "alcohol": { "description": "Keep at 2 drinks/week", "rating": 7 },
                        "sleep": { "description": "7-8h nightly", "rating": 8 },
                        "exercise": { "description": "150 min/week", "rating": 9 },
                        "supplements": [{ "description": "Omega-3 1g daily", "rating": 6 }]
                    },
                    "forecast": { "life_expectancy_years": 84.1 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = RecommendationClient::new(server.url()).unwrap();
        let visit = client.visit(&record).await.unwrap();

        assert_eq!(visit.recommendations.supplements.len(), 1);
        assert!(visit.forecast().is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_reported_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/visit-crew")
            .with_status(500)
            .with_body("crew timed out")
            .expect(1)
            .create_async()
            .await;

        let client = RecommendationClient::new(server.url()).unwrap();
        let result = client.visit(&json!({})).await;

        assert!(matches!(
            result,
            Err(Error::Api(ApiError::Status { status: 500, .. }))
        ));
        mock.assert_async().await;
    }
}
