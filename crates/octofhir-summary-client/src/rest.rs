//! REST-backed providers
//!
//! One client serves all three provider roles against the same FHIR base
//! URL: searches return Bundle entries (following paging links), value sets
//! expand through `$expand`, and summary records upsert keyed by identifier.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use octofhir_summary_model::{
    ClientError, QueryClient, QueryOutcome, SummaryStore, TerminologyClient,
};
use octofhir_summary_types::{Coding, SummaryRecord};

/// A FHIR REST endpoint acting as query source, terminology source and
/// summary destination
pub struct RestClient {
    base_url: String,
    http: reqwest::Client,
    auth_token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
            auth_token: None,
        }
    }

    /// Attach a bearer token to every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|err| ClientError::request(err.to_string()))
    }

    async fn get_json(&self, path: &str) -> Result<Option<Value>, ClientError> {
        let response = self.get(path).await?;
        if !response.status().is_success() {
            debug!(path, status = %response.status(), "search unsuccessful");
            return Ok(None);
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|err| ClientError::payload(err.to_string()))
    }

    async fn send_record(
        &self,
        record: &SummaryRecord,
        existing_id: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut body = serde_json::to_value(record)
            .map_err(|err| ClientError::Internal(err.to_string()))?;

        let request = match existing_id {
            Some(id) => {
                body["id"] = Value::String(id.to_string());
                self.http.put(self.url(&format!("Observation/{id}")))
            }
            None => self.http.post(self.url("Observation")),
        };
        let mut request = request.json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|err| ClientError::request(err.to_string()))
    }
}

#[async_trait]
impl QueryClient for RestClient {
    async fn query(&self, filter: &str) -> Result<QueryOutcome, ClientError> {
        let Some(mut bundle) = self.get_json(filter).await? else {
            return Ok(QueryOutcome::unavailable());
        };

        let mut entries = bundle_resources(&bundle);
        // follow paging links until the bundle runs dry
        while let Some(next) = next_link(&bundle) {
            match self.get_json(&next).await? {
                Some(page) => {
                    entries.extend(bundle_resources(&page));
                    bundle = page;
                }
                None => break,
            }
        }

        Ok(QueryOutcome::of(entries))
    }
}

#[async_trait]
impl TerminologyClient for RestClient {
    async fn expand(&self, value_set_ref: &str) -> Result<Vec<Coding>, ClientError> {
        let expansion = self
            .get_json(&format!("{value_set_ref}/$expand"))
            .await?
            .ok_or_else(|| {
                ClientError::request(format!("expansion of {value_set_ref} unavailable"))
            })?;

        let contains = expansion
            .get("expansion")
            .and_then(|expansion| expansion.get("contains"))
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::payload("expansion carries no contains list"))?;

        Ok(contains.iter().filter_map(Coding::from_resource).collect())
    }
}

#[async_trait]
impl SummaryStore for RestClient {
    async fn upsert(&self, record: &SummaryRecord) -> Result<(), ClientError> {
        let (system, value) = record
            .identifier_key()
            .ok_or_else(|| ClientError::Internal("record without identifier".to_string()))?;

        // identifier-keyed upsert: find the existing record, replace it,
        // otherwise create a new one
        let existing = self
            .get_json(&format!("Observation?identifier={system}|{value}"))
            .await?
            .map(|bundle| bundle_resources(&bundle))
            .unwrap_or_default();
        let existing_id = existing
            .first()
            .and_then(|resource| resource.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if existing_id.is_some() {
            debug!(value, "replacing existing summary record");
        }

        let response = self.send_record(record, existing_id.as_deref()).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(value, %status, "store rejected summary record");
            Err(ClientError::Rejected {
                identifier: value.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

fn bundle_resources(bundle: &Value) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn next_link(bundle: &Value) -> Option<String> {
    bundle
        .get("link")?
        .as_array()?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))
        .and_then(|link| link.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
