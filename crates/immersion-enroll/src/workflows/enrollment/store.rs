use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::domain::{EnrollmentRecord, NewEnrollment, TrackId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("enrollment record not found")]
    NotFound,
    #[error("enrollment store unavailable: {0}")]
    Unavailable(String),
    #[error("enrollment store returned malformed data: {0}")]
    Malformed(String),
}

/// The hosted table of submitted enrollments. Records are inserted once and
/// deleted only through the admin console; there is no update path and no
/// storage-level uniqueness constraint on the student number.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError>;

    /// Advisory duplicate guard; "no record" is `Ok(false)`, transport
    /// failures propagate.
    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError>;

    /// Full-column scan grouped client-side; tracks without records are
    /// absent from the map.
    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError>;

    /// Every record, newest first.
    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError>;

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;
}

const TABLE: &str = "en_student";

/// PostgREST adapter for the hosted `en_student` table.
pub struct SupabaseEnrollmentStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct ProgramRow {
    #[serde(default)]
    immersion_program: Option<TrackId>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: i64,
}

impl SupabaseEnrollmentStore {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{TABLE}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Unavailable(format!("{status}: {body}")))
    }
}

#[async_trait]
impl EnrollmentStore for SupabaseEnrollmentStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError> {
        let response = self
            .request(reqwest::Method::POST, self.table_url())
            .header("Prefer", "return=representation")
            .json(&vec![enrollment])
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let response = Self::check(response).await?;

        let mut rows: Vec<EnrollmentRecord> = response
            .json()
            .await
            .map_err(|error| StoreError::Malformed(error.to_string()))?;
        rows.pop()
            .ok_or_else(|| StoreError::Malformed("insert returned no rows".to_string()))
    }

    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError> {
        let filter = format!("eq.{student_number}");
        let response = self
            .request(reqwest::Method::GET, self.table_url())
            .query(&[
                ("select", "id"),
                ("student_number", filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let response = Self::check(response).await?;

        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|error| StoreError::Malformed(error.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, self.table_url())
            .query(&[("select", "immersion_program")])
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let response = Self::check(response).await?;

        let rows: Vec<ProgramRow> = response
            .json()
            .await
            .map_err(|error| StoreError::Malformed(error.to_string()))?;

        let mut counts = BTreeMap::new();
        for row in rows {
            if let Some(program) = row.immersion_program {
                *counts.entry(program).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, self.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let response = Self::check(response).await?;

        response
            .json()
            .await
            .map_err(|error| StoreError::Malformed(error.to_string()))
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let filter = format!("eq.{id}");
        let response = self
            .request(reqwest::Method::DELETE, self.table_url())
            .header("Prefer", "return=representation")
            .query(&[("id", filter.as_str())])
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        let response = Self::check(response).await?;

        let rows: Vec<IdRow> = response
            .json()
            .await
            .map_err(|error| StoreError::Malformed(error.to_string()))?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
