//! services/api/src/adapters/atcoder_problems.rs
//!
//! This module contains the adapter for the public AtCoder Problems API. It
//! implements the catalog, difficulty model and submission history ports from
//! the `core` crate with plain GET requests through `reqwest`.

use async_trait::async_trait;
use problem_dojo_core::domain::{CatalogEntry, DifficultyModels, Submission};
use problem_dojo_core::ports::{
    DifficultyModelService, PortError, PortResult, ProblemCatalogService,
    SubmissionHistoryService,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the public problem API ports over HTTP.
#[derive(Clone)]
pub struct AtCoderProblemsAdapter {
    client: Client,
    problems_url: String,
    problem_models_url: String,
    submissions_url: String,
}

impl AtCoderProblemsAdapter {
    /// Creates a new `AtCoderProblemsAdapter`.
    pub fn new(
        client: Client,
        problems_url: impl Into<String>,
        problem_models_url: impl Into<String>,
        submissions_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            problems_url: problems_url.into(),
            problem_models_url: problem_models_url.into(),
            submissions_url: submissions_url.into(),
        }
    }

    /// Builds an HTTP client with a per-request timeout.
    pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .user_agent(concat!("problem-dojo/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = request.send().await.map_err(|e| {
            error!("Request to the problem API failed: {}", e);
            PortError::Unexpected(e.to_string())
        })?;

        let url = response.url().to_string();
        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(PortError::Unauthorized),
            StatusCode::NOT_FOUND => return Err(PortError::NotFound(url)),
            status => {
                error!("Problem API returned {} for {}", status, url);
                return Err(PortError::Unexpected(format!("HTTP {} from {}", status, url)));
            }
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response from {}: {}", url, e)))
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct ProblemRecord {
    id: String,
    contest_id: String,
    title: String,
}
impl ProblemRecord {
    fn to_domain(self) -> CatalogEntry {
        CatalogEntry {
            id: self.id,
            contest_id: self.contest_id,
            title: self.title,
        }
    }
}

#[derive(Deserialize)]
struct ProblemModelRecord {
    #[serde(default)]
    difficulty: Option<f64>,
}

#[derive(Deserialize)]
struct SubmissionRecord {
    problem_id: String,
    result: String,
    epoch_second: i64,
}
impl SubmissionRecord {
    fn to_domain(self) -> Submission {
        Submission {
            problem_id: self.problem_id,
            result: self.result,
            epoch_second: self.epoch_second,
        }
    }
}

fn models_to_domain(records: HashMap<String, ProblemModelRecord>) -> DifficultyModels {
    records
        .into_iter()
        .map(|(id, model)| (id, model.difficulty))
        .collect()
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl ProblemCatalogService for AtCoderProblemsAdapter {
    async fn fetch_catalog(&self) -> PortResult<Vec<CatalogEntry>> {
        let records: Vec<ProblemRecord> =
            self.get_json(self.client.get(&self.problems_url)).await?;
        debug!("Fetched {} catalog entries", records.len());
        Ok(records.into_iter().map(ProblemRecord::to_domain).collect())
    }
}

#[async_trait]
impl DifficultyModelService for AtCoderProblemsAdapter {
    async fn fetch_difficulties(&self) -> PortResult<DifficultyModels> {
        let records: HashMap<String, ProblemModelRecord> =
            self.get_json(self.client.get(&self.problem_models_url)).await?;
        Ok(models_to_domain(records))
    }
}

#[async_trait]
impl SubmissionHistoryService for AtCoderProblemsAdapter {
    async fn fetch_submissions(
        &self,
        atcoder_id: &str,
        from_second: i64,
    ) -> PortResult<Vec<Submission>> {
        let request = self
            .client
            .get(&self.submissions_url)
            .query(&[("user", atcoder_id.to_string()), ("from_second", from_second.to_string())]);
        let records: Vec<SubmissionRecord> = self.get_json(request).await?;
        Ok(records.into_iter().map(SubmissionRecord::to_domain).collect())
    }
}
