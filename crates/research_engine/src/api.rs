use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use research_core::{
    JobId, JobListPayload, JobSummary, ResultPayload, StartJobResponse, StatusSnapshot,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::{ApiError, ApiFailureKind};

pub const DEFAULT_BASE_URL: &str = "http://localhost:7071";
pub const DEFAULT_USER_ID: &str = "anonymous";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub user_id: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// The remote deep-research job service.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn start_job(&self, query: &str) -> Result<JobId, ApiError>;
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError>;
    async fn fetch_result(&self, job_id: &str) -> Result<ResultPayload, ApiError>;
    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ApiError>;
}

#[derive(Serialize)]
struct StartRequest<'a> {
    query: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReqwestJobApi {
    settings: ApiSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestJobApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let mut base = settings.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base)
            .map_err(|err| ApiError::new(ApiFailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiFailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::new(ApiFailureKind::InvalidUrl, err.to_string()))
    }

    fn job_endpoint(&self, action: &str, job_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&format!(
            "api/research/{action}/{}",
            urlencoding::encode(job_id)
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                ApiFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    ApiFailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    ApiFailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|err| ApiError::malformed(err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestJobApi {
    async fn start_job(&self, query: &str) -> Result<JobId, ApiError> {
        let url = self.endpoint("api/research/start")?;
        let body = serde_json::to_vec(&StartRequest {
            query,
            user_id: &self.settings.user_id,
        })
        .map_err(|err| ApiError::malformed(err.to_string()))?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let started: StartJobResponse = self.read_json(response).await?;
        started
            .job_id
            .ok_or_else(|| ApiError::malformed("start response has no job_id"))
    }

    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        self.get_json(self.job_endpoint("status", job_id)?).await
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultPayload, ApiError> {
        self.get_json(self.job_endpoint("result", job_id)?).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ApiError> {
        let payload: JobListPayload = self.get_json(self.endpoint("api/research/jobs")?).await?;
        payload
            .jobs
            .ok_or_else(|| ApiError::malformed("job list has no jobs array"))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiFailureKind::Timeout, err.to_string());
    }
    ApiError::new(ApiFailureKind::Network, err.to_string())
}
