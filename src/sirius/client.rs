use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::sirius::models::*;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Could not launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("SIRIUS exited before it was ready ({0})")]
    Exited(ExitStatus),

    #[error("SIRIUS did not become ready within {0} seconds")]
    StartupTimeout(u64),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {endpoint} returned {status}: {body}")]
    Status {
        method: Method,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Job {job_id} ended as {state}{}", reason(.message))]
    JobFailed {
        job_id: String,
        state: JobState,
        message: Option<String>,
    },

    #[error("Job {job_id} did not finish within {seconds} seconds")]
    JobTimeout { job_id: String, seconds: u64 },

    #[error("Process error: {0}")]
    Process(#[from] std::io::Error),
}

fn reason(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
}

/// The SIRIUS REST calls the pipeline depends on.
pub trait SiriusApi {
    fn is_logged_in(&self) -> Result<bool, EngineError>;

    fn login(&self, credentials: &Credentials) -> Result<(), EngineError>;

    /// Creates (or opens) the project stored at `location`.
    fn create_project(&self, project_id: &str, location: &Path) -> Result<ProjectInfo, EngineError>;

    fn import_features(
        &self,
        project_id: &str,
        profile: &str,
        features: &[FeatureImport],
    ) -> Result<(), EngineError>;

    fn default_job_config(&self) -> Result<Value, EngineError>;

    fn start_job(&self, project_id: &str, submission: &Value) -> Result<Job, EngineError>;

    fn job(&self, project_id: &str, job_id: &str) -> Result<Job, EngineError>;

    /// Aligned features with their top annotations.
    fn aligned_features(&self, project_id: &str) -> Result<Vec<AlignedFeature>, EngineError>;

    /// Ranked formula candidates with statistics and compound classes.
    fn formula_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError>;

    fn structure_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError>;

    fn de_novo_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError>;
}

pub struct SiriusClient {
    http: Client,
    base_url: String,
}

impl SiriusClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, EngineError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(SiriusClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, endpoint))
    }

    fn send(&self, request: RequestBuilder, method: Method, endpoint: &str) -> Result<Response, EngineError> {
        debug!("{} {}", method, endpoint);
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(EngineError::Status {
            method,
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, EngineError> {
        let request = self.request(Method::GET, endpoint).query(query);
        Ok(self.send(request, Method::GET, endpoint)?.json()?)
    }

    /// True once the REST service answers its health probe within `timeout`.
    pub fn is_healthy(&self, timeout: Duration) -> bool {
        self.request(Method::GET, "/actuator/health")
            .timeout(timeout)
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    pub fn shutdown(&self) -> Result<(), EngineError> {
        let endpoint = "/actuator/shutdown";
        self.send(self.request(Method::POST, endpoint), Method::POST, endpoint)?;
        Ok(())
    }

    fn candidates(&self, project_id: &str, feature_id: &str, kind: &str, opt_fields: &[&str]) -> Result<Vec<Value>, EngineError> {
        let endpoint = format!("/api/projects/{}/aligned-features/{}/{}", project_id, feature_id, kind);
        let query: Vec<(&str, &str)> = opt_fields.iter().map(|field| ("optFields", *field)).collect();
        self.get(&endpoint, &query)
    }
}

impl SiriusApi for SiriusClient {
    fn is_logged_in(&self) -> Result<bool, EngineError> {
        self.get("/api/account/isLoggedIn", &[])
    }

    fn login(&self, credentials: &Credentials) -> Result<(), EngineError> {
        let endpoint = "/api/account/login";
        let request = self
            .request(Method::POST, endpoint)
            .query(&[
                ("acceptTerms", "true"),
                ("failWhenLoggedIn", "false"),
                ("includeSubs", "false"),
            ])
            .json(credentials);
        self.send(request, Method::POST, endpoint)?;
        Ok(())
    }

    fn create_project(&self, project_id: &str, location: &Path) -> Result<ProjectInfo, EngineError> {
        let endpoint = format!("/api/projects/{}", project_id);
        let location = location.to_string_lossy();
        let request = self
            .request(Method::PUT, &endpoint)
            .query(&[("pathToProject", location.as_ref())]);
        Ok(self.send(request, Method::PUT, &endpoint)?.json()?)
    }

    fn import_features(
        &self,
        project_id: &str,
        profile: &str,
        features: &[FeatureImport],
    ) -> Result<(), EngineError> {
        let endpoint = format!("/api/projects/{}/aligned-features", project_id);
        let request = self
            .request(Method::POST, &endpoint)
            .query(&[("profile", profile), ("optFields", "msData")])
            .json(features);
        self.send(request, Method::POST, &endpoint)?;
        Ok(())
    }

    fn default_job_config(&self) -> Result<Value, EngineError> {
        self.get("/api/default-job-config", &[])
    }

    fn start_job(&self, project_id: &str, submission: &Value) -> Result<Job, EngineError> {
        let endpoint = format!("/api/projects/{}/jobs", project_id);
        let request = self
            .request(Method::POST, &endpoint)
            .query(&[("optFields", "progress")])
            .json(submission);
        Ok(self.send(request, Method::POST, &endpoint)?.json()?)
    }

    fn job(&self, project_id: &str, job_id: &str) -> Result<Job, EngineError> {
        let endpoint = format!("/api/projects/{}/jobs/{}", project_id, job_id);
        self.get(&endpoint, &[("optFields", "progress")])
    }

    fn aligned_features(&self, project_id: &str) -> Result<Vec<AlignedFeature>, EngineError> {
        let endpoint = format!("/api/projects/{}/aligned-features", project_id);
        self.get(&endpoint, &[("optFields", "topAnnotations")])
    }

    fn formula_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError> {
        self.candidates(project_id, feature_id, "formulas", &["statistics", "compoundClasses"])
    }

    fn structure_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError> {
        self.candidates(project_id, feature_id, "structures", &["dbLinks"])
    }

    fn de_novo_candidates(&self, project_id: &str, feature_id: &str) -> Result<Vec<Value>, EngineError> {
        self.candidates(project_id, feature_id, "denovo-structures", &["dbLinks"])
    }
}
