//! HTTP client for the bot backend.
//!
//! Covers the profile endpoints, the run trigger and the status snapshot. Calls carry no
//! request timeout and are never retried; only the TCP connect phase is bounded.

use crate::model::{BotStatus, PanelConfig, Profile, ProfileRecord, RunRequest};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("{0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid endpoint URL: {0}")]
    Url(String),
}

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(cfg: &PanelConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&cfg.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base URL {:?}: {e}", cfg.base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("base URL {:?} cannot carry a path", cfg.base_url);
        }
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(self.base.to_string()))?;
            path.pop_if_empty();
            for s in segments {
                path.push(s);
            }
        }
        Ok(url)
    }

    /// `GET /profiles`, keeping the server's key order.
    pub async fn list_profiles(&self) -> Result<Vec<(String, ProfileRecord)>, ApiError> {
        let url = self.endpoint(&["profiles"])?;
        debug!(%url, "listing profiles");
        let map: serde_json::Map<String, serde_json::Value> =
            read_json(check(self.http.get(url).send().await?).await?).await?;
        Ok(map
            .into_iter()
            .map(|(name, v)| (name, serde_json::from_value(v).unwrap_or_default()))
            .collect())
    }

    pub async fn save_profile(&self, profile: &Profile) -> Result<(), ApiError> {
        let url = self.endpoint(&["profiles"])?;
        debug!(%url, name = %profile.name, "saving profile");
        check(self.http.post(url).json(profile).send().await?).await?;
        Ok(())
    }

    pub async fn delete_profile(&self, name: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["profiles", name])?;
        debug!(%url, "deleting profile");
        check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    /// `POST /run`. Success bodies are not inspected.
    pub async fn start_run(&self, req: &RunRequest) -> Result<(), ApiError> {
        let url = self.endpoint(&["run"])?;
        debug!(%url, post_url = %req.post_url, run_id = ?req.run_id, "starting run");
        check(self.http.post(url).json(req).send().await?).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<BotStatus, ApiError> {
        let url = self.endpoint(&["status"])?;
        read_json(check(self.http.get(url).send().await?).await?).await
    }
}

/// Turn non-2xx responses into `ApiError::Rejected`, using the body's `error` field when present.
async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Rejected {
        status,
        message: rejection_message(status, &body),
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    Ok(resp.json::<T>().await?)
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
