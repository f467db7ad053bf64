//! Scene narration via an external generative service.
//!
//! Narration is auxiliary: distance estimation is safety-relevant, the
//! narrative text is not. The pipeline therefore never propagates a
//! narrator failure; it substitutes `FALLBACK_DESCRIPTION` and carries on.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::frame::Frame;

/// Substituted when the narrator call fails for any reason.
pub const FALLBACK_DESCRIPTION: &str = "failed to describe scene";

const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Scene narrator interface: an opaque, possibly slow, possibly failing
/// remote collaborator.
pub trait SceneNarrator: Send {
    fn name(&self) -> &'static str;

    /// Produce a natural-language description of the frame.
    fn describe(&self, frame: &Frame) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    description: String,
}

/// HTTP narrator: POSTs the JPEG-encoded frame to a captioning endpoint
/// and expects `{"description": "..."}` back.
pub struct HttpNarrator {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpNarrator {
    pub fn new(endpoint: &str, timeout_secs: Option<u64>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse narrator endpoint")?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported narrator scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }
}

impl SceneNarrator for HttpNarrator {
    fn name(&self) -> &'static str {
        "http"
    }

    fn describe(&self, frame: &Frame) -> Result<String> {
        let jpeg = frame.to_jpeg()?;
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Content-Type", "image/jpeg")
            .send_bytes(&jpeg)
            .context("narrator request failed")?;
        let raw = response
            .into_string()
            .context("narrator response was not readable")?;
        let parsed: DescribeResponse =
            serde_json::from_str(&raw).context("narrator returned malformed JSON")?;
        if parsed.description.trim().is_empty() {
            return Err(anyhow!("narrator returned an empty description"));
        }
        Ok(parsed.description)
    }
}

/// Fixed-output narrator for tests and offline deployments.
pub struct StaticNarrator {
    text: String,
}

impl StaticNarrator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl SceneNarrator for StaticNarrator {
    fn name(&self) -> &'static str {
        "static"
    }

    fn describe(&self, _frame: &Frame) -> Result<String> {
        Ok(self.text.clone())
    }
}
