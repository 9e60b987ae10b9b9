//! Run phase tracking
//!
//! The orchestrator moves a run through its phases and records every transition.
//! The record, together with the per-feed push reports, can be written as a JSON
//! run report (atomic write).

use crate::core::traits::FeedPushReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Phase of a publication run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Initial,
    Planning,
    Building,
    Publishing,
    Success,
    NothingToPublish,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::NothingToPublish | Self::Failed)
    }
}

/// Phase transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub timestamp: DateTime<Utc>,
}

/// Serialized run report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub current_phase: RunPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub transitions: Vec<PhaseTransition>,
    pub feeds: Vec<FeedPushReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Phase machine of one run
pub struct RunStateMachine {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    current_phase: RunPhase,
    transitions: Vec<PhaseTransition>,
    version: Option<String>,
    channel: Option<String>,
    feeds: Vec<FeedPushReport>,
    error: Option<String>,
}

impl RunStateMachine {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            current_phase: RunPhase::Initial,
            transitions: Vec::new(),
            version: None,
            channel: None,
            feeds: Vec::new(),
            error: None,
        }
    }

    pub fn transition(&mut self, to: RunPhase) {
        debug!(run_id = %self.run_id, from = ?self.current_phase, to = ?to, "run phase");
        self.transitions.push(PhaseTransition {
            from: self.current_phase,
            to,
            timestamp: Utc::now(),
        });
        self.current_phase = to;
    }

    /// Move to [`RunPhase::Failed`], keeping the error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.transition(RunPhase::Failed);
    }

    pub fn set_version(&mut self, version: impl Into<String>, channel: impl Into<String>) {
        self.version = Some(version.into());
        self.channel = Some(channel.into());
    }

    pub fn set_feed_reports(&mut self, feeds: Vec<FeedPushReport>) {
        self.feeds = feeds;
    }

    pub fn phase(&self) -> RunPhase {
        self.current_phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn record(&self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            started_at: self.started_at,
            current_phase: self.current_phase,
            version: self.version.clone(),
            channel: self.channel.clone(),
            transitions: self.transitions.clone(),
            feeds: self.feeds.clone(),
            error: self.error.clone(),
        }
    }

    /// Milliseconds between the run start and the last transition
    pub fn elapsed_ms(&self) -> i64 {
        self.transitions
            .last()
            .map_or(0, |last| (last.timestamp - self.started_at).num_milliseconds())
    }

    /// Transition history as human-readable lines
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {:?} → {:?}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the run report as JSON (temp file, then rename)
    pub async fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.record())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let temp_file = path.with_extension("json.tmp");
        fs::write(&temp_file, json).await?;
        fs::rename(&temp_file, path).await?;
        Ok(())
    }
}
