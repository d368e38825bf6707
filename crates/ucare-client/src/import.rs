//! Imports from a remote URL
//!
//! The upload API fetches the source itself; the client submits the job and
//! polls its status. Polling is driven by [`PollState`], a pure state machine:
//!
//! - the wait before each poll starts at the base interval
//! - a poll that shows no progress doubles the wait (up to the cap) and counts
//!   as a retry
//! - a poll that shows more progress than the last one resets both
//! - more than `max_retries` stalled polls in a row time out

use crate::client::fetch_uploaded_file;
use crate::config::PollPolicy;
use crate::multipart::{with_signature, UploadOptions};
use crate::transport::{ApiRequest, Transport};
use crate::types::File;
use crate::urls::Endpoints;
use crate::{ClientError, Result};
use reqwest::multipart::Form;
use reqwest::Method;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Status reported for an import job
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Waiting,
    Progress,
    Success,
    Error,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ImportStatus {
    /// No further transitions after this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Failed)
    }
}

/// Snapshot of an import job after one poll
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportJob {
    #[serde(skip)]
    pub token: String,
    pub status: ImportStatus,
    /// Bytes fetched so far
    pub done: Option<u64>,
    /// Total bytes to fetch
    pub total: Option<u64>,
    /// Id of the new file once the job succeeded
    pub file_id: Option<String>,
    /// Same id, as reported by older API versions
    pub uuid: Option<String>,
    /// Server-supplied failure detail
    pub error: Option<String>,
}

impl ImportJob {
    /// Id of the imported file, from whichever field carries it
    pub fn imported_file_id(&self) -> Option<&str> {
        self.file_id.as_deref().or(self.uuid.as_deref())
    }

    /// Fetched percentage, when the server reports both counters
    pub fn percent(&self) -> Option<f64> {
        match (self.done, self.total) {
            (Some(done), Some(total)) if total > 0 => Some(done as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

/// What the poll loop does next
#[derive(Clone, Debug, PartialEq)]
pub enum PollDecision {
    /// Sleep this long, then poll again
    Wait(Duration),
    /// Job finished
    Done,
    /// Job was rejected, with the server's detail
    Fail(Option<String>),
    /// Retry budget exhausted
    Timeout,
}

/// Backoff and retry bookkeeping for one import
#[derive(Clone, Debug)]
pub struct PollState {
    policy: PollPolicy,
    interval: Duration,
    retries: u32,
    last_percent: f64,
}

impl PollState {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            interval: policy.interval,
            policy,
            retries: 0,
            last_percent: 0.0,
        }
    }

    /// Wait before the next poll
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stalled polls in a row
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Fold one status snapshot into the state
    pub fn observe(&mut self, job: &ImportJob) -> PollDecision {
        match job.status {
            ImportStatus::Success => PollDecision::Done,
            ImportStatus::Error | ImportStatus::Failed => PollDecision::Fail(job.error.clone()),
            ImportStatus::Progress => match job.percent() {
                Some(percent) if percent > self.last_percent => {
                    self.last_percent = percent;
                    self.retries = 0;
                    self.interval = self.policy.interval;
                    PollDecision::Wait(self.interval)
                }
                _ => self.stalled(),
            },
            ImportStatus::Waiting | ImportStatus::Unknown => self.stalled(),
        }
    }

    fn stalled(&mut self) -> PollDecision {
        self.retries += 1;
        if self.retries > self.policy.max_retries {
            return PollDecision::Timeout;
        }
        self.interval = self.interval.saturating_mul(2).min(self.policy.max_interval);
        PollDecision::Wait(self.interval)
    }
}

/// Callback invoked with every status snapshot
pub type ImportCallback = Box<dyn Fn(&ImportJob) + Send + Sync>;

#[derive(Deserialize)]
struct SubmitResponse {
    token: String,
}

/// Submits URL imports and waits for them to settle
pub struct AsyncImporter {
    transport: Transport,
    endpoints: Endpoints,
    policy: PollPolicy,
    on_status: Option<ImportCallback>,
}

impl AsyncImporter {
    pub(crate) fn new(transport: Transport, endpoints: Endpoints, policy: PollPolicy) -> Self {
        Self {
            transport,
            endpoints,
            policy,
            on_status: None,
        }
    }

    /// Override the polling policy
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Observe every status snapshot
    pub fn on_status(mut self, callback: ImportCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    /// Submit `source_url` and wait for the resulting file
    pub async fn import(&self, source_url: &str, options: &UploadOptions) -> Result<File> {
        let token = self.submit(source_url, options).await?;
        self.wait(&token).await
    }

    /// Submit an import job and return its token
    #[instrument(skip(self, options))]
    pub async fn submit(&self, source_url: &str, options: &UploadOptions) -> Result<String> {
        let mut form = Form::new()
            .text("pub_key", self.transport.credentials().public_key().to_string())
            .text("source_url", source_url.to_string())
            .text("store", options.store.as_str());
        if let Some(filename) = &options.filename {
            form = form.text("filename", filename.clone());
        }
        let form = with_signature(form, options.complete_signature());

        let request = ApiRequest::upload(Method::POST, self.endpoints.from_url()?).form(form);
        let response: SubmitResponse = self.transport.execute_json(request).await?;
        debug!(token = %response.token, "import submitted");
        Ok(response.token)
    }

    /// Current status of a job
    pub async fn status(&self, token: &str) -> Result<ImportJob> {
        let url = self.endpoints.from_url_status(token)?;
        let mut job: ImportJob = self
            .transport
            .execute_json(ApiRequest::upload(Method::GET, url))
            .await?;
        job.token = token.to_string();
        Ok(job)
    }

    /// Poll `token` until the job settles or the retry budget runs out
    #[instrument(skip(self))]
    pub async fn wait(&self, token: &str) -> Result<File> {
        let mut state = PollState::new(self.policy.clone());
        loop {
            tokio::time::sleep(state.interval()).await;

            let job = self.status(token).await?;
            if let Some(ref cb) = self.on_status {
                cb(&job);
            }

            match state.observe(&job) {
                PollDecision::Wait(next) => {
                    if state.retries() > 0 {
                        warn!(status = ?job.status, retries = state.retries(), next = ?next, "import stalled");
                    } else {
                        debug!(percent = ?job.percent(), "import progressing");
                    }
                }
                PollDecision::Done => {
                    let file_id = job.imported_file_id().ok_or_else(|| {
                        ClientError::InvalidResponse("import succeeded without a file id".to_string())
                    })?;
                    info!(%file_id, "import finished");
                    return fetch_uploaded_file(&self.transport, &self.endpoints, file_id).await;
                }
                PollDecision::Fail(detail) => {
                    return Err(ClientError::UploadFailure {
                        detail,
                        source: None,
                    });
                }
                PollDecision::Timeout => {
                    warn!(retries = state.retries(), "import timed out");
                    return Err(ClientError::timeout());
                }
            }
        }
    }
}

impl fmt::Debug for AsyncImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncImporter")
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1000),
            max_retries: 5,
        }
    }

    fn job(status: ImportStatus, done: Option<u64>, total: Option<u64>) -> ImportJob {
        ImportJob {
            status,
            done,
            total,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_status() {
        let job: ImportJob =
            serde_json::from_str(r#"{"status": "progress", "done": 10, "total": 40}"#).unwrap();
        assert_eq!(job.status, ImportStatus::Progress);
        assert_eq!(job.percent(), Some(25.0));

        let job: ImportJob = serde_json::from_str(r#"{"status": "success", "uuid": "abc"}"#).unwrap();
        assert_eq!(job.imported_file_id(), Some("abc"));

        let job: ImportJob =
            serde_json::from_str(r#"{"status": "success", "uuid": "abc", "file_id": "abc"}"#).unwrap();
        assert_eq!(job.imported_file_id(), Some("abc"));

        let job: ImportJob = serde_json::from_str(r#"{"status": "queued"}"#).unwrap();
        assert_eq!(job.status, ImportStatus::Unknown);
    }

    #[test]
    fn test_stalled_interval_never_decreases() {
        let mut state = PollState::new(policy());
        let mut last = state.interval();
        for _ in 0..5 {
            match state.observe(&job(ImportStatus::Waiting, None, None)) {
                PollDecision::Wait(next) => {
                    assert!(next >= last);
                    last = next;
                }
                other => panic!("unexpected decision {:?}", other),
            }
        }
        assert_eq!(last, Duration::from_millis(1000));
    }

    #[test]
    fn test_progress_resets_backoff() {
        let mut state = PollState::new(policy());
        state.observe(&job(ImportStatus::Progress, Some(1), Some(10)));
        state.observe(&job(ImportStatus::Progress, Some(1), Some(10)));
        state.observe(&job(ImportStatus::Unknown, None, None));
        assert_eq!(state.retries(), 2);
        assert_eq!(state.interval(), Duration::from_millis(400));

        let decision = state.observe(&job(ImportStatus::Progress, Some(5), Some(10)));
        assert_eq!(decision, PollDecision::Wait(Duration::from_millis(100)));
        assert_eq!(state.retries(), 0);
    }

    #[test]
    fn test_times_out_after_retry_bound() {
        let mut state = PollState::new(policy());
        let mut polls = 0;
        loop {
            polls += 1;
            match state.observe(&job(ImportStatus::Progress, Some(0), Some(10))) {
                PollDecision::Wait(_) => continue,
                PollDecision::Timeout => break,
                other => panic!("unexpected decision {:?}", other),
            }
        }
        assert_eq!(polls, 6);
    }

    #[test]
    fn test_huge_interval_saturates() {
        let mut state = PollState::new(PollPolicy {
            interval: Duration::MAX,
            max_interval: Duration::MAX,
            max_retries: 3,
        });
        let decision = state.observe(&job(ImportStatus::Waiting, None, None));
        assert_eq!(decision, PollDecision::Wait(Duration::MAX));
    }

    #[test]
    fn test_terminal_statuses() {
        let mut state = PollState::new(policy());
        assert_eq!(state.observe(&job(ImportStatus::Success, None, None)), PollDecision::Done);

        let mut failed = job(ImportStatus::Error, None, None);
        failed.error = Some("Host does not exist".to_string());
        assert_eq!(
            state.observe(&failed),
            PollDecision::Fail(Some("Host does not exist".to_string()))
        );
        assert!(ImportStatus::Failed.is_terminal());
        assert!(!ImportStatus::Waiting.is_terminal());
    }
}
