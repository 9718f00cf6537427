//! Status polling loop

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use rl_core::auth::AuthAssertion;
use rl_core::config::AgentConfig;
use rl_core::error::TransportError;
use rl_core::time::current_time_millis;
use rl_core::DeviceCredential;
use rl_protocol::api::{DEVICE_ID_HEADER, DEVICE_SIGNATURE_HEADER, DEVICE_TIMESTAMP_HEADER};
use rl_protocol::LockState;

use super::shadow::{PollShadow, Transition};
use crate::dispatch::Dispatcher;
use crate::push::ConnectionError;

/// Counts consecutive failed fetches
#[derive(Debug)]
pub struct FailureAlarm {
    threshold: u32,
    consecutive: u32,
}

impl FailureAlarm {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    /// Record a failure; true every `threshold` consecutive failures
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive % self.threshold == 0
    }

    /// Record a success; returns how many failures preceded it
    pub fn record_success(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive)
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Act on one snapshot: only edges and message edits while locked reach
/// the dispatcher
pub async fn apply_snapshot(shadow: &mut PollShadow, state: &LockState, dispatcher: &Dispatcher) {
    match shadow.observe(state.locked) {
        Some(Transition::Raise) => {
            shadow.message_changed(&state.message);
            dispatcher.raise(&state.message).await;
        }
        Some(Transition::Lower) => dispatcher.lower().await,
        None if state.locked && shadow.message_changed(&state.message) => {
            dispatcher.raise(&state.message).await;
        }
        None => {}
    }
}

/// Fetches the signed status endpoint on a fixed interval
pub struct PollClient {
    http: reqwest::Client,
    url: String,
    credential: DeviceCredential,
    interval: Duration,
    request_timeout: Duration,
    alarm_threshold: u32,
    dispatcher: Dispatcher,
}

impl PollClient {
    pub fn new(config: &AgentConfig, dispatcher: Dispatcher) -> Result<Self, ConnectionError> {
        let credential = config.credential()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: config.status_url(),
            credential,
            interval: config.poll_interval,
            request_timeout: config.request_timeout,
            alarm_threshold: config.failure_alarm_threshold,
            dispatcher,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One signed status fetch
    pub async fn fetch(&self) -> Result<LockState, TransportError> {
        let assertion = AuthAssertion::new(&self.credential, current_time_millis());

        let response = self
            .http
            .get(&self.url)
            .header(DEVICE_ID_HEADER, &assertion.device_id)
            .header(DEVICE_TIMESTAMP_HEADER, assertion.timestamp.to_string())
            .header(DEVICE_SIGNATURE_HEADER, &assertion.signature)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.request_timeout)
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!("{} from {}", status, self.url)));
        }

        response
            .json::<LockState>()
            .await
            .map_err(|e| TransportError::Http(format!("invalid status body: {}", e)))
    }

    /// Poll until cancelled.
    ///
    /// The cadence never changes: failures are logged and the next tick
    /// simply tries again. A fetch in flight is allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut shadow = PollShadow::new();
        let mut alarm = FailureAlarm::new(self.alarm_threshold);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Polling {} every {:?}", self.url, self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.fetch().await {
                Ok(state) => {
                    let failures = alarm.record_success();
                    if failures > 0 {
                        tracing::info!("Server reachable again after {} failed fetch(es)", failures);
                    }
                    apply_snapshot(&mut shadow, &state, &self.dispatcher).await;
                }
                Err(e) => {
                    if alarm.record_failure() {
                        tracing::error!(
                            "No contact with server for {} consecutive fetches: {}",
                            alarm.consecutive(),
                            e
                        );
                    } else {
                        tracing::warn!("Status fetch failed: {}", e);
                    }
                }
            }
        }

        tracing::info!("Poll loop stopped");
    }
}
