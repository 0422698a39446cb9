//! Fetch orchestrator: runs every selected source adapter under a
//! shared concurrency cap, with per-source retry, backoff, and rate
//! limiting, inside one run-level deadline.
//!
//! Nothing in here returns an error. Every source ends in a
//! [`SourceOutcome`], and a source that exhausts its retries (or gets
//! cut off by the run deadline) is recorded as Failed with the reason
//! attached. Whether the run as a whole failed is the pipeline's call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::adapter::SourceAdapter;
use crate::config::{FetchConfig, SourceConfig};
use crate::error::{FetchError, SourceError};
use crate::models::{SourceOutcome, SourceStatus};
use crate::transport::Transport;

/// Backoff before retry `attempt` (1-based), exponential with uniform
/// jitter, capped at `backoff_max_ms`.
fn backoff_delay(config: &FetchConfig, attempt: u32) -> Duration {
    let base = config.backoff_base_ms as f64;
    let raw = base * config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
    let capped = raw.min(config.backoff_max_ms as f64);
    let jitter = if config.backoff_jitter > 0.0 {
        let spread = rand::thread_rng().gen_range(-1.0..=1.0);
        1.0 + config.backoff_jitter * spread
    } else {
        1.0
    };
    Duration::from_millis((capped * jitter).max(0.0) as u64)
}

/// Fetch the payload for one source, retrying retryable errors up to
/// `max_attempts`. Consecutive requests to the source are spaced at
/// least `rate_limit_secs` apart; retry backoff stacks on top of that.
/// Returns the payload and the number of attempts made.
async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    source_config: &SourceConfig,
    fetch_config: &FetchConfig,
    transport: &dyn Transport,
) -> (Result<Vec<u8>, FetchError>, u32) {
    let rate_limit = Duration::from_secs_f64(source_config.rate_limit_secs.max(0.0));
    let attempt_timeout = Duration::from_secs(source_config.timeout_secs);
    let mut last_request: Option<Instant> = None;
    let mut attempt = 0;

    loop {
        attempt += 1;
        if let Some(previous) = last_request {
            let elapsed = previous.elapsed();
            if elapsed < rate_limit {
                tokio::time::sleep(rate_limit - elapsed).await;
            }
        }
        last_request = Some(Instant::now());

        let result = match tokio::time::timeout(attempt_timeout, adapter.fetch(transport)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        match result {
            Ok(payload) => return (Ok(payload), attempt),
            Err(err) if err.is_retryable() && attempt < fetch_config.max_attempts => {
                let delay = backoff_delay(fetch_config, attempt);
                warn!(
                    source = adapter.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return (Err(err), attempt),
        }
    }
}

/// Run one source end to end: fetch with retry, then parse. Always
/// produces an outcome, never an error.
async fn run_source(
    adapter: Box<dyn SourceAdapter>,
    source_config: SourceConfig,
    fetch_config: FetchConfig,
    transport: Arc<dyn Transport>,
) -> SourceOutcome {
    let name = adapter.name().to_string();
    let (fetched, attempts) =
        fetch_with_retry(adapter.as_ref(), &source_config, &fetch_config, transport.as_ref())
            .await;

    let payload = match fetched {
        Ok(payload) => payload,
        Err(err) => {
            return SourceOutcome {
                source: name,
                records: Vec::new(),
                status: SourceStatus::Failed,
                parse_failures: 0,
                attempts,
                error: Some(SourceError::from(err).to_string()),
            }
        }
    };

    match adapter.parse(&payload) {
        Ok(outcome) => {
            debug!(
                source = %name,
                records = outcome.records.len(),
                skipped = outcome.skipped,
                "parsed"
            );
            let status = if outcome.records.is_empty() {
                SourceStatus::Failed
            } else if outcome.skipped > 0 {
                SourceStatus::PartialFailure
            } else {
                SourceStatus::Success
            };
            let error = match status {
                SourceStatus::Failed => Some("no records parsed".to_string()),
                SourceStatus::PartialFailure => {
                    Some(format!("{} records skipped", outcome.skipped))
                }
                SourceStatus::Success => None,
            };
            SourceOutcome {
                source: name,
                records: outcome.records,
                status,
                parse_failures: outcome.skipped,
                attempts,
                error,
            }
        }
        Err(err) => SourceOutcome {
            source: name,
            records: Vec::new(),
            status: SourceStatus::Failed,
            parse_failures: 0,
            attempts,
            error: Some(SourceError::from(err).to_string()),
        },
    }
}

/// Fetch all selected sources concurrently, at most
/// `fetch_config.concurrency` in flight, under one run deadline.
///
/// Outcomes come back in source-name order. Sources still running when
/// the deadline expires are aborted and recorded as Failed.
pub async fn fetch_all(
    adapters: Vec<(Box<dyn SourceAdapter>, SourceConfig)>,
    fetch_config: &FetchConfig,
    transport: Arc<dyn Transport>,
) -> Vec<SourceOutcome> {
    let semaphore = Arc::new(Semaphore::new(fetch_config.concurrency.max(1)));
    let completed: Arc<Mutex<BTreeMap<String, SourceOutcome>>> =
        Arc::new(Mutex::new(BTreeMap::new()));
    let mut names: Vec<String> = Vec::with_capacity(adapters.len());
    let mut tasks = JoinSet::new();

    for (adapter, source_config) in adapters {
        names.push(adapter.name().to_string());
        let semaphore = Arc::clone(&semaphore);
        let completed = Arc::clone(&completed);
        let fetch_config = fetch_config.clone();
        let transport = Arc::clone(&transport);
        tasks.spawn(async move {
            // Semaphore is never closed, so acquire cannot fail.
            let _permit = semaphore.acquire_owned().await;
            let outcome = run_source(adapter, source_config, fetch_config, transport).await;
            completed.lock().await.insert(outcome.source.clone(), outcome);
        });
    }

    let deadline = Duration::from_secs(fetch_config.run_timeout_secs);
    let drained = tokio::time::timeout(deadline, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(timeout_secs = fetch_config.run_timeout_secs, "run deadline hit, aborting");
        tasks.abort_all();
    }

    let mut completed = completed.lock().await;
    names.sort_unstable();
    names
        .into_iter()
        .map(|name| {
            completed.remove(&name).unwrap_or(SourceOutcome {
                source: name,
                records: Vec::new(),
                status: SourceStatus::Failed,
                parse_failures: 0,
                attempts: 0,
                error: Some("run timeout".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::resolve;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const OFAC_SAMPLE: &str = r#"<?xml version="1.0"?>
<sdnList>
  <sdnEntry>
    <uid>100</uid>
    <firstName>John</firstName>
    <lastName>SMITH</lastName>
    <sdnType>Individual</sdnType>
  </sdnEntry>
</sdnList>"#;

    /// Transport replaying a fixed response script, recording request
    /// instants for rate-limit assertions.
    struct ScriptedTransport {
        script: StdMutex<VecDeque<Result<Vec<u8>, FetchError>>>,
        requests: StdMutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn request_times(&self) -> Vec<Instant> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, _location: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Other("script exhausted".to_string())))
        }
    }

    fn ofac_source(rate_limit_secs: f64) -> (Box<dyn SourceAdapter>, SourceConfig) {
        let source_config = SourceConfig {
            url: Some("https://example.invalid/sdn.xml".to_string()),
            mock_path: None,
            rate_limit_secs,
            timeout_secs: 60,
            priority: 10,
        };
        (resolve("ofac", &source_config).unwrap(), source_config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures_matches_immediate() {
        let flaky = Arc::new(ScriptedTransport::new(vec![
            Err(FetchError::Status(503)),
            Err(FetchError::Connection("reset".to_string())),
            Ok(OFAC_SAMPLE.as_bytes().to_vec()),
        ]));
        let clean = Arc::new(ScriptedTransport::new(vec![Ok(OFAC_SAMPLE
            .as_bytes()
            .to_vec())]));

        let config = FetchConfig::default();
        let (adapter, source_config) = ofac_source(0.0);
        let retried = run_source(adapter, source_config, config.clone(), flaky).await;
        let (adapter, source_config) = ofac_source(0.0);
        let direct = run_source(adapter, source_config, config, clean).await;

        assert_eq!(retried.status, SourceStatus::Success);
        assert_eq!(retried.attempts, 3);
        assert_eq!(direct.attempts, 1);
        assert_eq!(retried.records.len(), direct.records.len());
        assert_eq!(retried.records[0].source_id, direct.records[0].source_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(FetchError::Status(404))]));
        let (adapter, source_config) = ofac_source(0.0);
        let outcome =
            run_source(adapter, source_config, FetchConfig::default(), transport.clone()).await;
        assert_eq!(outcome.status, SourceStatus::Failed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(transport.request_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_yields_failed_outcome() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(FetchError::Status(500)),
            Err(FetchError::Status(500)),
            Err(FetchError::Status(500)),
        ]));
        let (adapter, source_config) = ofac_source(0.0);
        let outcome =
            run_source(adapter, source_config, FetchConfig::default(), transport).await;
        assert_eq!(outcome.status, SourceStatus::Failed);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_requests() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(FetchError::RateLimited),
            Err(FetchError::RateLimited),
            Ok(OFAC_SAMPLE.as_bytes().to_vec()),
        ]));
        let config = FetchConfig {
            backoff_base_ms: 0,
            backoff_jitter: 0.0,
            ..FetchConfig::default()
        };
        let (adapter, source_config) = ofac_source(5.0);
        let outcome = run_source(adapter, source_config, config, transport.clone()).await;
        assert_eq!(outcome.status, SourceStatus::Success);

        let times = transport.request_times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_records_timeout() {
        // Script is empty, so the single request hangs on the attempt
        // timeout path; with a 1s run deadline the source never finishes.
        struct HangingTransport;
        #[async_trait::async_trait]
        impl Transport for HangingTransport {
            async fn get(&self, _location: &str) -> Result<Vec<u8>, FetchError> {
                std::future::pending().await
            }
        }

        let (adapter, source_config) = ofac_source(0.0);
        let config = FetchConfig {
            run_timeout_secs: 1,
            ..FetchConfig::default()
        };
        let outcomes =
            fetch_all(vec![(adapter, source_config)], &config, Arc::new(HangingTransport)).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, SourceStatus::Failed);
        assert_eq!(outcomes[0].error.as_deref(), Some("run timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_isolates_failures() {
        struct PerSourceTransport;
        #[async_trait::async_trait]
        impl Transport for PerSourceTransport {
            async fn get(&self, location: &str) -> Result<Vec<u8>, FetchError> {
                if location.contains("sdn") {
                    Ok(OFAC_SAMPLE.as_bytes().to_vec())
                } else {
                    Err(FetchError::NotFound(location.to_string()))
                }
            }
        }

        let ofac = ofac_source(0.0);
        let un_config = SourceConfig {
            url: Some("https://example.invalid/un.xml".to_string()),
            mock_path: None,
            rate_limit_secs: 0.0,
            timeout_secs: 60,
            priority: 20,
        };
        let un = (resolve("un", &un_config).unwrap(), un_config);

        let outcomes = fetch_all(
            vec![ofac, un],
            &FetchConfig::default(),
            Arc::new(PerSourceTransport),
        )
        .await;
        assert_eq!(outcomes.len(), 2);
        // Sorted by source name: ofac, then un.
        assert_eq!(outcomes[0].source, "ofac");
        assert_eq!(outcomes[0].status, SourceStatus::Success);
        assert_eq!(outcomes[1].source, "un");
        assert_eq!(outcomes[1].status, SourceStatus::Failed);
    }
}
