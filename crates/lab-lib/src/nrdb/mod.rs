//! NRDB query client
//!
//! Thin NerdGraph client scoped to the three queries the toolkit needs: the
//! ProcessSample byte histogram, per-host NrConsumption ingest, and the
//! Tier-1 process census. All calls pass through a circuit breaker so a
//! flapping API degrades to fast local failures instead of stacked timeouts.

pub mod breaker;

pub use breaker::CircuitBreaker;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::cost::{ByteBucket, HistogramWindow};
use crate::error::{LabError, NrdbError, Result};
use crate::lint::Tier1Process;

const GRAPHQL_QUERY: &str = r#"query NrqlQuery($accountId: Int!, $nrql: Nrql!) {
  actor {
    account(id: $accountId) {
      nrql(query: $nrql) {
        results
      }
    }
  }
}"#;

/// Queries the toolkit runs against NRDB
///
/// Implemented by [`NrdbClient`]; estimator and validator take the trait so
/// tests can substitute canned responses.
#[async_trait]
pub trait NrdbSource: Send + Sync {
    /// ProcessSample byte-size histogram over a trailing window
    async fn byte_histogram(
        &self,
        window_hours: u32,
    ) -> std::result::Result<HistogramWindow, NrdbError>;

    /// GiB ingested per host from NrConsumption, keyed by hostname
    async fn host_ingest(
        &self,
        hosts: &[String],
        window_hours: u32,
    ) -> std::result::Result<HashMap<String, f64>, NrdbError>;

    /// Fleet process census ranked by host prevalence
    async fn tier1_processes(
        &self,
        window_days: u32,
    ) -> std::result::Result<Vec<Tier1Process>, NrdbError>;
}

/// Client configuration, read from `NEW_RELIC_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct NrdbConfig {
    pub api_key: String,
    pub account_id: i64,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,

    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
}

fn default_region() -> String {
    "us".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_breaker_threshold() -> u32 {
    breaker::DEFAULT_FAILURE_THRESHOLD
}

fn default_breaker_cooldown_secs() -> u64 {
    breaker::DEFAULT_COOLDOWN.as_secs()
}

impl NrdbConfig {
    /// Load from `NEW_RELIC_API_KEY`, `NEW_RELIC_ACCOUNT_ID` and friends
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("NEW_RELIC"))
            .build()
            .map_err(|e| LabError::invalid("new_relic", e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| LabError::invalid("new_relic", e.to_string()))
    }

    fn endpoint(&self) -> Result<Url> {
        let base = match self.region.to_lowercase().as_str() {
            "us" => "https://api.newrelic.com/graphql",
            "eu" => "https://api.eu.newrelic.com/graphql",
            other => {
                return Err(LabError::invalid(
                    "region",
                    format!("unrecognized region `{other}`, expected `us` or `eu`"),
                ))
            }
        };
        Url::parse(base).map_err(|e| LabError::invalid("region", e.to_string()))
    }
}

/// NerdGraph client with per-call circuit breaking
pub struct NrdbClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    account_id: i64,
    timeout: Duration,
    breaker: Mutex<CircuitBreaker>,
}

impl NrdbClient {
    pub fn new(config: &NrdbConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NrdbError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint()?,
            api_key: config.api_key.clone(),
            account_id: config.account_id,
            timeout,
            breaker: Mutex::new(CircuitBreaker::new(
                config.breaker_threshold,
                Duration::from_secs(config.breaker_cooldown_secs),
            )),
        })
    }

    /// Client pointed at an explicit endpoint, for tests against a stub server
    pub fn with_endpoint(endpoint: &str, api_key: &str, account_id: i64) -> Result<Self> {
        let timeout = Duration::from_secs(default_timeout_secs());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NrdbError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: Url::parse(endpoint).map_err(|e| LabError::invalid("endpoint", e.to_string()))?,
            api_key: api_key.to_string(),
            account_id,
            timeout,
            breaker: Mutex::new(CircuitBreaker::default()),
        })
    }

    /// Execute one NRQL query through the NerdGraph envelope
    ///
    /// Returns the `results` array. Records the outcome on the breaker.
    pub async fn query(&self, nrql: &str) -> std::result::Result<Vec<Value>, NrdbError> {
        self.breaker.lock().await.check()?;

        debug!(nrql, "Executing NRDB query");
        let outcome = self.execute(nrql).await;

        let mut breaker = self.breaker.lock().await;
        match &outcome {
            Ok(_) => breaker.record_success(),
            Err(_) => breaker.record_failure(),
        }
        outcome
    }

    async fn execute(&self, nrql: &str) -> std::result::Result<Vec<Value>, NrdbError> {
        let payload = json!({
            "query": GRAPHQL_QUERY,
            "variables": { "accountId": self.account_id, "nrql": nrql },
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NrdbError::Timeout(self.timeout)
                } else {
                    NrdbError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(NrdbError::Auth(format!("status {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NrdbError::RateLimit);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NrdbError::Transport(format!("status {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NrdbError::MalformedResponse(e.to_string()))?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(NrdbError::MalformedResponse(format!(
                "GraphQL errors: {}",
                messages.join("; ")
            )));
        }

        body.pointer("/data/actor/account/nrql/results")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                NrdbError::MalformedResponse("missing data.actor.account.nrql.results".to_string())
            })
    }
}

#[async_trait]
impl NrdbSource for NrdbClient {
    async fn byte_histogram(
        &self,
        window_hours: u32,
    ) -> std::result::Result<HistogramWindow, NrdbError> {
        let nrql = format!(
            "FROM ProcessSample SELECT histogram(bytecountestimate(), 20, 10) AS bytes, \
             uniqueCount(processId) AS pids SINCE {window_hours} hours AGO"
        );
        let results = self.query(&nrql).await?;
        parse_histogram(&results, window_hours)
    }

    async fn host_ingest(
        &self,
        hosts: &[String],
        window_hours: u32,
    ) -> std::result::Result<HashMap<String, f64>, NrdbError> {
        let host_list = hosts
            .iter()
            .map(|h| format!("'{h}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let nrql = format!(
            "FROM NrConsumption SELECT sum(GigabytesIngested) AS gib \
             WHERE hostname IN ({host_list}) FACET hostname \
             SINCE {window_hours} hours AGO LIMIT {}",
            hosts.len().max(1)
        );
        let results = self.query(&nrql).await?;
        Ok(parse_host_ingest(&results))
    }

    async fn tier1_processes(
        &self,
        window_days: u32,
    ) -> std::result::Result<Vec<Tier1Process>, NrdbError> {
        let nrql = format!(
            "FROM ProcessSample SELECT uniqueCount(entityName) AS hostCount \
             FACET processDisplayName SINCE {window_days} days AGO LIMIT 1000"
        );
        let results = self.query(&nrql).await?;
        Ok(parse_tier1(&results))
    }
}

/// Parse the histogram result row
///
/// NRQL histograms come back as a map of `"lo-hi"` bucket boundaries to
/// event counts; the bucket midpoint stands in for the member values.
fn parse_histogram(
    results: &[Value],
    window_hours: u32,
) -> std::result::Result<HistogramWindow, NrdbError> {
    let row = results
        .first()
        .ok_or_else(|| NrdbError::MalformedResponse("empty histogram result".to_string()))?;

    let raw = row
        .get("bytes")
        .and_then(Value::as_object)
        .ok_or_else(|| NrdbError::MalformedResponse("missing `bytes` histogram".to_string()))?;

    let mut buckets = Vec::with_capacity(raw.len());
    for (range, count) in raw {
        let midpoint = bucket_midpoint(range).ok_or_else(|| {
            NrdbError::MalformedResponse(format!("unparseable bucket boundary `{range}`"))
        })?;
        buckets.push(ByteBucket {
            midpoint_bytes: midpoint,
            count: count.as_u64().unwrap_or(0),
        });
    }

    let process_count = row.get("pids").and_then(Value::as_u64).unwrap_or(0) as u32;

    Ok(HistogramWindow {
        buckets,
        process_count,
        window_hours,
    })
}

fn bucket_midpoint(range: &str) -> Option<f64> {
    let (lo, hi) = range.split_once('-')?;
    let lo: f64 = lo.trim().parse().ok()?;
    let hi: f64 = hi.trim().parse().ok()?;
    Some((lo + hi) / 2.0)
}

fn parse_host_ingest(results: &[Value]) -> HashMap<String, f64> {
    results
        .iter()
        .filter_map(|row| {
            let host = row
                .get("hostname")
                .or_else(|| row.get("facet"))
                .and_then(Value::as_str)?;
            let gib = row.get("gib").and_then(Value::as_f64)?;
            Some((host.to_string(), gib))
        })
        .collect()
}

fn parse_tier1(results: &[Value]) -> Vec<Tier1Process> {
    results
        .iter()
        .filter_map(|row| {
            let name = row
                .get("processDisplayName")
                .or_else(|| row.get("facet"))
                .and_then(Value::as_str)?;
            let host_count = row.get("hostCount").and_then(Value::as_u64)? as u32;
            Some(Tier1Process::new(name, host_count))
        })
        .collect()
}
