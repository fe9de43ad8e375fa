//! Smoke test against a live prediction endpoint.
//!
//! Sends one fixed record repeatedly and reports how often it is labeled
//! fraud. Behind a canary split where only one model flags the record, the
//! positive share is the share of traffic routed to that model.

use crate::server::PREDICT_ROUTE;
use anyhow::{Context, Result};
use reqwest::header::HOST;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const HOST_HEADER: &str = "fraud-classifier.kserve-deployments.example.com";
pub const BASE_URL: &str = "http://127.0.0.1";
pub const REQUESTS: usize = 100;
pub const DELAY: Duration = Duration::from_millis(20);

/// The single-record table sent on every request.
pub fn payload() -> Value {
    json!([
        {
            "isFraud": 0,
            "TransactionAmt": 495.0,
            "ProductCD": "W",
            "card4": "visa",
            "P_emaildomain": "live.com",
            "R_emaildomain": null,
            "M1": "T",
            "M2": "T",
            "M3": "T"
        }
    ])
}

/// Tally of responses whose first label is fraud.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SmokeTally {
    pub total: u64,
    pub positives: u64,
}

impl SmokeTally {
    pub fn record(&mut self, first_label: u8) {
        self.total += 1;
        if first_label == 1 {
            self.positives += 1;
        }
    }

    /// Whole-percent share attributed to the boosted model (positive labels).
    pub fn xgb_share(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.positives * 100 / self.total
        }
    }

    /// Remainder attributed to the random forest.
    pub fn rf_share(&self) -> u64 {
        100 - self.xgb_share()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}% to the XGB Model, {}% to the RF Model",
            self.xgb_share(),
            self.rf_share()
        )
    }
}

/// POST the fixed payload `requests` times and tally the answers.
///
/// Transport errors and undecodable responses abort the run.
pub async fn run(base_url: &str, requests: usize, delay: Duration) -> Result<SmokeTally> {
    let client = reqwest::Client::new();
    let url = format!("{}{}", base_url.trim_end_matches('/'), PREDICT_ROUTE);
    let body = payload();
    let mut tally = SmokeTally::default();

    info!(url = %url, requests, delay_ms = delay.as_millis() as u64, "Starting smoke test");

    for i in 0..requests {
        let labels: Vec<u8> = client
            .post(&url)
            .header(HOST, HOST_HEADER)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request {} failed", i + 1))?
            .json()
            .await
            .with_context(|| format!("Response {} is not a label array", i + 1))?;

        let first = *labels
            .first()
            .with_context(|| format!("Response {} is empty", i + 1))?;
        tally.record(first);
        debug!(request = i + 1, label = first, "Response received");

        tokio::time::sleep(delay).await;
    }

    Ok(tally)
}
