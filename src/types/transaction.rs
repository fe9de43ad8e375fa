//! Transaction records as they arrive at training and inference time

use serde::{Deserialize, Serialize};

/// Categorical columns in canonical encoding order.
pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "ProductCD",
    "P_emaildomain",
    "R_emaildomain",
    "card4",
    "M1",
    "M2",
    "M3",
];

/// Numeric column appended after the one-hot indicators.
pub const AMOUNT_COLUMN: &str = "TransactionAmt";

/// A single transaction row to be scored.
///
/// Fields not listed here (including `isFraud` at inference time) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Product code
    #[serde(rename = "ProductCD", default)]
    pub product_cd: Option<String>,

    /// Purchaser email domain
    #[serde(rename = "P_emaildomain", default)]
    pub p_emaildomain: Option<String>,

    /// Recipient email domain
    #[serde(rename = "R_emaildomain", default)]
    pub r_emaildomain: Option<String>,

    /// Card network
    #[serde(rename = "card4", default)]
    pub card4: Option<String>,

    /// Match flags
    #[serde(rename = "M1", default)]
    pub m1: Option<String>,
    #[serde(rename = "M2", default)]
    pub m2: Option<String>,
    #[serde(rename = "M3", default)]
    pub m3: Option<String>,

    /// Transaction amount
    #[serde(rename = "TransactionAmt")]
    pub transaction_amt: f64,
}

impl TransactionRecord {
    /// Create a record with the given amount and every categorical field missing
    pub fn new(transaction_amt: f64) -> Self {
        Self {
            transaction_amt,
            ..Self::default()
        }
    }

    /// Categorical values in [`CATEGORICAL_COLUMNS`] order.
    ///
    /// Empty strings are treated the same as absent values so that CSV and
    /// JSON inputs normalize to one null marker.
    pub fn categorical_values(&self) -> [Option<&str>; 7] {
        [
            &self.product_cd,
            &self.p_emaildomain,
            &self.r_emaildomain,
            &self.card4,
            &self.m1,
            &self.m2,
            &self.m3,
        ]
        .map(|v| v.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A training row: the record plus its fraud label.
///
/// Kept flat so the CSV reader can match every field by header name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledTransaction {
    #[serde(rename = "isFraud")]
    pub is_fraud: u8,

    #[serde(rename = "TransactionAmt")]
    pub transaction_amt: f64,

    #[serde(rename = "ProductCD", default)]
    pub product_cd: Option<String>,
    #[serde(rename = "P_emaildomain", default)]
    pub p_emaildomain: Option<String>,
    #[serde(rename = "R_emaildomain", default)]
    pub r_emaildomain: Option<String>,
    #[serde(rename = "card4", default)]
    pub card4: Option<String>,
    #[serde(rename = "M1", default)]
    pub m1: Option<String>,
    #[serde(rename = "M2", default)]
    pub m2: Option<String>,
    #[serde(rename = "M3", default)]
    pub m3: Option<String>,
}

impl LabeledTransaction {
    pub fn is_fraud(&self) -> bool {
        self.is_fraud == 1
    }

    /// Strip the label
    pub fn record(&self) -> TransactionRecord {
        TransactionRecord {
            product_cd: self.product_cd.clone(),
            p_emaildomain: self.p_emaildomain.clone(),
            r_emaildomain: self.r_emaildomain.clone(),
            card4: self.card4.clone(),
            m1: self.m1.clone(),
            m2: self.m2.clone(),
            m3: self.m3.clone(),
            transaction_amt: self.transaction_amt,
        }
    }
}
