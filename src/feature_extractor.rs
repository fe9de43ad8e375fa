//! Feature extraction for fraud classifier training and inference.
//!
//! Categorical columns are one-hot encoded with a vocabulary learned at
//! training time; the transaction amount is appended as the last feature.
//! The encoder is persisted next to the model so inference replays exactly
//! the layout the model was fit on.

use crate::types::transaction::{TransactionRecord, AMOUNT_COLUMN, CATEGORICAL_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category label used in feature names for missing values.
pub const MISSING_CATEGORY: &str = "nan";

/// Observed categories of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    /// Sorted observed values
    pub values: Vec<String>,
    /// Whether a missing value was observed; its indicator comes last
    pub has_missing: bool,
}

impl ColumnCategories {
    fn width(&self) -> usize {
        self.values.len() + usize::from(self.has_missing)
    }

    /// Offset of the indicator for `value` within this column, if known.
    fn position(&self, value: Option<&str>) -> Option<usize> {
        match value {
            Some(v) => self.values.binary_search_by(|probe| probe.as_str().cmp(v)).ok(),
            None if self.has_missing => Some(self.values.len()),
            None => None,
        }
    }
}

/// One-hot encoder over the seven categorical transaction columns.
///
/// Unseen categories encode as all-zero indicators for their column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<ColumnCategories>,
}

impl OneHotEncoder {
    /// Learn the categories of every column from `records`.
    pub fn fit<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        let mut seen: Vec<BTreeSet<String>> = vec![BTreeSet::new(); CATEGORICAL_COLUMNS.len()];
        let mut missing = [false; CATEGORICAL_COLUMNS.len()];

        for record in records {
            for (i, value) in record.categorical_values().into_iter().enumerate() {
                match value {
                    Some(v) => {
                        if !seen[i].contains(v) {
                            seen[i].insert(v.to_string());
                        }
                    }
                    None => missing[i] = true,
                }
            }
        }

        let categories = CATEGORICAL_COLUMNS
            .iter()
            .zip(seen)
            .zip(missing)
            .map(|((column, values), has_missing)| ColumnCategories {
                column: column.to_string(),
                values: values.into_iter().collect(),
                has_missing,
            })
            .collect();

        Self { categories }
    }

    /// Number of indicator columns produced.
    pub fn width(&self) -> usize {
        self.categories.iter().map(ColumnCategories::width).sum()
    }

    pub fn categories(&self) -> &[ColumnCategories] {
        &self.categories
    }

    /// Output column names, `{column}_{value}` in encoding order.
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.categories {
            for value in &column.values {
                names.push(format!("{}_{}", column.column, value));
            }
            if column.has_missing {
                names.push(format!("{}_{}", column.column, MISSING_CATEGORY));
            }
        }
        names
    }

    /// Encode a single record into `out`, which must be zeroed and `width()` long.
    fn encode_into(&self, record: &TransactionRecord, out: &mut [f64]) {
        let mut offset = 0;
        for (column, value) in self.categories.iter().zip(record.categorical_values()) {
            if let Some(pos) = column.position(value) {
                out[offset + pos] = 1.0;
            }
            offset += column.width();
        }
    }

    /// Dense indicator rows, one per record.
    pub fn transform(&self, records: &[TransactionRecord]) -> Vec<Vec<f64>> {
        let width = self.width();
        records
            .iter()
            .map(|record| {
                let mut row = vec![0.0; width];
                self.encode_into(record, &mut row);
                row
            })
            .collect()
    }
}

/// Turns transaction records into model input rows.
///
/// Layout: encoder indicators followed by the transaction amount.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    encoder: OneHotEncoder,
}

impl FeatureExtractor {
    pub fn new(encoder: OneHotEncoder) -> Self {
        Self { encoder }
    }

    /// Fit an encoder on `records` and wrap it.
    pub fn fit(records: &[TransactionRecord]) -> Self {
        Self::new(OneHotEncoder::fit(records))
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// Extract one feature row per record.
    pub fn extract(&self, records: &[TransactionRecord]) -> Vec<Vec<f64>> {
        let width = self.encoder.width();
        records
            .iter()
            .map(|record| {
                let mut row = vec![0.0; width + 1];
                self.encoder.encode_into(record, &mut row[..width]);
                row[width] = record.transaction_amt;
                row
            })
            .collect()
    }

    /// Number of features produced per row.
    pub fn feature_count(&self) -> usize {
        self.encoder.width() + 1
    }

    /// Feature names in model input order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.encoder.feature_names_out();
        names.push(AMOUNT_COLUMN.to_string());
        names
    }
}
