//! Training data loading, class balancing and train/test splitting

use crate::types::transaction::LabeledTransaction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid label {0} (expected 0 or 1)")]
    InvalidLabel(u8),

    #[error("Dataset contains no rows")]
    Empty,
}

/// Load labeled transactions from a CSV file with a header row.
///
/// Columns are matched by header name; any other columns are ignored.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledTransaction>, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let rows = read_transactions(BufReader::new(file))?;
    info!(path = %path.display(), rows = rows.len(), "Loaded training data");
    Ok(rows)
}

/// Parse labeled transactions from any CSV source.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<LabeledTransaction>, DatasetError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (i, result) in reader.deserialize::<LabeledTransaction>().enumerate() {
        let row = result.map_err(|source| DatasetError::Csv { row: i + 1, source })?;
        if row.is_fraud > 1 {
            return Err(DatasetError::InvalidLabel(row.is_fraud));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(rows)
}

/// Downsample the majority label to the size of the minority label.
///
/// Returns the sampled majority rows followed by every minority row.
pub fn balance_classes<R: Rng + ?Sized>(
    rows: Vec<LabeledTransaction>,
    rng: &mut R,
) -> Vec<LabeledTransaction> {
    let (fraud, legit): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.is_fraud());

    let (mut majority, minority) = if legit.len() >= fraud.len() {
        (legit, fraud)
    } else {
        (fraud, legit)
    };

    let target = minority.len();
    let (sampled, _) = majority.partial_shuffle(rng, target);
    let mut balanced: Vec<LabeledTransaction> = sampled.to_vec();
    balanced.extend(minority);

    debug!(per_class = target, total = balanced.len(), "Balanced classes");
    balanced
}

/// Row indices of a seeded shuffled split.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(n * test_size)` rows for testing.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_size.clamp(0.0, 1.0)).ceil() as usize;
    let train = indices.split_off(n_test.min(n));

    Split {
        train,
        test: indices,
    }
}

/// Select rows of `items` by index.
pub fn take<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
TransactionID,isFraud,TransactionDT,TransactionAmt,ProductCD,card1,card4,P_emaildomain,R_emaildomain,M1,M2,M3,M4
1,0,86400,68.5,W,13926,discover,,,T,T,T,M2
2,0,86401,29.0,W,2755,mastercard,gmail.com,,,,,M0
3,1,86469,59.0,C,4663,visa,outlook.com,outlook.com,,,,
4,0,86499,50.0,W,18132,mastercard,yahoo.com,,T,F,F,M0
5,1,86506,50.0,H,4497,mastercard,gmail.com,gmail.com,,,,
";

    fn rows(fraud: usize, legit: usize) -> Vec<LabeledTransaction> {
        (0..fraud + legit)
            .map(|i| LabeledTransaction {
                is_fraud: u8::from(i < fraud),
                transaction_amt: i as f64,
                product_cd: Some("W".to_string()),
                p_emaildomain: None,
                r_emaildomain: None,
                card4: None,
                m1: None,
                m2: None,
                m3: None,
            })
            .collect()
    }

    #[test]
    fn test_read_transactions_by_header() {
        let rows = read_transactions(CSV.as_bytes()).unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].card4.as_deref(), Some("discover"));
        assert_eq!(rows[0].p_emaildomain, None);
        assert_eq!(rows[1].m1, None);
        assert!(rows[2].is_fraud());
        assert_eq!(rows[4].transaction_amt, 50.0);
    }

    #[test]
    fn test_read_rejects_bad_label() {
        let csv = "isFraud,TransactionAmt\n2,10.0\n";
        assert!(matches!(
            read_transactions(csv.as_bytes()),
            Err(DatasetError::InvalidLabel(2))
        ));
    }

    #[test]
    fn test_read_rejects_empty() {
        let csv = "isFraud,TransactionAmt\n";
        assert!(matches!(read_transactions(csv.as_bytes()), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_balance_classes_downsamples_majority() {
        let mut rng = StdRng::seed_from_u64(7);
        let balanced = balance_classes(rows(3, 20), &mut rng);

        assert_eq!(balanced.len(), 6);
        assert_eq!(balanced.iter().filter(|r| r.is_fraud()).count(), 3);
        // Majority sample first, minority rows last
        assert!(balanced[..3].iter().all(|r| !r.is_fraud()));
        assert!(balanced[3..].iter().all(|r| r.is_fraud()));
    }

    #[test]
    fn test_balance_handles_fraud_majority() {
        let mut rng = StdRng::seed_from_u64(7);
        let balanced = balance_classes(rows(10, 4), &mut rng);

        assert_eq!(balanced.iter().filter(|r| r.is_fraud()).count(), 4);
        assert_eq!(balanced.iter().filter(|r| !r.is_fraud()).count(), 4);
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let split = train_test_split(101, 0.2, 42);

        assert_eq!(split.test.len(), 21);
        assert_eq!(split.train.len(), 80);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic_for_seed() {
        let a = train_test_split(50, 0.2, 42);
        let b = train_test_split(50, 0.2, 42);
        assert_eq!(a.test, b.test);
    }
}
