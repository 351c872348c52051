//! Row-wise CSV batch scoring.
//!
//! Every row is decoded, encoded and scored on its own. A bad row becomes a
//! [`RowError`] in the report and the remaining rows carry on; only a file
//! whose structure is unusable (missing columns, unreadable input) fails the
//! whole batch.

use std::fmt;
use std::io::{Read, Write};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DetectorError, Result};
use crate::feature_extractor::{FeatureExtractor, UnknownCategoryPolicy};
use crate::models::inference::Classifier;
use crate::types::transaction::Transaction;
use crate::types::verdict::Verdict;

/// Columns an uploaded CSV must contain (any order, extra columns ignored).
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Date",
    "Amount",
    "Transaction_Type",
    "Payment_Gateway",
    "Transaction_State",
    "Merchant_Category",
];

/// One input row, as written in the CSV.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Amount")]
    amount: f64,
    #[serde(rename = "Transaction_Type")]
    transaction_type: String,
    #[serde(rename = "Payment_Gateway")]
    payment_gateway: String,
    #[serde(rename = "Transaction_State")]
    transaction_state: String,
    #[serde(rename = "Merchant_Category")]
    merchant_category: String,
}

impl CsvRow {
    fn into_transaction(self) -> Result<Transaction> {
        let date = parse_date(&self.date)?;
        Ok(Transaction::new(
            self.amount,
            date,
            self.transaction_type,
            self.payment_gateway,
            self.transaction_state,
            self.merchant_category,
        ))
    }
}

/// One output row: the canonical columns plus the `fraud` flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    #[serde(rename = "Amount", serialize_with = "serialize_amount")]
    pub amount: f64,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Transaction_Type")]
    pub transaction_type: String,
    #[serde(rename = "Payment_Gateway")]
    pub payment_gateway: String,
    #[serde(rename = "Transaction_State")]
    pub transaction_state: String,
    #[serde(rename = "Merchant_Category")]
    pub merchant_category: String,
    #[serde(rename = "fraud", serialize_with = "serialize_flag")]
    pub verdict: Verdict,
}

/// Shortest form of the amount: `500` stays `500`, `1500.5` stays `1500.5`.
fn serialize_amount<S: serde::Serializer>(
    amount: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(amount)
}

fn serialize_flag<S: serde::Serializer>(
    verdict: &Verdict,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(verdict.as_flag())
}

impl ScoredRow {
    pub fn new(tx: Transaction, verdict: Verdict) -> Self {
        Self {
            amount: tx.amount,
            year: tx.date.year(),
            month: tx.date.month(),
            transaction_type: tx.transaction_type,
            payment_gateway: tx.payment_gateway,
            transaction_state: tx.transaction_state,
            merchant_category: tx.merchant_category,
            verdict,
        }
    }
}

/// A row that could not be scored.
#[derive(Debug)]
pub struct RowError {
    /// 1-based data row number (the header is not counted)
    pub row: usize,
    pub error: DetectorError,
}

impl RowError {
    pub fn field(&self) -> Option<&str> {
        self.error.field()
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.error)
    }
}

/// Outcome of one row, in input order.
pub type RowOutcome = std::result::Result<ScoredRow, RowError>;

/// Ordered outcomes of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RowOutcome>,
}

/// Counts over a batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub scored: usize,
    pub flagged: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} scored ({} fraudulent), {} failed",
            self.total, self.scored, self.flagged, self.failed
        )
    }
}

impl BatchReport {
    pub fn scored(&self) -> impl Iterator<Item = &ScoredRow> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &RowError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn summary(&self) -> BatchSummary {
        let scored = self.scored().count();
        BatchSummary {
            total: self.outcomes.len(),
            scored,
            flagged: self.scored().filter(|r| r.verdict.is_fraud()).count(),
            failed: self.outcomes.len() - scored,
        }
    }

    /// Write scored rows as CSV with the `fraud` column appended.
    pub fn write_results<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut wrote_any = false;
        for row in self.scored() {
            wtr.serialize(row)?;
            wrote_any = true;
        }
        if !wrote_any {
            wtr.write_record(OUTPUT_COLUMNS)?;
        }
        wtr.flush().map_err(|e| DetectorError::Io {
            path: "<results>".into(),
            source: e,
        })
    }

    /// Write row errors as CSV: `row, field, error`.
    pub fn write_errors<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["row", "field", "error"])?;
        for err in self.errors() {
            wtr.write_record([
                err.row.to_string(),
                err.field().unwrap_or_default().to_string(),
                err.error.to_string(),
            ])?;
        }
        wtr.flush().map_err(|e| DetectorError::Io {
            path: "<errors>".into(),
            source: e,
        })
    }
}

/// Output header, used when no row was scored.
const OUTPUT_COLUMNS: [&str; 8] = [
    "Amount",
    "Year",
    "Month",
    "Transaction_Type",
    "Payment_Gateway",
    "Transaction_State",
    "Merchant_Category",
    "fraud",
];

/// Parse a `DD-MM-YYYY` date; month and year are the 2nd and 3rd tokens.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let invalid = |reason: String| DetectorError::invalid_input("Date", reason);

    let tokens: Vec<&str> = raw.trim().split('-').map(str::trim).collect();
    let [day, month, year] = tokens.as_slice() else {
        return Err(invalid(format!("expected DD-MM-YYYY, got {raw:?}")));
    };

    let parse = |token: &str, part: &str| {
        token
            .parse::<u32>()
            .map_err(|_| invalid(format!("{part} {token:?} in {raw:?} is not a number")))
    };
    let day = parse(*day, "day")?;
    let month = parse(*month, "month")?;
    let year = parse(*year, "year")?;

    i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(|| invalid(format!("{raw:?} is not a valid calendar date")))
}

/// Decode transactions from CSV, one outcome per data row.
///
/// Fails as a whole only when the header lacks a required column or the
/// input cannot be read.
pub fn read_transactions<R: Read>(
    reader: R,
) -> Result<Vec<std::result::Result<Transaction, RowError>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(DetectorError::invalid_input(
            "columns",
            format!("missing required column(s): {}", missing.join(", ")),
        ));
    }

    let mut rows = Vec::new();
    for (index, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = index + 1;
        let outcome = match record {
            Ok(raw) => raw.into_transaction(),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => Err(row_decode_error(&e, &headers)),
        };
        rows.push(outcome.map_err(|error| RowError { row, error }));
    }

    debug!(rows = rows.len(), "Decoded CSV batch");
    Ok(rows)
}

/// Name the offending column of a row decode failure when csv reports one.
fn row_decode_error(err: &csv::Error, headers: &csv::StringRecord) -> DetectorError {
    match err.kind() {
        csv::ErrorKind::Deserialize { err: de, .. } => {
            let field = de
                .field()
                .and_then(|i| headers.get(i as usize))
                .unwrap_or("row");
            DetectorError::invalid_input(field, de.kind().to_string())
        }
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => DetectorError::invalid_input(
            "row",
            format!("expected {expected_len} fields, found {len}"),
        ),
        _ => DetectorError::invalid_input("row", err.to_string()),
    }
}

/// Encode and score decoded rows, preserving order.
pub fn score_rows(
    rows: Vec<std::result::Result<Transaction, RowError>>,
    extractor: &FeatureExtractor,
    classifier: &dyn Classifier,
    policy: UnknownCategoryPolicy,
) -> BatchReport {
    let mut report = BatchReport::default();
    for (index, decoded) in rows.into_iter().enumerate() {
        let row = index + 1;
        let outcome = decoded.and_then(|tx| {
            extractor
                .extract_checked(&tx, policy)
                .and_then(|features| classifier.predict(&features))
                .map(|verdict| ScoredRow::new(tx, verdict))
                .map_err(|error| RowError { row, error })
        });
        if let Err(err) = &outcome {
            warn!(row = err.row, error = %err.error, "Row could not be scored");
        }
        report.outcomes.push(outcome);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inference::check_features;

    /// Flags every transaction above 1000.
    struct AmountRule;

    impl Classifier for AmountRule {
        fn predict(&self, features: &[f32]) -> Result<Verdict> {
            check_features(features, 53)?;
            Ok(Verdict::from_probability(features[0] as f64, 1000.0))
        }

        fn name(&self) -> &str {
            "amount_rule"
        }

        fn feature_count(&self) -> usize {
            53
        }
    }

    const HEADER: &str =
        "Date,Amount,Transaction_Type,Payment_Gateway,Transaction_State,Merchant_Category\n";

    fn score(csv: &str, policy: UnknownCategoryPolicy) -> BatchReport {
        let rows = read_transactions(csv.as_bytes()).unwrap();
        score_rows(rows, &FeatureExtractor::new(), &AmountRule, policy)
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("15-03-2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(
            parse_date(" 1-2-2023 ").unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_date_rejects_bad_input() {
        for raw in ["2024/03/15", "aa-03-2024", "30-02-2024", "15-13-2024", "15-03", ""] {
            let err = parse_date(raw).unwrap_err();
            assert_eq!(err.field(), Some("Date"), "{raw}");
        }
    }

    #[test]
    fn test_one_bad_date_fails_only_its_row() {
        let csv = format!(
            "{HEADER}15-03-2024,500,Purchase,Paytm,Karnataka,Utilities\n\
             not-a-date,20,Refund,HDFC,Goa,Other\n\
             01-12-2023,5000,Investment,ICICI UPI,Kerala,Investment\n"
        );
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let summary = report.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.flagged, 1);

        let errors: Vec<&RowError> = report.errors().collect();
        assert_eq!(errors[0].row, 2);
        assert_eq!(errors[0].field(), Some("Date"));
    }

    #[test]
    fn test_outcomes_preserve_input_order() {
        let csv = format!(
            "{HEADER}15-03-2024,10,Purchase,Paytm,Karnataka,Utilities\n\
             15-03-2024,2000,Purchase,Paytm,Karnataka,Utilities\n\
             15-03-2024,30,Purchase,Paytm,Karnataka,Utilities\n"
        );
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let amounts: Vec<f64> = report.scored().map(|r| r.amount).collect();
        let verdicts: Vec<Verdict> = report.scored().map(|r| r.verdict).collect();
        assert_eq!(amounts, vec![10.0, 2000.0, 30.0]);
        assert_eq!(
            verdicts,
            vec![Verdict::NotFraudulent, Verdict::Fraudulent, Verdict::NotFraudulent]
        );
    }

    #[test]
    fn test_missing_column_fails_whole_batch() {
        let csv = "Date,Amount,Transaction_Type\n15-03-2024,10,Purchase\n";
        let err = read_transactions(csv.as_bytes()).unwrap_err();
        assert_eq!(err.field(), Some("columns"));
        assert!(err.to_string().contains("Payment_Gateway"));
        assert!(err.to_string().contains("Merchant_Category"));
    }

    #[test]
    fn test_columns_in_any_order_with_extras() {
        let csv = "Merchant_Category,Notes,Amount,Date,Transaction_State,Payment_Gateway,Transaction_Type\n\
                   Utilities,n/a,500,15-03-2024,Karnataka,Paytm,Purchase\n";
        let report = score(csv, UnknownCategoryPolicy::Reject);
        assert_eq!(report.summary().scored, 1);
    }

    #[test]
    fn test_non_numeric_amount_names_the_column() {
        let csv = format!("{HEADER}15-03-2024,lots,Purchase,Paytm,Karnataka,Utilities\n");
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let err = report.errors().next().unwrap();
        assert_eq!(err.row, 1);
        assert_eq!(err.field(), Some("Amount"));
    }

    #[test]
    fn test_amount_beyond_model_range_names_the_column() {
        let csv = format!("{HEADER}15-03-2024,1e39,Purchase,Paytm,Karnataka,Utilities\n");
        let report = score(&csv, UnknownCategoryPolicy::ZeroFill);

        let err = report.errors().next().unwrap();
        assert_eq!(err.field(), Some("Amount"));
        assert_eq!(err.error.code(), "UPI-2001");
    }

    #[test]
    fn test_whole_amounts_written_as_given() {
        let csv = format!(
            "{HEADER}15-03-2024,500,Purchase,Paytm,Karnataka,Utilities\n\
             15-03-2024,0.75,Purchase,Paytm,Karnataka,Utilities\n"
        );
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let mut out = Vec::new();
        report.write_results(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let amounts: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(amounts, vec!["500", "0.75"]);
    }

    #[test]
    fn test_unknown_category_follows_policy() {
        let csv = format!("{HEADER}15-03-2024,500,Purchase,Cash,Karnataka,Utilities\n");

        let rejected = score(&csv, UnknownCategoryPolicy::Reject);
        let err = rejected.errors().next().unwrap();
        assert_eq!(err.field(), Some("Payment_Gateway"));

        let zero_filled = score(&csv, UnknownCategoryPolicy::ZeroFill);
        assert_eq!(zero_filled.summary().scored, 1);
    }

    #[test]
    fn test_write_results_format() {
        let csv = format!(
            "{HEADER}15-03-2024,500,Purchase,Paytm,Karnataka,Utilities\n\
             bad,1,Purchase,Paytm,Karnataka,Utilities\n\
             02-01-2024,1500.5,Bill Payment,Google Pay,Assam,Home delivery\n"
        );
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let mut out = Vec::new();
        report.write_results(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Amount,Year,Month,Transaction_Type,Payment_Gateway,Transaction_State,Merchant_Category,fraud"
        );
        assert_eq!(lines[1], "500,2024,3,Purchase,Paytm,Karnataka,Utilities,No");
        assert_eq!(lines[2], "1500.5,2024,1,Bill Payment,Google Pay,Assam,Home delivery,Yes");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_results_header_only_when_nothing_scored() {
        let csv = format!("{HEADER}bad,1,Purchase,Paytm,Karnataka,Utilities\n");
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let mut out = Vec::new();
        report.write_results(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with("fraud\n"));
    }

    #[test]
    fn test_write_errors_format() {
        let csv = format!("{HEADER}31-04-2024,1,Purchase,Paytm,Karnataka,Utilities\n");
        let report = score(&csv, UnknownCategoryPolicy::Reject);

        let mut out = Vec::new();
        report.write_errors(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "row,field,error");
        assert!(lines[1].starts_with("1,Date,"));
    }
}
