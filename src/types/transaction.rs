//! Transaction data structures for UPI fraud detection

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single UPI transaction to be checked for fraud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction amount (non-negative)
    #[serde(alias = "Amount")]
    pub amount: f64,

    /// Calendar date of the transaction
    #[serde(alias = "Date")]
    pub date: NaiveDate,

    /// Transaction type (Bill Payment, Purchase, ...)
    #[serde(alias = "Transaction_Type")]
    pub transaction_type: String,

    /// Payment gateway (Google Pay, Paytm, ...)
    #[serde(alias = "Payment_Gateway")]
    pub payment_gateway: String,

    /// State or territory the transaction originated in
    #[serde(alias = "Transaction_State")]
    pub transaction_state: String,

    /// Merchant category
    #[serde(alias = "Merchant_Category")]
    pub merchant_category: String,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        amount: f64,
        date: NaiveDate,
        transaction_type: impl Into<String>,
        payment_gateway: impl Into<String>,
        transaction_state: impl Into<String>,
        merchant_category: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            date,
            transaction_type: transaction_type.into(),
            payment_gateway: payment_gateway.into(),
            transaction_state: transaction_state.into(),
            merchant_category: merchant_category.into(),
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// A transaction received over the message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Correlation id echoed in the verdict; generated when absent
    #[serde(default = "new_request_id")]
    pub request_id: String,

    #[serde(flatten)]
    pub transaction: Transaction,
}

impl TransactionRequest {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            request_id: new_request_id(),
            transaction,
        }
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(
            500.0,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "Purchase",
            "Paytm",
            "Karnataka",
            "Utilities",
        )
    }

    #[test]
    fn test_date_decomposition() {
        let tx = sample();
        assert_eq!(tx.year(), 2024);
        assert_eq!(tx.month(), 3);
    }

    #[test]
    fn test_request_accepts_column_style_names() {
        let json = r#"{
            "request_id": "req-1",
            "Amount": 500.0,
            "Date": "2024-03-15",
            "Transaction_Type": "Purchase",
            "Payment_Gateway": "Paytm",
            "Transaction_State": "Karnataka",
            "Merchant_Category": "Utilities"
        }"#;

        let request: TransactionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_id, "req-1");
        assert_eq!(request.transaction, sample());
    }

    #[test]
    fn test_request_id_generated_when_missing() {
        let json = r#"{
            "amount": 10.0,
            "date": "2024-01-02",
            "transaction_type": "Refund",
            "payment_gateway": "HDFC",
            "transaction_state": "Goa",
            "merchant_category": "Other"
        }"#;

        let request: TransactionRequest = serde_json::from_str(json).unwrap();
        assert!(Uuid::parse_str(&request.request_id).is_ok());
        assert_eq!(request.transaction.month(), 1);
    }
}
