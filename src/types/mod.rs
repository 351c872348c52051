//! Type definitions for the fraud detector

pub mod transaction;
pub mod verdict;

pub use transaction::{Transaction, TransactionRequest};
pub use verdict::{Verdict, VerdictMessage};
