use crate::routes::{query_url, query_value, Route};

pub const PAYMENT_FAILURE_DEFAULT: &str = "Your transaction could not be completed at this time.";

/// Result page reached after the external payment provider redirects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success {
        transaction_id: Option<String>,
    },
    Failure {
        transaction_id: Option<String>,
        message: String,
    },
}

impl PaymentOutcome {
    /// Read `txnid` and `error` from a payment landing's query string.
    ///
    /// Returns `None` for routes that are not payment landings.
    pub fn from_query(route: &Route, query: &str) -> Option<Self> {
        let url = query_url(query)?;
        let transaction_id = query_value(&url, "txnid");
        match route {
            Route::PaymentSuccess => Some(Self::Success { transaction_id }),
            Route::PaymentFailure => Some(Self::Failure {
                transaction_id,
                message: query_value(&url, "error")
                    .unwrap_or_else(|| PAYMENT_FAILURE_DEFAULT.to_string()),
            }),
            _ => None,
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Success { transaction_id } | Self::Failure { transaction_id, .. } => {
                transaction_id.as_deref()
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Invoice link for a successful payment, given the download host.
    pub fn download_url(&self, download_base: &str) -> Option<String> {
        match self {
            Self::Success {
                transaction_id: Some(id),
            } => Some(concierge_api::payload::booking_download_url(download_base, id)),
            _ => None,
        }
    }
}
