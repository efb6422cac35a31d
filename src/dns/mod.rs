pub mod client;
pub mod prober;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::time::Duration;
use thiserror::Error;

pub use crate::core::DnsClient;
pub use client::HickoryDnsClient;
pub use prober::Prober;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DnsError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("nameserver address '{0}' could not be resolved")]
    InvalidNameserver(String),

    #[error("invalid query name: {0}")]
    InvalidQuery(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl DnsError {
    /// True if the error means the nameserver never answered.
    ///
    /// Malformed responses and unencodable query names are not the
    /// nameserver's fault and are reported separately.
    pub fn is_unresponsive(&self) -> bool {
        matches!(
            self,
            DnsError::Timeout(_) | DnsError::Transport(_) | DnsError::InvalidNameserver(_)
        )
    }
}
