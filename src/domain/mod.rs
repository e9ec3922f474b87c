/// Domain models shared by the backend client and the proxy
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Error, Result};

/// Host states, 1-based. Backends transmit a 0-based ordinal; the decoder
/// shifts it by one to line up with these values.
pub mod host_state {
    pub const UP: u8 = 1;
    pub const DOWN: u8 = 2;
    pub const UNREACHABLE: u8 = 3;
}

/// Service states, 1-based, same shift as host states.
pub mod service_state {
    pub const OK: u8 = 1;
    pub const WARNING: u8 = 2;
    pub const CRITICAL: u8 = 3;
    pub const UNKNOWN: u8 = 4;
}

/// One monitored host. `host_name` is unique within any merged result set;
/// the proxy's collision pass renames duplicates across backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub host_name: String,
    pub display_name: String,
    pub state: u8,
    /// true once the state has settled, false while it is still transient
    pub hard_state: bool,
    pub last_check: DateTime<Utc>,
    pub last_state_change: DateTime<Utc>,
    pub last_hard_state_change: DateTime<Utc>,
    pub flapping: bool,
    pub in_downtime: bool,
    pub acknowledged: bool,
    pub check_message: String,
    pub reference_url: String,
}

/// One monitored service; identity is the (host_name, service_name) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub host_name: String,
    pub service_name: String,
    pub display_name: String,
    pub state: u8,
    pub hard_state: bool,
    pub last_check: DateTime<Utc>,
    pub last_state_change: DateTime<Utc>,
    pub last_hard_state_change: DateTime<Utc>,
    pub flapping: bool,
    pub in_downtime: bool,
    pub acknowledged: bool,
    pub check_message: String,
    pub reference_url: String,
}

/// Maintenance window request. A fixed downtime covers the whole
/// [start, end) window; a flexible one may start any time inside it but
/// must not exceed `duration`, so a flexible request needs `duration` set.
#[derive(Debug, Clone)]
pub struct Downtime {
    pub flexible: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// only meaningful for flexible downtimes
    pub duration: Duration,
    /// also cover every service under the matched hosts
    pub all_services: bool,
    pub author: String,
    pub comment: String,
}

impl Default for Downtime {
    fn default() -> Self {
        Self {
            flexible: false,
            start: DateTime::UNIX_EPOCH,
            end: DateTime::UNIX_EPOCH,
            duration: Duration::ZERO,
            all_services: true,
            author: String::new(),
            comment: String::new(),
        }
    }
}

impl Downtime {
    /// Check the request before anything is sent over the wire.
    pub fn validate(&self) -> Result<()> {
        if self.flexible && self.duration.is_zero() {
            return Err(Error::InvalidDowntime(
                "flexible downtime needs duration set".to_string(),
            ));
        }
        if self.start.timestamp() == 0 || self.end.timestamp() == 0 {
            return Err(Error::InvalidDowntime(
                "downtime needs start and end time".to_string(),
            ));
        }
        Ok(())
    }
}
