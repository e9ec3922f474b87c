//! Aggregating client for monitoring servers speaking the
//! `/v1/objects` + `/v1/actions` HTTP API.
//!
//! A [`BackendClient`] talks to exactly one monitoring server: it queries
//! host and service status and schedules maintenance downtimes. A [`Proxy`]
//! holds any number of backend clients, dispatches every operation to all
//! of them concurrently, and merges the answers into one namespace. When
//! two backends both report an entity under the same name, the colliding
//! entries are renamed (default: `<name>_<backend>`) rather than dropped,
//! so nothing a backend reported is lost in the merge.
//!
//! Every call is a fresh round trip to all configured backends; the crate
//! keeps no local state between calls.

mod clients;
mod config;
mod domain;
mod errors;
mod proxy;
mod utils;
pub mod wire;

pub use clients::BackendClient;
pub use config::{AppConfig, ServerConfig};
pub use domain::{host_state, service_state, Downtime, Host, Service};
pub use errors::{Error, Result};
pub use proxy::{ConflictResolver, Proxy};
