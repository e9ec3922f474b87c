/// Wire-shape types for the backend HTTP API and their normalization into
/// domain records. Pure data transformation, no I/O.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{Downtime, Host, Service};
use crate::utils::unix_ts_to_datetime;

/// Top-level query response: a list of tagged objects.
#[derive(Debug, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "Results", alias = "results", default)]
    pub results: Vec<ApiObject>,
}

/// One tagged object; `attrs` stays raw here and is decoded per-type in a
/// second step, so one undecodable object cannot sink its siblings.
#[derive(Debug, Default, Deserialize)]
pub struct ApiObject {
    #[serde(rename = "Attrs", alias = "attrs", default)]
    pub attrs: Value,
    #[serde(rename = "Type", alias = "type", default)]
    pub object_type: String,
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
}

/// Host attributes as the backend sends them: states as floats, booleans as
/// numeric counters, timestamps as fractional-second epochs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiHost {
    pub name: String,
    pub display_name: String,
    pub active: bool,
    pub state: f32,
    pub state_type: f32,
    pub last_state: f32,
    pub last_state_type: f32,
    pub last_check: f64,
    pub last_state_change: f64,
    pub last_hard_state_change: f64,
    pub downtime_depth: f32,
    pub flapping: bool,
    pub acknowledgement: f32,
    pub acknowledgement_expiry: f64,
    pub action_url: String,
    pub notes_url: String,
    #[serde(rename = "last_check_result")]
    pub check_result: Option<ApiCheckResult>,
}

/// Service attributes; the owning host arrives as `host_name`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiService {
    #[serde(rename = "host_name")]
    pub host: String,
    #[serde(rename = "name")]
    pub service: String,
    pub display_name: String,
    pub active: bool,
    pub state: f32,
    pub state_type: f32,
    pub last_state: f32,
    pub last_state_type: f32,
    pub last_check: f64,
    pub last_state_change: f64,
    pub last_hard_state_change: f64,
    pub downtime_depth: f32,
    pub flapping: bool,
    pub acknowledgement: f32,
    pub acknowledgement_expiry: f64,
    pub action_url: String,
    pub notes_url: String,
    #[serde(rename = "last_check_result")]
    pub check_result: Option<ApiCheckResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiCheckResult {
    #[serde(rename = "check_source")]
    pub check_from: String,
    pub output: String,
}

impl From<ApiHost> for Host {
    fn from(h: ApiHost) -> Self {
        let check = h.check_result.unwrap_or_default();
        Host {
            host_name: h.name,
            display_name: h.display_name,
            // the wire ordinal is 0-based, the domain is 1-based
            state: (h.state as u8).saturating_add(1),
            hard_state: h.state_type == 1.0,
            last_check: unix_ts_to_datetime(h.last_check),
            last_state_change: unix_ts_to_datetime(h.last_state_change),
            last_hard_state_change: unix_ts_to_datetime(h.last_hard_state_change),
            flapping: h.flapping,
            in_downtime: h.downtime_depth > 0.0,
            acknowledged: h.acknowledgement > 0.0,
            check_message: check.output,
            reference_url: pick_url(h.action_url, h.notes_url),
        }
    }
}

impl From<ApiService> for Service {
    fn from(s: ApiService) -> Self {
        let check = s.check_result.unwrap_or_default();
        Service {
            host_name: s.host,
            service_name: s.service,
            display_name: s.display_name,
            state: (s.state as u8).saturating_add(1),
            hard_state: s.state_type == 1.0,
            last_check: unix_ts_to_datetime(s.last_check),
            last_state_change: unix_ts_to_datetime(s.last_state_change),
            last_hard_state_change: unix_ts_to_datetime(s.last_hard_state_change),
            flapping: s.flapping,
            in_downtime: s.downtime_depth > 0.0,
            acknowledged: s.acknowledgement > 0.0,
            check_message: check.output,
            reference_url: pick_url(s.action_url, s.notes_url),
        }
    }
}

fn pick_url(action_url: String, notes_url: String) -> String {
    if !action_url.is_empty() {
        action_url
    } else {
        notes_url
    }
}

impl ApiResponse {
    /// Decode every object tagged "Host". A malformed object is logged with
    /// its raw payload and skipped; it never aborts the rest of the batch.
    pub fn hosts(&self) -> Vec<Host> {
        let mut out = Vec::new();
        for obj in &self.results {
            if obj.object_type != "Host" {
                continue;
            }
            match serde_json::from_value::<ApiHost>(obj.attrs.clone()) {
                Ok(h) => out.push(Host::from(h)),
                Err(e) => warn!("error decoding host {}: {} | {}", obj.name, e, obj.attrs),
            }
        }
        out
    }

    /// Decode every object tagged "Service", same skip-and-log contract as
    /// [`ApiResponse::hosts`].
    pub fn services(&self) -> Vec<Service> {
        let mut out = Vec::new();
        for obj in &self.results {
            if obj.object_type != "Service" {
                continue;
            }
            match serde_json::from_value::<ApiService>(obj.attrs.clone()) {
                Ok(s) => out.push(Service::from(s)),
                Err(e) => warn!("error decoding service {}: {} | {}", obj.name, e, obj.attrs),
            }
        }
        out
    }
}

/// Response to an action call: one entry per matched object.
#[derive(Debug, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "Results", alias = "results", default)]
    pub results: Vec<StatusEntry>,
}

/// The backend transmits the numeric code/error fields as floats.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusEntry {
    pub code: f64,
    pub error: f64,
    pub status: String,
    pub name: String,
}

impl StatusResponse {
    /// Names of the objects the backend confirmed, with everything from the
    /// first `!` on stripped. Entries with a non-200 code are ignored.
    pub fn confirmed_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.results {
            if entry.code as i64 == 200 {
                let name = entry.name.split('!').next().unwrap_or_default();
                out.push(name.to_string());
            }
        }
        out
    }
}

/// Outbound body for the schedule-downtime action. Times go out as
/// epoch-second integers; `duration` and `all_services` are omitted when
/// zero/false.
#[derive(Debug, Serialize)]
pub struct DowntimeRequest {
    #[serde(rename = "type")]
    pub object_type: String,
    pub filter: String,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(skip_serializing_if = "u64_is_zero")]
    pub duration: u64,
    pub author: String,
    pub comment: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub all_services: bool,
}

fn u64_is_zero(v: &u64) -> bool {
    *v == 0
}

impl DowntimeRequest {
    /// Build the host-downtime body for an already-validated request.
    pub fn for_hosts(filter: &str, downtime: &Downtime) -> Self {
        Self {
            object_type: "Host".to_string(),
            filter: filter.to_string(),
            start_time: downtime.start.timestamp(),
            end_time: downtime.end.timestamp(),
            duration: downtime.duration.as_secs(),
            author: downtime.author.clone(),
            comment: downtime.comment.clone(),
            all_services: downtime.all_services,
        }
    }
}
