/// Backend client module: one monitoring server per client
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::domain::{Downtime, Host, Service};
use crate::errors::{Error, Result};
use crate::utils::host_match_filter;
use crate::wire::{ApiResponse, DowntimeRequest, StatusResponse};

/// Total round-trip timeout for one backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(31);

/// Client for a single monitoring server. Owns the base URL and credential
/// pair; every call is one outbound round trip with no retries.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    user: String,
    pass: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a client for the server at `base_url`. An empty `user`
    /// disables authentication.
    pub fn new(base_url: &str, user: &str, pass: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| Error::InvalidUrl {
            url: base_url.to_string(),
            source: e,
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("monproxy/1.0")
            .build()?;
        Ok(Self {
            base_url: parsed,
            user: user.to_string(),
            pass: pass.to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn get_objects(&self, path: &str, filter: &str) -> Result<ApiResponse> {
        let url = self.endpoint(path);
        debug!("querying {}", url);
        let mut req = self.client.get(url).header(ACCEPT, "application/json");
        if !filter.is_empty() {
            req = req.query(&[("filter", filter)]);
        }
        if !self.user.is_empty() {
            req = req.basic_auth(&self.user, Some(&self.pass));
        }
        let body = req.send().await?.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Decode { source: e, body })
    }

    /// Fetch every host the backend knows about.
    pub async fn get_hosts(&self) -> Result<Vec<Host>> {
        self.get_hosts_by_filter("").await
    }

    /// Fetch hosts matching a backend filter expression; an empty filter
    /// means all hosts.
    pub async fn get_hosts_by_filter(&self, filter: &str) -> Result<Vec<Host>> {
        let resp = self.get_objects("v1/objects/Hosts", filter).await?;
        Ok(resp.hosts())
    }

    /// Fetch every service the backend knows about.
    pub async fn get_services(&self) -> Result<Vec<Service>> {
        self.get_services_by_filter("").await
    }

    /// Fetch services matching a backend filter expression; an empty filter
    /// means all services.
    pub async fn get_services_by_filter(&self, filter: &str) -> Result<Vec<Service>> {
        let resp = self.get_objects("v1/objects/Services", filter).await?;
        Ok(resp.services())
    }

    /// Schedule downtime for hosts whose name matches `host`. The name goes
    /// through the backend's `match()` function, so glob patterns work.
    pub async fn schedule_host_downtime(
        &self,
        host: &str,
        downtime: &Downtime,
    ) -> Result<Vec<String>> {
        self.schedule_host_downtime_by_filter(&host_match_filter(host), downtime)
            .await
    }

    /// Schedule downtime for hosts matched by a raw filter expression.
    /// Returns the names of the hosts the backend confirmed. A call that
    /// matches zero objects is an error, not an empty success.
    pub async fn schedule_host_downtime_by_filter(
        &self,
        filter: &str,
        downtime: &Downtime,
    ) -> Result<Vec<String>> {
        downtime.validate()?;
        let body = DowntimeRequest::for_hosts(filter, downtime);
        let mut req = self
            .client
            .post(self.endpoint("v1/actions/schedule-downtime"))
            .header(ACCEPT, "application/json")
            .json(&body);
        if !self.user.is_empty() {
            req = req.basic_auth(&self.user, Some(&self.pass));
        }
        let raw = req.send().await?.text().await?;
        let resp: StatusResponse = serde_json::from_str(&raw).map_err(|e| Error::Decode {
            source: e,
            body: raw.clone(),
        })?;
        if resp.results.is_empty() {
            return Err(Error::NoObjectsMatched {
                filter: filter.to_string(),
                body: raw,
            });
        }
        Ok(resp.confirmed_names())
    }
}
