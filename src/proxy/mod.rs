/// Aggregation proxy: presents any number of backends as one logical
/// monitoring source
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::clients::BackendClient;
use crate::config::ServerConfig;
use crate::domain::{Downtime, Host, Service};
use crate::errors::{Error, Result};
use crate::utils::host_match_filter;

/// Maps (backend logical name, colliding identity name) to the replacement
/// name used in the merged result.
pub type ConflictResolver = dyn Fn(&str, &str) -> String + Send + Sync;

/// Fans every operation out to all configured backends concurrently and
/// merges the per-backend results into one namespace.
///
/// Queries concatenate: an identity reported by more than one backend is
/// kept once per backend, renamed via the conflict resolver. Downtime
/// scheduling instead returns the deduplicated union of affected names.
/// A call succeeds as long as at least one backend succeeded; it fails
/// only when every backend failed.
pub struct Proxy {
    servers: HashMap<String, BackendClient>,
    conflict_resolver: Arc<ConflictResolver>,
}

impl Proxy {
    /// Build a proxy over the given backend map with the default
    /// `<name>_<backend>` collision naming.
    pub fn new(servers: &HashMap<String, ServerConfig>) -> Result<Self> {
        Self::with_conflict_resolver(
            servers,
            Arc::new(|backend: &str, name: &str| format!("{name}_{backend}")),
        )
    }

    /// Same as [`Proxy::new`] but with a caller-supplied collision naming
    /// scheme.
    pub fn with_conflict_resolver(
        servers: &HashMap<String, ServerConfig>,
        conflict_resolver: Arc<ConflictResolver>,
    ) -> Result<Self> {
        let mut clients = HashMap::with_capacity(servers.len());
        for (name, cfg) in servers {
            let client = BackendClient::new(&cfg.server_url, &cfg.user, &cfg.pass)?;
            clients.insert(name.clone(), client);
        }
        debug!("proxy configured with {} backends", clients.len());
        Ok(Self {
            servers: clients,
            conflict_resolver,
        })
    }

    /// Run `op` against every backend on its own task and wait for all of
    /// them. Each backend's outcome lands in exactly one slot of either the
    /// result or the error map, keyed by its logical name.
    async fn fan_out<T, F, Fut>(&self, op: F) -> (HashMap<String, T>, HashMap<String, Error>)
    where
        T: Send + 'static,
        F: Fn(BackendClient) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut tasks = Vec::with_capacity(self.servers.len());
        for (name, client) in &self.servers {
            tasks.push((name.clone(), tokio::spawn(op(client.clone()))));
        }
        let mut results = HashMap::new();
        let mut errors = HashMap::new();
        for (name, handle) in tasks {
            match handle.await {
                Ok(Ok(value)) => {
                    results.insert(name, value);
                }
                Ok(Err(e)) => {
                    errors.insert(name, e);
                }
                Err(e) => {
                    errors.insert(name, Error::Internal(format!("backend task failed: {e}")));
                }
            }
        }
        (results, errors)
    }

    /// Success as long as one backend delivered; error only when none did.
    /// The error carries every backend's failure for diagnostics.
    fn verdict<T>(&self, out: T, errors: HashMap<String, Error>) -> Result<T> {
        if errors.len() == self.servers.len() {
            Err(Error::AllBackendsFailed(errors))
        } else {
            Ok(out)
        }
    }

    /// Fetch all hosts from all backends, merged.
    pub async fn get_hosts(&self) -> Result<Vec<Host>> {
        self.get_hosts_by_filter("").await
    }

    /// Fetch hosts matching a filter expression from all backends, merged.
    /// Host names claimed by more than one backend are renamed per backend.
    pub async fn get_hosts_by_filter(&self, filter: &str) -> Result<Vec<Host>> {
        let (results, errors) = self
            .fan_out(|client| {
                let filter = filter.to_string();
                async move { client.get_hosts_by_filter(&filter).await }
            })
            .await;

        let collision_map = count_backends_per_name(&results, |host: &Host| &host.host_name);
        let mut out = Vec::new();
        for (backend, hosts) in results {
            for mut host in hosts {
                if collision_map.get(&host.host_name).copied().unwrap_or(0) > 1 {
                    host.host_name = (self.conflict_resolver)(&backend, &host.host_name);
                }
                out.push(host);
            }
        }
        self.verdict(out, errors)
    }

    /// Fetch all services from all backends, merged.
    pub async fn get_services(&self) -> Result<Vec<Service>> {
        self.get_services_by_filter("").await
    }

    /// Fetch services matching a filter expression from all backends,
    /// merged. Collisions key on the owning host name, so every service
    /// under a colliding host is renamed consistently even though the
    /// service's own name segment stays put.
    pub async fn get_services_by_filter(&self, filter: &str) -> Result<Vec<Service>> {
        let (results, errors) = self
            .fan_out(|client| {
                let filter = filter.to_string();
                async move { client.get_services_by_filter(&filter).await }
            })
            .await;

        let collision_map = count_backends_per_name(&results, |svc: &Service| &svc.host_name);
        let mut out = Vec::new();
        for (backend, services) in results {
            for mut svc in services {
                if collision_map.get(&svc.host_name).copied().unwrap_or(0) > 1 {
                    svc.host_name = (self.conflict_resolver)(&backend, &svc.host_name);
                }
                out.push(svc);
            }
        }
        self.verdict(out, errors)
    }

    /// Schedule downtime on every backend for hosts whose name matches
    /// `host` (backend glob matching applies).
    pub async fn schedule_host_downtime(
        &self,
        host: &str,
        downtime: &Downtime,
    ) -> Result<Vec<String>> {
        self.schedule_host_downtime_by_filter(&host_match_filter(host), downtime)
            .await
    }

    /// Schedule downtime on every backend for hosts matched by a raw filter
    /// expression. Returns the deduplicated union of confirmed host names,
    /// sorted.
    pub async fn schedule_host_downtime_by_filter(
        &self,
        filter: &str,
        downtime: &Downtime,
    ) -> Result<Vec<String>> {
        let (results, errors) = self
            .fan_out(|client| {
                let filter = filter.to_string();
                let downtime = downtime.clone();
                async move {
                    client
                        .schedule_host_downtime_by_filter(&filter, &downtime)
                        .await
                }
            })
            .await;

        let mut names = BTreeSet::new();
        for list in results.into_values() {
            names.extend(list);
        }
        self.verdict(names.into_iter().collect(), errors)
    }
}

/// Count, for every identity key, how many distinct backends reported it.
/// A backend reporting the same key twice still counts once.
fn count_backends_per_name<T, F>(
    results: &HashMap<String, Vec<T>>,
    key: F,
) -> HashMap<String, u32>
where
    F: Fn(&T) -> &String,
{
    let mut counts: HashMap<String, u32> = HashMap::new();
    for items in results.values() {
        let mut seen: HashSet<&str> = HashSet::new();
        for item in items {
            let name = key(item);
            if seen.insert(name.as_str()) {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{host_state, service_state};
    use crate::wire::fixtures;
    use chrono::{TimeZone, Utc};
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    fn server_config(url: &str) -> ServerConfig {
        ServerConfig {
            server_url: url.to_string(),
            user: "testuser".to_string(),
            pass: "testpass".to_string(),
        }
    }

    fn proxy_over(servers: &[(&str, &MockServer)]) -> Proxy {
        let map: HashMap<String, ServerConfig> = servers
            .iter()
            .map(|(name, srv)| (name.to_string(), server_config(&srv.base_url())))
            .collect();
        Proxy::new(&map).unwrap()
    }

    fn test_downtime() -> Downtime {
        Downtime {
            start: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            end: Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
            author: "ops".to_string(),
            comment: "maintenance".to_string(),
            ..Downtime::default()
        }
    }

    async fn mock_hosts(server: &MockServer, names: &[&str]) {
        let body = fixtures::hosts_response(names);
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/v1/objects/Hosts");
                then.status(200).json_body(body.clone());
            })
            .await;
    }

    #[tokio::test]
    async fn test_single_backend_passes_through() {
        let s1 = MockServer::start_async().await;
        mock_hosts(&s1, &["t1-host1", "t1-host2", "t1-db1"]).await;

        let proxy = proxy_over(&[("s1", &s1)]);
        let hosts = proxy.get_hosts().await.unwrap();

        assert_eq!(hosts.len(), 3);
        let by_name: HashMap<_, _> = hosts.iter().map(|h| (h.host_name.clone(), h)).collect();
        assert_eq!(by_name["t1-host1"].state, host_state::UP);
        assert_eq!(by_name["t1-host1"].display_name, "t1-host1");
    }

    #[tokio::test]
    async fn test_disjoint_backends_merge_unchanged() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        mock_hosts(&s1, &["t1-host1", "t1-host2"]).await;
        mock_hosts(&s2, &["t2-lb1", "t2-lb2", "t2-db1"]).await;

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let hosts = proxy.get_hosts().await.unwrap();

        assert_eq!(hosts.len(), 5);
        let names: HashSet<String> = hosts.iter().map(|h| h.host_name.clone()).collect();
        for name in ["t1-host1", "t1-host2", "t2-lb1", "t2-lb2", "t2-db1"] {
            assert!(names.contains(name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_colliding_hosts_renamed_on_both_sides() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        mock_hosts(
            &s1,
            &[
                "t1-host1", "t1-host2", "t1-host3", "t1-db1", "t1-db2", "t1-lb1", "t1-lb2",
            ],
        )
        .await;
        mock_hosts(&s2, &["t1-host1", "t2-lb1", "t2-lb2"]).await;

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let hosts = proxy.get_hosts().await.unwrap();

        // renamed, not deduplicated
        assert_eq!(hosts.len(), 10);
        let by_name: HashMap<_, _> = hosts.iter().map(|h| (h.host_name.clone(), h)).collect();
        assert!(by_name.contains_key("t1-host1_s1"));
        assert!(by_name.contains_key("t1-host1_s2"));
        assert!(!by_name.contains_key("t1-host1"));
        assert_eq!(
            by_name["t1-host1_s1"].display_name, "t1-host1",
            "rename must not touch the display name"
        );
        // non-colliding entries keep their names
        assert!(by_name.contains_key("t1-host2"));
        assert!(by_name.contains_key("t2-lb1"));
    }

    #[tokio::test]
    async fn test_custom_conflict_resolver() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        mock_hosts(&s1, &["t1-host1"]).await;
        mock_hosts(&s2, &["t1-host1"]).await;

        let map: HashMap<String, ServerConfig> = [
            ("s1".to_string(), server_config(&s1.base_url())),
            ("s2".to_string(), server_config(&s2.base_url())),
        ]
        .into();
        let proxy = Proxy::with_conflict_resolver(
            &map,
            Arc::new(|backend: &str, name: &str| format!("{backend}/{name}")),
        )
        .unwrap();

        let hosts = proxy.get_hosts().await.unwrap();
        let names: HashSet<String> = hosts.iter().map(|h| h.host_name.clone()).collect();
        assert!(names.contains("s1/t1-host1"));
        assert!(names.contains("s2/t1-host1"));
    }

    #[tokio::test]
    async fn test_service_rename_follows_host_collision() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        s1.mock_async(|when, then| {
            when.method(GET).path("/v1/objects/Services");
            then.status(200).json_body(fixtures::objects_response(vec![
                fixtures::service_object("t1-host1", "ELASTICSEARCH", 0.0, true),
                fixtures::service_object("t1-lb1", "HAPROXY", 0.0, false),
            ]));
        })
        .await;
        s2.mock_async(|when, then| {
            when.method(GET).path("/v1/objects/Services");
            then.status(200).json_body(fixtures::objects_response(vec![
                fixtures::service_object("t1-host1", "NGINX", 1.0, false),
            ]));
        })
        .await;

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let services = proxy.get_services().await.unwrap();

        assert_eq!(services.len(), 3);
        let by_key: HashMap<(String, String), &Service> = services
            .iter()
            .map(|s| ((s.host_name.clone(), s.service_name.clone()), s))
            .collect();
        // different service names, but the shared host gets renamed anyway
        let es = by_key
            .get(&("t1-host1_s1".to_string(), "ELASTICSEARCH".to_string()))
            .expect("service on colliding host must carry the renamed host");
        assert!(es.flapping);
        assert_eq!(es.state, service_state::OK);
        assert!(by_key.contains_key(&("t1-host1_s2".to_string(), "NGINX".to_string())));
        // service under a host only s1 knows stays untouched
        assert!(by_key.contains_key(&("t1-lb1".to_string(), "HAPROXY".to_string())));
    }

    #[tokio::test]
    async fn test_downtime_union_is_deduplicated() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        s1.mock_async(|when, then| {
            when.method(POST).path("/v1/actions/schedule-downtime");
            then.status(200)
                .json_body(fixtures::downtime_response(&["t1-host1", "t1-host2"]));
        })
        .await;
        s2.mock_async(|when, then| {
            when.method(POST).path("/v1/actions/schedule-downtime");
            then.status(200)
                .json_body(fixtures::downtime_response(&["t1-host1"]));
        })
        .await;

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let names = proxy
            .schedule_host_downtime("t1-host*", &test_downtime())
            .await
            .unwrap();

        assert_eq!(names, vec!["t1-host1", "t1-host2"]);
    }

    #[tokio::test]
    async fn test_one_failed_backend_still_succeeds() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        mock_hosts(&s1, &["t1-host1"]).await;
        s2.mock_async(|when, then| {
            when.method(GET).path("/v1/objects/Hosts");
            then.status(502).body("bad gateway");
        })
        .await;

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let hosts = proxy.get_hosts().await.unwrap();

        // the failed backend's data is simply absent from the merge
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].host_name, "t1-host1");
    }

    #[tokio::test]
    async fn test_all_backends_failed_is_an_error_with_per_backend_detail() {
        let s1 = MockServer::start_async().await;
        let s2 = MockServer::start_async().await;
        for server in [&s1, &s2] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/v1/objects/Hosts");
                    then.status(500).body("boom");
                })
                .await;
        }

        let proxy = proxy_over(&[("s1", &s1), ("s2", &s2)]);
        let err = proxy.get_hosts().await.unwrap_err();
        match err {
            Error::AllBackendsFailed(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains_key("s1"));
                assert!(errors.contains_key("s2"));
            }
            other => panic!("expected aggregated failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_backends_is_an_error() {
        let proxy = Proxy::new(&HashMap::new()).unwrap();
        let err = proxy.get_hosts().await.unwrap_err();
        assert!(matches!(err, Error::AllBackendsFailed(e) if e.is_empty()));
    }

    #[test]
    fn test_bad_backend_url_aborts_construction() {
        let map: HashMap<String, ServerConfig> =
            [("s1".to_string(), server_config("::not-a-url::"))].into();
        assert!(matches!(
            Proxy::new(&map),
            Err(Error::InvalidUrl { .. })
        ));
    }
}
