//! HTTP client for the fleet v1 API.
//!
//! The [`FleetApi`] trait is the seam the orchestrator depends on;
//! [`HttpFleetClient`] implements it against a live fleet daemon.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::{FleetError, Result};
use crate::transport::{build_http_client, Endpoint, TransportOptions};
use crate::types::{DesiredStateRequest, JobState, Machine, MachinePage, Unit, UnitPage};

/// Operations the orchestrator needs from the cluster control plane.
///
/// Implementations must be safe to call concurrently from many tasks through
/// a shared reference; no external locking is applied by callers.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Fetch a single unit.
    ///
    /// Returns `Ok(None)` if fleet does not know the unit.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Query` if the request fails.
    async fn unit(&self, name: &str) -> Result<Option<Unit>>;

    /// List every unit, in the order fleet reports them.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Query` if any page request fails.
    async fn units(&self) -> Result<Vec<Unit>>;

    /// List every machine in the cluster.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Query` if any page request fails.
    async fn machines(&self) -> Result<Vec<Machine>>;

    /// Ask fleet to drive a unit towards `state`.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Mutation` if fleet rejects the request or it
    /// cannot be delivered.
    async fn set_unit_target_state(&self, name: &str, state: JobState) -> Result<()>;
}

/// Select a transport for `address` and build a client bound to it.
///
/// # Errors
///
/// Returns `FleetError::Transport` if the address is invalid or the client
/// cannot be constructed.
pub fn connect(address: &str, options: &TransportOptions) -> Result<HttpFleetClient> {
    let endpoint = Endpoint::parse(address)?;
    HttpFleetClient::new(endpoint, options)
}

/// Fleet API client over HTTP, carried by TCP or a Unix domain socket.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    client: reqwest::Client,
    endpoint: Endpoint,
}

/// Error body returned by fleet.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    code: u16,
    message: String,
}

impl HttpFleetClient {
    /// Create a client for an already parsed endpoint.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Transport` if the HTTP client cannot be built.
    pub fn new(endpoint: Endpoint, options: &TransportOptions) -> Result<Self> {
        let client = build_http_client(&endpoint, options)?;
        Ok(Self { client, endpoint })
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build `<base>/fleet/v1/<segments...>`, encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.base_url().clone();
        if url.cannot_be_a_base() {
            return Err(FleetError::Query(format!("endpoint {url} cannot be a base")));
        }
        url.path_segments_mut()
            .map_err(|()| FleetError::Query("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["fleet", "v1"])
            .extend(segments);
        Ok(url)
    }

    /// Extract fleet's error message from a failed response.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("fleet returned status {status}"))
    }

    /// Fetch one page of a paginated collection.
    async fn get_page<T>(&self, collection: &str, token: Option<&str>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut url = self.url(&[collection])?;
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("nextPageToken", token);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FleetError::Query(format!("listing {collection} failed: {e}")))?;

        if !response.status().is_success() {
            let error = Self::error_message(response).await;
            tracing::warn!(collection, error = %error, "Fleet rejected listing");
            return Err(FleetError::Query(format!("listing {collection} failed: {error}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FleetError::Query(format!("failed to parse {collection} page: {e}")))
    }
}

#[async_trait]
impl FleetApi for HttpFleetClient {
    async fn unit(&self, name: &str) -> Result<Option<Unit>> {
        let url = self.url(&["units", name])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FleetError::Query(format!("fetching unit {name} failed: {e}")))?;

        match response.status() {
            status if status.is_success() => response
                .json::<Unit>()
                .await
                .map(Some)
                .map_err(|e| FleetError::Query(format!("failed to parse unit {name}: {e}"))),
            StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let error = Self::error_message(response).await;
                Err(FleetError::Query(format!("fetching unit {name} failed: {error}")))
            }
        }
    }

    async fn units(&self) -> Result<Vec<Unit>> {
        let mut units = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page: UnitPage = self.get_page("units", token.as_deref()).await?;
            units.extend(page.units);

            match page.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = units.len(), "Listed fleet units");
        Ok(units)
    }

    async fn machines(&self) -> Result<Vec<Machine>> {
        let mut machines = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page: MachinePage = self.get_page("machines", token.as_deref()).await?;
            machines.extend(page.machines);

            match page.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = machines.len(), "Listed fleet machines");
        Ok(machines)
    }

    async fn set_unit_target_state(&self, name: &str, state: JobState) -> Result<()> {
        let mutation_error = |reason: String| FleetError::Mutation {
            unit: name.to_string(),
            state,
            reason,
        };

        let url = self.url(&["units", name])?;
        let body = DesiredStateRequest {
            name,
            desired_state: state,
        };

        let response = self
            .client
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| mutation_error(e.to_string()))?;

        if response.status().is_success() {
            tracing::debug!(unit = %name, state = %state, "Set unit target state");
            Ok(())
        } else {
            let status = response.status();
            let error = Self::error_message(response).await;

            tracing::error!(
                unit = %name,
                state = %state,
                status = %status,
                error = %error,
                "Fleet rejected target state"
            );

            Err(mutation_error(error))
        }
    }
}

/// An in-memory fleet for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    /// A call recorded by [`MockFleet`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum FleetCall {
        /// `unit(name)`.
        Unit(String),
        /// `units()`.
        Units,
        /// `machines()`.
        Machines,
        /// `set_unit_target_state(name, state)`.
        SetTargetState(String, JobState),
    }

    /// A fleet stand-in that keeps units in memory and records every call.
    ///
    /// By default a unit converges instantly: setting its target state also
    /// sets its current state. Scripted observations queued with
    /// [`MockFleet::script_states`] are returned by `unit()` first.
    #[derive(Default)]
    pub struct MockFleet {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        units: Vec<Unit>,
        machines: Vec<Machine>,
        scripted: HashMap<String, VecDeque<Option<JobState>>>,
        failing_queries: HashMap<String, usize>,
        failing_mutations: Vec<JobState>,
        fail_listing: bool,
        converge_on_set: bool,
        calls: Vec<FleetCall>,
    }

    impl MockFleet {
        /// Create an empty mock fleet whose units converge instantly.
        #[must_use]
        pub fn new() -> Self {
            let fleet = Self::default();
            fleet.inner.lock().converge_on_set = true;
            fleet
        }

        /// Create a mock fleet holding units with the given names and states.
        #[must_use]
        pub fn with_units<'a>(units: impl IntoIterator<Item = (&'a str, JobState)>) -> Self {
            let fleet = Self::new();
            for (name, state) in units {
                fleet.add_unit(name, state);
            }
            fleet
        }

        /// Add a unit. Listing order is insertion order.
        pub fn add_unit(&self, name: &str, state: JobState) {
            self.inner.lock().units.push(Unit::new(name, Some(state)));
        }

        /// Add a machine.
        pub fn add_machine(&self, id: &str, primary_ip: &str) {
            self.inner.lock().machines.push(Machine {
                id: id.to_string(),
                primary_ip: primary_ip.to_string(),
                metadata: HashMap::new(),
            });
        }

        /// Queue current states that `unit(name)` reports before falling back
        /// to the stored unit. `None` entries report the unit as missing.
        pub fn script_states(&self, name: &str, states: impl IntoIterator<Item = Option<JobState>>) {
            self.inner
                .lock()
                .scripted
                .entry(name.to_string())
                .or_default()
                .extend(states);
        }

        /// Make the next `count` `unit(name)` calls fail.
        pub fn fail_queries(&self, name: &str, count: usize) {
            self.inner.lock().failing_queries.insert(name.to_string(), count);
        }

        /// Make every mutation towards `state` fail.
        pub fn fail_mutations_to(&self, state: JobState) {
            self.inner.lock().failing_mutations.push(state);
        }

        /// Make `units()` fail.
        pub fn fail_listing(&self) {
            self.inner.lock().fail_listing = true;
        }

        /// Keep current states unchanged when a target state is set.
        pub fn freeze_states(&self) {
            self.inner.lock().converge_on_set = false;
        }

        /// Every call made so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<FleetCall> {
            self.inner.lock().calls.clone()
        }

        /// Number of `unit()` calls made for `name`.
        #[must_use]
        pub fn query_count(&self, name: &str) -> usize {
            self.inner
                .lock()
                .calls
                .iter()
                .filter(|c| matches!(c, FleetCall::Unit(n) if n == name))
                .count()
        }

        /// Target states set so far for `name`, in order.
        #[must_use]
        pub fn mutations(&self, name: &str) -> Vec<JobState> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    FleetCall::SetTargetState(n, s) if n == name => Some(*s),
                    _ => None,
                })
                .collect()
        }

        /// The stored current state of `name`.
        #[must_use]
        pub fn current_state(&self, name: &str) -> Option<JobState> {
            self.inner
                .lock()
                .units
                .iter()
                .find(|u| u.name == name)
                .and_then(|u| u.current_state)
        }
    }

    #[async_trait]
    impl FleetApi for MockFleet {
        async fn unit(&self, name: &str) -> Result<Option<Unit>> {
            let mut inner = self.inner.lock();
            inner.calls.push(FleetCall::Unit(name.to_string()));

            if let Some(remaining) = inner.failing_queries.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FleetError::Query(format!("injected failure for {name}")));
                }
            }

            if let Some(state) = inner.scripted.get_mut(name).and_then(VecDeque::pop_front) {
                return Ok(state.map(|s| Unit::new(name, Some(s))));
            }

            Ok(inner.units.iter().find(|u| u.name == name).cloned())
        }

        async fn units(&self) -> Result<Vec<Unit>> {
            let mut inner = self.inner.lock();
            inner.calls.push(FleetCall::Units);

            if inner.fail_listing {
                return Err(FleetError::Query("injected listing failure".to_string()));
            }
            Ok(inner.units.clone())
        }

        async fn machines(&self) -> Result<Vec<Machine>> {
            let mut inner = self.inner.lock();
            inner.calls.push(FleetCall::Machines);
            Ok(inner.machines.clone())
        }

        async fn set_unit_target_state(&self, name: &str, state: JobState) -> Result<()> {
            let mut inner = self.inner.lock();
            inner
                .calls
                .push(FleetCall::SetTargetState(name.to_string(), state));

            if inner.failing_mutations.contains(&state) {
                return Err(FleetError::Mutation {
                    unit: name.to_string(),
                    state,
                    reason: "injected mutation failure".to_string(),
                });
            }

            let converge = inner.converge_on_set;
            if let Some(unit) = inner.units.iter_mut().find(|u| u.name == name) {
                unit.desired_state = Some(state);
                if converge {
                    unit.current_state = Some(state);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client_for(server: &MockServer) -> HttpFleetClient {
        connect(&server.uri(), &TransportOptions::default()).unwrap()
    }

    #[test]
    fn http_client_creation() {
        let client = connect("http://localhost:4001", &TransportOptions::default()).unwrap();
        assert_eq!(client.endpoint().address(), "http://localhost:4001");
    }

    #[test]
    fn connect_rejects_bad_address() {
        let err = connect("gopher://fleet", &TransportOptions::default()).unwrap_err();
        assert!(matches!(err, FleetError::Transport { .. }));
    }

    #[test]
    fn unit_names_are_single_segments() {
        let client = connect("http://fleet:4001/api", &TransportOptions::default()).unwrap();
        let url = client.url(&["units", "web@a/b.service"]).unwrap();
        assert_eq!(url.as_str(), "http://fleet:4001/api/fleet/v1/units/web@a%2Fb.service");
    }

    #[tokio::test]
    async fn unit_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/units/web.service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "web.service",
                "currentState": "launched",
                "desiredState": "launched"
            })))
            .mount(&server)
            .await;

        let unit = client_for(&server).await.unit("web.service").await.unwrap().unwrap();
        assert_eq!(unit.name, "web.service");
        assert!(unit.is_in(JobState::Launched));
    }

    #[tokio::test]
    async fn unit_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/units/ghost.service"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "unit does not exist"}
            })))
            .mount(&server)
            .await;

        let unit = client_for(&server).await.unit("ghost.service").await.unwrap();
        assert!(unit.is_none());
    }

    #[tokio::test]
    async fn unit_server_error_is_query_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/units/web.service"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": 500, "message": "etcd unavailable"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.unit("web.service").await.unwrap_err();
        match err {
            FleetError::Query(msg) => assert!(msg.contains("etcd unavailable")),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn units_follow_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/units"))
            .and(query_param("nextPageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "units": [{"name": "b.service", "currentState": "loaded"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/units"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "units": [{"name": "a.service", "currentState": "launched"}],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let units = client_for(&server).await.units().await.unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["a.service", "b.service"]);
    }

    #[tokio::test]
    async fn machines_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fleet/v1/machines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "machines": [{"id": "m1", "primaryIP": "10.0.0.1", "metadata": {}}]
            })))
            .mount(&server)
            .await;

        let machines = client_for(&server).await.machines().await.unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].id, "m1");
    }

    #[tokio::test]
    async fn set_target_state_sends_desired_state() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/fleet/v1/units/web.service"))
            .and(body_json(serde_json::json!({
                "name": "web.service",
                "desiredState": "loaded"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .set_unit_target_state("web.service", JobState::Loaded)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_target_state_rejection_is_mutation_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/fleet/v1/units/web.service"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {"code": 409, "message": "unit is being destroyed"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .set_unit_target_state("web.service", JobState::Inactive)
            .await
            .unwrap_err();

        match err {
            FleetError::Mutation { unit, state, reason } => {
                assert_eq!(unit, "web.service");
                assert_eq!(state, JobState::Inactive);
                assert_eq!(reason, "unit is being destroyed");
            }
            other => panic!("expected mutation error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn requests_travel_over_unix_socket() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::UnixListener;

        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("fleet.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let body = r#"{"machines":[{"id":"local","primaryIP":"127.0.0.1"}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        let address = format!("unix://{}", socket.display());
        let client = connect(&address, &TransportOptions::default()).unwrap();
        let machines = client.machines().await.unwrap();
        assert_eq!(machines[0].id, "local");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /fleet/v1/machines HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("host: domain-sock"));
    }

    #[tokio::test]
    async fn mock_converges_on_set() {
        let fleet = mock::MockFleet::with_units([("web.service", JobState::Launched)]);
        fleet
            .set_unit_target_state("web.service", JobState::Loaded)
            .await
            .unwrap();
        assert_eq!(fleet.current_state("web.service"), Some(JobState::Loaded));
        assert_eq!(fleet.mutations("web.service"), [JobState::Loaded]);
    }

    #[tokio::test]
    async fn mock_scripted_states_come_first() {
        let fleet = mock::MockFleet::with_units([("web.service", JobState::Launched)]);
        fleet.script_states("web.service", [Some(JobState::Inactive), None]);

        let first = fleet.unit("web.service").await.unwrap().unwrap();
        assert!(first.is_in(JobState::Inactive));
        assert!(fleet.unit("web.service").await.unwrap().is_none());
        let third = fleet.unit("web.service").await.unwrap().unwrap();
        assert!(third.is_in(JobState::Launched));
        assert_eq!(fleet.query_count("web.service"), 3);
    }
}
