//! Resolution of requested names into concrete units.
//!
//! A request names either a unit (`web` or `web.service`) or a template whose
//! instances are running (`web@1.service`, `web@2.service`, ...). An exact
//! unit always wins; instances are only looked up when no exact unit exists.

use std::sync::Arc;

use fleet_ship_client::{FleetApi, FleetError};

/// Suffix every unit name carries.
pub const SERVICE_SUFFIX: &str = ".service";

/// Append `.service` unless `name` already ends with it.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    if name.ends_with(SERVICE_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{SERVICE_SUFFIX}")
    }
}

/// Returns true if `candidate` is an instance (`<base>@<instance>`) of the
/// template named by `name`.
#[must_use]
pub fn is_instance_of(name: &str, candidate: &str) -> bool {
    let base = name.strip_suffix(SERVICE_SUFFIX).unwrap_or(name);

    candidate
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('@'))
        .is_some_and(|instance| !instance.is_empty())
}

/// The units a request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A unit with exactly the requested name exists.
    Exact(String),
    /// Instances of the requested template, in fleet listing order.
    Instances(Vec<String>),
    /// Nothing matched.
    Empty,
}

impl MatchResult {
    /// The matched unit names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Exact(name) => vec![name.as_str()],
            Self::Instances(names) => names.iter().map(String::as_str).collect(),
            Self::Empty => Vec::new(),
        }
    }

    /// Consume the result, returning the matched unit names.
    #[must_use]
    pub fn into_names(self) -> Vec<String> {
        match self {
            Self::Exact(name) => vec![name],
            Self::Instances(names) => names,
            Self::Empty => Vec::new(),
        }
    }

    /// Number of matched units.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(_) => 1,
            Self::Instances(names) => names.len(),
            Self::Empty => 0,
        }
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of resolving a name.
#[derive(Debug)]
pub enum Discovery {
    /// Fleet answered; the match may still be empty.
    Found(MatchResult),
    /// No exact unit was found and fleet could not list units.
    RemoteUnavailable(FleetError),
}

/// Resolves requested names against fleet's unit list.
pub struct UnitMatcher<F: FleetApi + ?Sized> {
    fleet: Arc<F>,
}

impl<F: FleetApi + ?Sized> Clone for UnitMatcher<F> {
    fn clone(&self) -> Self {
        Self {
            fleet: Arc::clone(&self.fleet),
        }
    }
}

impl<F: FleetApi + ?Sized> UnitMatcher<F> {
    /// Create a matcher backed by `fleet`.
    #[must_use]
    pub fn new(fleet: Arc<F>) -> Self {
        Self { fleet }
    }

    /// Resolve `name` into the units it denotes.
    pub async fn resolve(&self, name: &str) -> Discovery {
        let name = normalize_name(name);

        match self.fleet.unit(&name).await {
            Ok(Some(_)) => return Discovery::Found(MatchResult::Exact(name)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(unit = %name, error = %e, "Exact unit lookup failed, trying instances");
            }
        }

        let units = match self.fleet.units().await {
            Ok(units) => units,
            Err(e) => {
                tracing::error!(unit = %name, error = %e, "Failed to list units for discovery");
                return Discovery::RemoteUnavailable(e);
            }
        };

        let instances: Vec<String> = units
            .into_iter()
            .filter(|unit| is_instance_of(&name, &unit.name))
            .map(|unit| unit.name)
            .collect();

        tracing::debug!(unit = %name, instances = instances.len(), "Resolved template instances");

        if instances.is_empty() {
            Discovery::Found(MatchResult::Empty)
        } else {
            Discovery::Found(MatchResult::Instances(instances))
        }
    }
}

#[cfg(test)]
mod tests {
    use fleet_ship_client::mock::{FleetCall, MockFleet};
    use fleet_ship_client::JobState;

    use super::*;

    fn found(discovery: Discovery) -> MatchResult {
        match discovery {
            Discovery::Found(result) => result,
            Discovery::RemoteUnavailable(e) => panic!("unexpected discovery failure: {e}"),
        }
    }

    #[test]
    fn normalize_appends_suffix() {
        assert_eq!(normalize_name("foo"), "foo.service");
        assert_eq!(normalize_name("foo.service"), "foo.service");
        assert_eq!(normalize_name("foo@1"), "foo@1.service");
    }

    #[test]
    fn normalize_is_idempotent() {
        for name in ["", "foo", "foo.service", "foo.service.service", "a.b", "web@2"] {
            let once = normalize_name(name);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn instance_matching() {
        assert!(is_instance_of("foo.service", "foo@1.service"));
        assert!(is_instance_of("foo", "foo@web.service"));
        assert!(!is_instance_of("foo.service", "foo.service"));
        assert!(!is_instance_of("foo.service", "foo@"));
        assert!(!is_instance_of("foo.service", "foobar@1.service"));
        assert!(!is_instance_of("foo.service", "bar@1.service"));
    }

    #[test]
    fn instance_matching_is_literal() {
        assert!(is_instance_of("a.b.service", "a.b@1.service"));
        assert!(!is_instance_of("a.b.service", "axb@1.service"));
    }

    #[test]
    fn match_result_accessors() {
        let exact = MatchResult::Exact("a.service".into());
        assert_eq!(exact.names(), ["a.service"]);
        assert_eq!(exact.len(), 1);

        let instances = MatchResult::Instances(vec!["a@1.service".into(), "a@2.service".into()]);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances.clone().into_names(), ["a@1.service", "a@2.service"]);

        assert!(MatchResult::Empty.is_empty());
        assert!(MatchResult::Empty.names().is_empty());
    }

    #[tokio::test]
    async fn exact_match_takes_precedence() {
        let fleet = Arc::new(MockFleet::with_units([
            ("x@1.service", JobState::Launched),
            ("x.service", JobState::Launched),
        ]));
        let matcher = UnitMatcher::new(Arc::clone(&fleet));

        let result = found(matcher.resolve("x").await);
        assert_eq!(result, MatchResult::Exact("x.service".into()));
        assert!(!fleet.calls().contains(&FleetCall::Units));
    }

    #[tokio::test]
    async fn template_instances_in_listing_order() {
        let fleet = Arc::new(MockFleet::with_units([
            ("foo@1.service", JobState::Launched),
            ("bar.service", JobState::Launched),
            ("foo@2.service", JobState::Loaded),
        ]));
        let matcher = UnitMatcher::new(fleet);

        let result = found(matcher.resolve("foo").await);
        assert_eq!(
            result,
            MatchResult::Instances(vec!["foo@1.service".into(), "foo@2.service".into()])
        );
    }

    #[tokio::test]
    async fn no_match_is_empty() {
        let fleet = Arc::new(MockFleet::with_units([("bar.service", JobState::Launched)]));
        let matcher = UnitMatcher::new(fleet);

        assert_eq!(found(matcher.resolve("foo").await), MatchResult::Empty);
    }

    #[tokio::test]
    async fn listing_failure_is_remote_unavailable() {
        let fleet = Arc::new(MockFleet::new());
        fleet.fail_listing();
        let matcher = UnitMatcher::new(fleet);

        assert!(matches!(
            matcher.resolve("foo").await,
            Discovery::RemoteUnavailable(FleetError::Query(_))
        ));
    }

    #[tokio::test]
    async fn exact_lookup_error_falls_back_to_listing() {
        let fleet = Arc::new(MockFleet::with_units([("foo@1.service", JobState::Launched)]));
        fleet.fail_queries("foo.service", 1);
        let matcher = UnitMatcher::new(Arc::clone(&fleet));

        let result = found(matcher.resolve("foo.service").await);
        assert_eq!(result, MatchResult::Instances(vec!["foo@1.service".into()]));
        assert_eq!(
            fleet.calls(),
            [FleetCall::Unit("foo.service".into()), FleetCall::Units]
        );
    }
}
