use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use url::Url;

use crate::config::RateLimitConfig;

use super::{GovernanceData, Page, ProposalFilter, SpaceFilter};

const SPACE_QUERY: &str = r#"
query Space($id: String!) {
  space(id: $id) {
    id
    name
    about
    network
    symbol
    members
    admins
    categories
    proposalsCount
    followersCount
    voting { delay period type quorum }
  }
}"#;

const SPACES_QUERY: &str = r#"
query Spaces($first: Int!, $skip: Int!, $where: SpaceWhere) {
  spaces(first: $first, skip: $skip, orderBy: "created", orderDirection: desc, where: $where) {
    id
    name
    about
    network
    categories
    proposalsCount
    followersCount
  }
}"#;

const PROPOSAL_QUERY: &str = r#"
query Proposal($id: String!) {
  proposal(id: $id) {
    id
    title
    body
    choices
    start
    end
    snapshot
    state
    author
    space { id name }
    scores
    scores_total
    votes
  }
}"#;

const PROPOSALS_QUERY: &str = r#"
query Proposals($first: Int!, $skip: Int!, $where: ProposalWhere) {
  proposals(first: $first, skip: $skip, orderBy: "created", orderDirection: desc, where: $where) {
    id
    title
    choices
    start
    end
    snapshot
    state
    author
    space { id name }
    scores
    votes
  }
}"#;

const VOTES_QUERY: &str = r#"
query Votes($first: Int!, $skip: Int!, $proposal: String!) {
  votes(first: $first, skip: $skip, orderBy: "vp", orderDirection: desc, where: { proposal: $proposal }) {
    id
    voter
    vp
    choice
    reason
    created
  }
}"#;

const USER_QUERY: &str = r#"
query User($id: String!) {
  user(id: $id) {
    id
    name
    about
    avatar
    created
  }
}"#;

const FOLLOWS_QUERY: &str = r#"
query Follows($first: Int!, $skip: Int!, $follower: String!) {
  follows(first: $first, skip: $skip, where: { follower: $follower }) {
    id
    follower
    space { id name }
    created
  }
}"#;

/// A sliding window over the recent upstream query count.
///
/// Advisory self-throttling toward the upstream hub, not a guarantee
/// against server-side limits. Not shared across processes.
#[derive(Debug)]
pub(crate) struct RateWindow {
    count: u32,
    window_started: Instant,
    max: u32,
    window: Duration,
}

impl RateWindow {
    pub(crate) fn new(max: u32, window: Duration) -> Self {
        Self {
            count: 0,
            window_started: Instant::now(),
            max,
            window,
        }
    }

    /// Registers one upstream call at `now`, resetting the window first if
    /// it has elapsed. Fails without counting once the window is full.
    pub(crate) fn register(&mut self, now: Instant) -> crate::Result<()> {
        if now.duration_since(self.window_started) > self.window {
            self.count = 0;
            self.window_started = now;
        }
        if self.count >= self.max {
            return Err(crate::Error::RateLimitExceeded {
                max: self.max,
                window_secs: self.window.as_secs(),
            });
        }
        self.count += 1;
        Ok(())
    }
}

/// A thin client over the governance data hub's GraphQL endpoint.
///
/// One request per call: no batching, no retry, no caching. Identical
/// calls always re-hit the network.
pub struct SnapshotClient {
    http: reqwest::Client,
    endpoint: Url,
    window: Mutex<RateWindow>,
}

impl SnapshotClient {
    /// Creates a new client for the given endpoint.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            http,
            endpoint,
            window: Mutex::new(RateWindow::new(
                rate_limit.max_requests,
                Duration::from_secs(rate_limit.window_secs),
            )),
        }
    }

    /// Issues one parameterized query and returns the decoded `data` field.
    ///
    /// A non-2xx response or a non-empty `errors` list both map to
    /// [`crate::Error::Upstream`], carrying the upstream wording verbatim.
    pub async fn query(
        &self,
        query: &str,
        variables: Value,
    ) -> crate::Result<Value> {
        self.window
            .lock()
            .map_err(|_| crate::Error::Generic("rate window lock poisoned"))?
            .register(Instant::now())?;
        tracing::event!(
            target: crate::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %crate::probe::Kind::Query,
            endpoint = %self.endpoint,
        );
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(crate::Error::Upstream {
                status: status.as_u16(),
                message: text,
            });
        }
        let body: Value = serde_json::from_str(&text)?;
        let upstream_errors = body
            .get("errors")
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty());
        if let Some(errors) = upstream_errors {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(crate::Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

// Pure request builders, one per query shape. Everything is bound as a
// GraphQL variable; nothing is interpolated into the query body.

pub(crate) fn space_request(id: &str) -> (&'static str, Value) {
    (SPACE_QUERY, json!({ "id": id }))
}

pub(crate) fn spaces_request(filter: &SpaceFilter) -> (&'static str, Value) {
    let mut where_clause = serde_json::Map::new();
    if let Some(search) = &filter.search {
        where_clause.insert("id_contains".into(), json!(search));
    }
    if let Some(category) = &filter.category {
        where_clause.insert("category_in".into(), json!([category]));
    }
    (
        SPACES_QUERY,
        json!({
            "first": filter.page.first,
            "skip": filter.page.skip,
            "where": where_clause,
        }),
    )
}

pub(crate) fn proposal_request(id: &str) -> (&'static str, Value) {
    (PROPOSAL_QUERY, json!({ "id": id }))
}

pub(crate) fn proposals_request(
    filter: &ProposalFilter,
) -> (&'static str, Value) {
    let mut where_clause = serde_json::Map::new();
    if let Some(space) = &filter.space {
        where_clause.insert("space_in".into(), json!([space]));
    }
    if let Some(state) = &filter.state {
        where_clause.insert("state".into(), json!(state));
    }
    if let Some(author) = &filter.author {
        where_clause.insert("author_in".into(), json!([author]));
    }
    (
        PROPOSALS_QUERY,
        json!({
            "first": filter.page.first,
            "skip": filter.page.skip,
            "where": where_clause,
        }),
    )
}

pub(crate) fn votes_request(
    proposal: &str,
    page: Page,
) -> (&'static str, Value) {
    (
        VOTES_QUERY,
        json!({
            "first": page.first,
            "skip": page.skip,
            "proposal": proposal,
        }),
    )
}

pub(crate) fn user_request(address: &str) -> (&'static str, Value) {
    (USER_QUERY, json!({ "id": address }))
}

pub(crate) fn follows_request(
    address: &str,
    page: Page,
) -> (&'static str, Value) {
    (
        FOLLOWS_QUERY,
        json!({
            "first": page.first,
            "skip": page.skip,
            "follower": address,
        }),
    )
}

#[async_trait::async_trait]
impl GovernanceData for SnapshotClient {
    async fn space(&self, id: &str) -> crate::Result<Value> {
        let (query, variables) = space_request(id);
        self.query(query, variables).await
    }

    async fn spaces(&self, filter: SpaceFilter) -> crate::Result<Value> {
        let (query, variables) = spaces_request(&filter);
        self.query(query, variables).await
    }

    async fn proposal(&self, id: &str) -> crate::Result<Value> {
        let (query, variables) = proposal_request(id);
        self.query(query, variables).await
    }

    async fn proposals(&self, filter: ProposalFilter) -> crate::Result<Value> {
        let (query, variables) = proposals_request(&filter);
        self.query(query, variables).await
    }

    async fn votes(&self, proposal: &str, page: Page) -> crate::Result<Value> {
        let (query, variables) = votes_request(proposal, page);
        self.query(query, variables).await
    }

    async fn user(&self, address: &str) -> crate::Result<Value> {
        let (query, variables) = user_request(address);
        self.query(query, variables).await
    }

    async fn follows(&self, address: &str, page: Page) -> crate::Result<Value> {
        let (query, variables) = follows_request(address, page);
        self.query(query, variables).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(max_requests: u32) -> SnapshotClient {
        SnapshotClient::new(
            reqwest::Client::new(),
            // a port nothing listens on, so an accidental network call
            // would fail loudly with a different error kind.
            Url::parse("http://127.0.0.1:9/graphql").unwrap(),
            RateLimitConfig {
                max_requests,
                window_secs: 60,
            },
        )
    }

    #[test]
    fn window_allows_up_to_the_limit_and_then_fails() {
        let mut window = RateWindow::new(50, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..50 {
            window.register(now).unwrap();
        }
        let err = window.register(now).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::RateLimitExceeded {
                max: 50,
                window_secs: 60
            }
        ));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let mut window = RateWindow::new(50, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..50 {
            window.register(start).unwrap();
        }
        assert!(window.register(start).is_err());
        // simulate the window elapsing.
        let later = start + Duration::from_secs(61);
        window.register(later).unwrap();
    }

    #[tokio::test]
    async fn exhausted_window_fails_before_any_network_call() {
        let client = test_client(0);
        let err = client.space("example.eth").await.unwrap_err();
        assert!(matches!(err, crate::Error::RateLimitExceeded { .. }));
    }

    #[test]
    fn space_lookup_binds_the_id_as_a_variable() {
        let (query, variables) = space_request("example.eth");
        assert!(query.contains("space(id: $id)"));
        assert!(!query.contains("example.eth"));
        assert_eq!(variables, serde_json::json!({ "id": "example.eth" }));
    }

    #[test]
    fn spaces_filter_builds_a_where_clause() {
        let filter = SpaceFilter {
            page: Page { first: 10, skip: 5 },
            search: Some("ens".into()),
            category: Some("protocol".into()),
        };
        let (_, variables) = spaces_request(&filter);
        assert_eq!(variables["first"], 10);
        assert_eq!(variables["skip"], 5);
        assert_eq!(variables["where"]["id_contains"], "ens");
        assert_eq!(variables["where"]["category_in"][0], "protocol");
    }

    #[test]
    fn proposals_filter_omits_absent_fields() {
        let filter = ProposalFilter {
            page: Page::default(),
            space: Some("example.eth".into()),
            state: None,
            author: None,
        };
        let (_, variables) = proposals_request(&filter);
        assert_eq!(variables["where"]["space_in"][0], "example.eth");
        assert!(variables["where"].get("state").is_none());
        assert!(variables["where"].get("author_in").is_none());
    }

    #[test]
    fn votes_request_carries_pagination_and_proposal() {
        let (query, variables) =
            votes_request("0xproposal", Page { first: 1000, skip: 0 });
        assert!(query.contains("proposal: $proposal"));
        assert_eq!(variables["first"], 1000);
        assert_eq!(variables["proposal"], "0xproposal");
    }
}
