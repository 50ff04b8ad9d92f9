use serde_json::Value;

#[doc(hidden)]
pub mod graphql;
#[doc(hidden)]
pub mod sequencer;

pub use graphql::SnapshotClient;
pub use sequencer::SequencerClient;

/// A pagination window forwarded to the upstream data hub.
///
/// Values arrive here already clamped by the catalog layer; the clients
/// never clamp on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of records to fetch.
    pub first: i64,
    /// Number of records to skip.
    pub skip: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { first: 20, skip: 0 }
    }
}

/// Filters for listing/searching spaces.
#[derive(Debug, Clone, Default)]
pub struct SpaceFilter {
    /// Pagination window.
    pub page: Page,
    /// Substring match against space ids.
    pub search: Option<String>,
    /// Restrict to spaces carrying this category.
    pub category: Option<String>,
}

/// Filters for listing/searching proposals.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    /// Pagination window.
    pub page: Page,
    /// Restrict to proposals of this space.
    pub space: Option<String>,
    /// Proposal state (`active`, `pending`, `closed`); `None` means all.
    pub state: Option<String>,
    /// Restrict to proposals created by this (lowercased) address.
    pub author: Option<String>,
}

/// The fields of a proposal to be created.
///
/// Absent optional fields are defaulted by the action client: `start` to
/// now, `end` to one week later, `voting_type` to `single-choice` and
/// `snapshot_block` to the current chain head.
#[derive(Debug, Clone, Default)]
pub struct ProposalDraft {
    /// Proposal title.
    pub title: String,
    /// Proposal body text.
    pub body: String,
    /// Link to the discussion thread, if any.
    pub discussion: Option<String>,
    /// The declared choices voters pick from.
    pub choices: Vec<String>,
    /// Voting window start, unix seconds.
    pub start: Option<u64>,
    /// Voting window end, unix seconds.
    pub end: Option<u64>,
    /// Snapshot block number as a string, or the `latest` sentinel.
    pub snapshot_block: Option<String>,
    /// Voting system, e.g. `single-choice` or `weighted`.
    pub voting_type: Option<String>,
}

/// Read access to the upstream governance data hub.
///
/// There are two implementations: the real GraphQL-backed
/// [`SnapshotClient`], and stubs in the test-suite that replay canned
/// payloads.
#[async_trait::async_trait]
pub trait GovernanceData: Send + Sync {
    /// Fetch a single space by id.
    async fn space(&self, id: &str) -> crate::Result<Value>;
    /// List spaces matching the given filter.
    async fn spaces(&self, filter: SpaceFilter) -> crate::Result<Value>;
    /// Fetch a single proposal by id.
    async fn proposal(&self, id: &str) -> crate::Result<Value>;
    /// List proposals matching the given filter.
    async fn proposals(&self, filter: ProposalFilter) -> crate::Result<Value>;
    /// List the votes cast on a proposal.
    async fn votes(&self, proposal: &str, page: Page) -> crate::Result<Value>;
    /// Fetch a user profile by address.
    async fn user(&self, address: &str) -> crate::Result<Value>;
    /// List the spaces a (lowercased) address follows.
    async fn follows(&self, address: &str, page: Page) -> crate::Result<Value>;
}

/// Signing and submission of governance actions.
///
/// Everything except the identity operations fails fast with
/// [`crate::Error::NoIdentity`] until an identity has been created or
/// imported. Submissions are signed, irreversible and not idempotent.
#[async_trait::async_trait]
pub trait GovernanceActions: Send + Sync {
    /// Generate a fresh signing identity, replacing any existing one.
    /// Returns the checksummed address.
    async fn create_identity(&self) -> crate::Result<String>;
    /// Import a signing identity from a hex-encoded private key, replacing
    /// any existing one. Returns the checksummed address.
    async fn import_identity(&self, key: &str) -> crate::Result<String>;
    /// The checksummed address of the current identity.
    async fn address(&self) -> crate::Result<String>;
    /// Create a proposal in the given space.
    async fn create_proposal(
        &self,
        space: &str,
        draft: ProposalDraft,
    ) -> crate::Result<Value>;
    /// Cast a vote on a proposal. `choice` is forwarded verbatim (1-based
    /// index by upstream convention); a blank reason is omitted entirely.
    async fn cast_vote(
        &self,
        space: &str,
        proposal: &str,
        choice: Value,
        reason: Option<String>,
    ) -> crate::Result<Value>;
    /// Follow a space.
    async fn follow_space(&self, space: &str) -> crate::Result<Value>;
    /// Unfollow a space.
    async fn unfollow_space(&self, space: &str) -> crate::Result<Value>;
}
