/// An enum of all possible errors that could be encountered during the
/// execution of the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config from the environment.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the underlying Http server.
    #[error(transparent)]
    Warp(#[from] warp::Error),
    /// Error in the upstream Http client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWallet(#[from] ethers::signers::WalletError),
    /// The local advisory rate limit toward the upstream hub was hit.
    ///
    /// Raised before any network call is made.
    #[error("Rate limit exceeded: more than {max} upstream queries within {window_secs}s")]
    RateLimitExceeded {
        /// Maximum number of queries allowed per window.
        max: u32,
        /// Length of the sliding window in seconds.
        window_secs: u64,
    },
    /// An action was requested before any signing identity was established.
    #[error("No signing identity configured. Create or import one first")]
    NoIdentity,
    /// The upstream service answered with a non-2xx status or an error list.
    #[error("Upstream error ({status}): {message}")]
    Upstream {
        /// The HTTP status the upstream answered with.
        status: u16,
        /// The upstream's own wording, verbatim.
        message: String,
    },
    /// The arguments of a tool call did not match its declared schema.
    #[error("Invalid parameters: {}", _0)]
    Validation(String),
    /// The requested tool is not part of the catalog.
    #[error("Unknown tool: {}", _0)]
    UnknownTool(String),
    /// A governance action failed while being signed or submitted.
    ///
    /// Carries the failing operation and the underlying cause; the chain is
    /// rendered to text only at the handler boundary.
    #[error("Failed to {operation}")]
    Action {
        /// Human-readable name of the failing operation.
        operation: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

impl Error {
    /// Renders this error and its ordered cause chain into a single line.
    ///
    /// Inner messages are preserved verbatim, so upstream wording survives
    /// all the wrapping layers.
    pub fn chain(&self) -> String {
        use std::error::Error as _;
        let mut rendered = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

/// A type alias for the result of the gateway, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
