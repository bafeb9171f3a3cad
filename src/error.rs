use thiserror::Error;

/// Failures raised by the board client. Everything else in the crate degrades
/// instead of erroring: unparseable fields become `Value::Absent` and show up
/// in the quality report, bad filter specs produce an empty table plus a
/// caveat, and aggregations over all-absent columns return zero with a caveat.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to board API failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("board API rejected credentials (status {status})")]
    Auth { status: u16 },

    #[error("board API returned errors: {0}")]
    Api(String),

    #[error("board {0} missing from API response")]
    MissingBoard(String),

    #[error("malformed board API response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid board API URL: {0}")]
    BadUrl(#[from] url::ParseError),

    #[error("failed to read alias file {path}: {source}")]
    AliasFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse alias file {path}: {source}")]
    AliasParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
