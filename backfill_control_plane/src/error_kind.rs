/// Stable categories of import errors, surfaced to callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, rejected before any state change.
    Validation,

    /// The caller may not act on the site.
    Forbidden,

    /// Unknown site or import.
    NotFound,

    /// Wrong site, already completed, or still active.
    Conflict,

    /// The organization reached its concurrent import limit.
    RateLimited,

    /// The first batch matched no known source format.
    UnrecognizedFormat,

    /// A metadata or event store operation failed.
    StoreFailure,
}

impl ErrorKind {
    /// Whether resending the same request may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::StoreFailure | Self::RateLimited)
    }

    /// Machine-readable name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::UnrecognizedFormat => "unrecognized_format",
            Self::StoreFailure => "store_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
