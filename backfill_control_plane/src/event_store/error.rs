use snafu::Snafu;

/// Errors returned by the event store.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum EventStoreError {
    #[snafu(display("event store unavailable: {message}"))]
    Unavailable { message: String },
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = EventStoreError> = ::std::result::Result<T, E>;

impl EventStoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EventStoreError::Unavailable { .. })
    }
}
