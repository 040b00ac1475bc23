use std::net::AddrParseError;

use backfill_control_plane::sites::SiteDirectoryError;
use backfill_observability::ObservabilityError;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
    #[snafu(display("Invalid server URL"))]
    InvalidServerUrl { source: AddrParseError },
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Failed to seed {resource}"))]
    SeedSiteDirectory {
        resource: &'static str,
        source: SiteDirectoryError,
    },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
