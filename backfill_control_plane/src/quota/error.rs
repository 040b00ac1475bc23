use backfill_resources::OrganizationName;
use snafu::Snafu;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum QuotaError {
    #[snafu(display("failed to build quota tracker for {organization}: {message}"))]
    Build {
        organization: OrganizationName,
        message: String,
    },
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = QuotaError> = ::std::result::Result<T, E>;
