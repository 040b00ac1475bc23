use snafu::Snafu;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum SiteDirectoryError {
    #[snafu(display("{resource} not found: {message}"))]
    NotFound {
        resource: &'static str,
        message: String,
    },
    #[snafu(display("{resource} already exists: {message}"))]
    AlreadyExists {
        resource: &'static str,
        message: String,
    },
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = SiteDirectoryError> = ::std::result::Result<T, E>;

impl SiteDirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SiteDirectoryError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, SiteDirectoryError::AlreadyExists { .. })
    }
}
