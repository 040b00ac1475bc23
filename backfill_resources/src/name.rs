//! Type-safe resource identifiers.
//!
//! Organizations and sites are addressed by short, validated ids. The
//! `resource_type!` macro generates one name type per resource so that an
//! organization id can never be passed where a site id is expected.

use snafu::Snafu;

/// Errors that can occur when parsing resource names.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ResourceError {
    #[snafu(display("invalid resource name format: expected '{expected}' but got '{actual}'"))]
    InvalidFormat { expected: String, actual: String },
    #[snafu(display(
        "invalid resource id: '{id}' - must be at least 1 character long, start with lowercase letter, and contain only lowercase letters, numbers, hyphens, and underscores"
    ))]
    InvalidResourceId { id: String },
    #[snafu(display("invalid import id: '{id}'"))]
    InvalidImportId { id: String },
}

pub type ResourceResult<T, E = ResourceError> = ::std::result::Result<T, E>;

/// Validate a resource id.
///
/// Valid resource ids must:
/// - Be at least 1 character long
/// - Start with a lowercase letter [a-z]
/// - Contain only lowercase letters, numbers, hyphens (-), and underscores (_)
pub fn validate_resource_id(id: &str) -> ResourceResult<()> {
    let mut chars = id.chars();

    match chars.next() {
        Some(first_char) if first_char.is_ascii_lowercase() => {}
        _ => return Err(ResourceError::InvalidResourceId { id: id.to_string() }),
    }

    for ch in chars {
        if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '-' && ch != '_' {
            return Err(ResourceError::InvalidResourceId { id: id.to_string() });
        }
    }

    Ok(())
}

/// Generate a type-safe name for a top-level resource.
#[macro_export]
macro_rules! resource_type {
    ($name:ident, $prefix:literal) => {
        paste::paste! {
            #[doc = "Type-safe identifier for a " $name " resource."]
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct [<$name Name>] {
                /// The resource ID.
                pub id: String,
            }

            impl [<$name Name>] {
                #[doc = "Create a new " $name " resource identifier."]
                pub fn new(id: impl Into<String>) -> $crate::name::ResourceResult<Self> {
                    let id = id.into();
                    $crate::name::validate_resource_id(&id)?;
                    Ok(Self { id })
                }

                #[doc = "Create a new " $name " resource identifier without validation."]
                #[doc = ""]
                #[doc = "# Panics"]
                #[doc = ""]
                #[doc = "Panics if the resource ID is invalid."]
                pub fn new_unchecked(id: impl Into<String>) -> Self {
                    let id = id.into();
                    $crate::name::validate_resource_id(&id)
                        .expect("resource id must be valid");
                    Self { id }
                }

                #[doc = "Get the full resource name."]
                pub fn name(&self) -> String {
                    format!("{}/{}", $prefix, self.id)
                }

                #[doc = "Parse a resource name into a " $name " identifier."]
                pub fn parse(name: &str) -> $crate::name::ResourceResult<Self> {
                    let expected_prefix = concat!($prefix, "/");
                    if let Some(id) = name.strip_prefix(expected_prefix) {
                        $crate::name::validate_resource_id(id)?;
                        Ok(Self { id: id.to_string() })
                    } else {
                        Err($crate::name::ResourceError::InvalidFormat {
                            expected: format!("{}/{{id}}", $prefix),
                            actual: name.to_string(),
                        })
                    }
                }

                #[doc = "Get the resource ID."]
                pub fn id(&self) -> &str {
                    &self.id
                }
            }

            impl std::fmt::Display for [<$name Name>] {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.name())
                }
            }

            impl std::str::FromStr for [<$name Name>] {
                type Err = $crate::name::ResourceError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::parse(s)
                }
            }
        }
    };
}
