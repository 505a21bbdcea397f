use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} must not be blank", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// Backend identifiers are opaque strings (`"Q12"`, `"env-2"`, uuids...).
// Each gets its own newtype so a plant id can never be passed where a
// question id is expected.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, trimming surrounding whitespace.
            ///
            /// For ids the program itself knows to be valid. Input from
            /// users or the backend goes through `FromStr` or serde, which
            /// reject blank ids.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                let raw: String = id.into();
                Self(raw.trim().to_owned())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self::new(s))
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a Question
    QuestionId
);
string_id!(
    /// Unique identifier for a report Module
    ModuleId
);
string_id!(
    /// Unique identifier for a Submodule
    SubmoduleId
);
string_id!(
    /// Unique identifier for a Category
    CategoryId
);
string_id!(
    /// Unique identifier for a Plant
    PlantId
);
string_id!(
    /// Unique identifier for a Company
    CompanyId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────
