use super::*;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, new)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::convert::AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Identifier of a property listing.
    ListingId
}

string_id! {
    /// Identifier of an authenticated account.
    AccountId
}

string_id! {
    /// Per-browser-session identifier handed to visitors that are not signed in.
    SessionId
}

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Who produced an observation. Exactly one identity is known per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Viewer {
    Account(AccountId),
    Anonymous(SessionId),
}

impl Viewer {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Viewer::Account(id) => Some(id),
            Viewer::Anonymous(_) => None,
        }
    }
}

impl std::fmt::Display for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Viewer::Account(id) => write!(f, "account:{id}"),
            Viewer::Anonymous(id) => write!(f, "session:{id}"),
        }
    }
}
