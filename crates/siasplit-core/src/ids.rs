//! Typed identifiers.
//!
//! Newtypes over `Uuid` so a bucket id can never be confused with a run id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Generate a fresh random (v4) identifier.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Uuid::parse_str(s).map(Self)
                }
            }

            impl From<Uuid> for $name {
                fn from(uuid: Uuid) -> Self {
                    Self(uuid)
                }
            }
        )+
    };
}

typed_id! {
    /// Name of the per-upload bucket created under the root bucket.
    BucketId,
    /// Identifies one orchestrator run in the event stream.
    RunId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_ids_are_unique() {
        assert_ne!(BucketId::new(), BucketId::new());
    }

    #[test]
    fn display_and_from_str() {
        let id = BucketId::new();
        let parsed: BucketId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn display_is_hyphenated_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(BucketId::from(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn invalid_from_str() {
        assert!(RunId::from_str("not-a-uuid").is_err());
    }
}
