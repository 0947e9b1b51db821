//! Client display names.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters a generated client name is drawn from.
pub const NAME_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a generated client name.
pub const NAME_LEN: usize = 8;

/// Display name assigned to a connected scanner device.
///
/// Names are generated server-side when a device connects and stay
/// immutable for the session's lifetime. The operator uses them to
/// target commands (`enroll <name>`, `disconnect <name>`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientName(String);

impl ClientName {
    /// Creates a client name from an existing string.
    ///
    /// Note: this does not check length or charset. Operator input is
    /// matched against registry members, so an arbitrary string simply
    /// never matches.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generates a random 8-character name.
    ///
    /// Uniqueness is not guaranteed here; the registry retries on
    /// collision so that membership and uniqueness are decided in one
    /// place.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let name = (0..NAME_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..NAME_CHARSET.len());
                NAME_CHARSET[idx] as char
            })
            .collect();
        Self(name)
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_fixed_length_and_charset() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let name = ClientName::generate(&mut rng);
            assert_eq!(name.as_str().len(), NAME_LEN);
            assert!(name
                .as_str()
                .bytes()
                .all(|b| NAME_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn names_compare_by_value() {
        assert_eq!(ClientName::new("abCD1234"), ClientName::from("abCD1234"));
        assert_ne!(ClientName::new("abCD1234"), ClientName::new("abcd1234"));
    }
}
