use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Candidate profile identifier. ULID strings, so lexicographic order is
/// creation order and ranking tie-breaks stay stable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct ProfileId(String);

impl Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ProfileId(s.to_string()))
    }
}

impl Deref for ProfileId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for ProfileId {
    fn from(fr: &str) -> Self {
        ProfileId(fr.to_string())
    }
}

impl From<String> for ProfileId {
    fn from(fr: String) -> Self {
        ProfileId(fr)
    }
}

impl From<ProfileId> for String {
    fn from(fr: ProfileId) -> Self {
        fr.0
    }
}

impl ProfileId {
    #[inline]
    pub fn new() -> ProfileId {
        ProfileId(rusty_ulid::generate_ulid_string())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}
