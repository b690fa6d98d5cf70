// SPDX-License-Identifier: Apache-2.0
//! Worker identifier.
//!
//! Unlike task ids, worker ids are not random: they are human-readable,
//! of the form `<host-ip>-w<index>`, and deliberately reused across
//! respawns of the same logical slot so worker logs stay correlated.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the `<host_ip>-w<index>` id for the given pool slot.
    pub fn for_slot(host_ip: &str, index: usize) -> Self {
        Self(format!("{host_ip}-w{index}"))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_slot_formats_host_and_index() {
        assert_eq!(WorkerId::for_slot("10.0.0.4", 2).as_str(), "10.0.0.4-w2");
    }
}
