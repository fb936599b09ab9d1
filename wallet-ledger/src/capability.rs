//! Caller capabilities
//!
//! Session callers hold every capability. API-key callers hold only the
//! capabilities granted to their key.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Permission to use one group of ledger operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Balance, history and deposit status
    Read,
    /// Deposit notifications
    Deposit,
    /// Outgoing transfers
    Transfer,
}

impl Capability {
    /// Every capability
    pub const ALL: [Capability; 3] = [Capability::Read, Capability::Deposit, Capability::Transfer];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Deposit => "deposit",
            Capability::Transfer => "transfer",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Capability::Read),
            "deposit" => Ok(Capability::Deposit),
            "transfer" => Ok(Capability::Transfer),
            other => Err(Error::Validation(format!("unknown capability: {}", other))),
        }
    }
}

/// Capabilities granted to an API key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse names such as `["read", "transfer"]`
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        names
            .into_iter()
            .map(|name| name.parse::<Capability>())
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Add a capability
    pub fn grant(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Whether the set contains `capability`
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Authenticated caller of the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Interactive user session; unrestricted
    Session,
    /// Service credential limited to its capability set
    ApiKey(CapabilitySet),
}

impl Caller {
    /// Whether the caller holds `capability`
    pub fn has(&self, capability: Capability) -> bool {
        match self {
            Caller::Session => true,
            Caller::ApiKey(set) => set.contains(capability),
        }
    }

    /// Fail with `Unauthorized` unless the caller holds `capability`
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "missing '{}' capability",
                capability
            )))
        }
    }
}
