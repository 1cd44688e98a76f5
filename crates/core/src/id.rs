//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of a vendor.
///
/// Assigned externally (by the HR system that owns the vendor roster) and
/// always strictly positive. Deserialization goes through the same check, so a
/// stored record can never carry a non-positive id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct VendorId(i64);

impl VendorId {
    pub fn new(raw: i64) -> DomainResult<Self> {
        if raw <= 0 {
            return Err(DomainError::invalid_id(format!(
                "VendorId: must be positive, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for VendorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<i64> for VendorId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VendorId> for i64 {
    fn from(value: VendorId) -> Self {
        value.0
    }
}

impl FromStr for VendorId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = i64::from_str(s.trim())
            .map_err(|e| DomainError::invalid_id(format!("VendorId: {e}")))?;
        Self::new(raw)
    }
}
