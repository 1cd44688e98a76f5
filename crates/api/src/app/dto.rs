use serde::{Deserialize, Serialize};

// -------------------------
// Response DTOs
// -------------------------

/// Authorization flag returned by state changes and status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    pub authorized: bool,
}

impl From<bool> for StateResponse {
    fn from(authorized: bool) -> Self {
        Self { authorized }
    }
}
