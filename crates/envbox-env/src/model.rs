//! The guest-side environment record. Nothing here is persisted on the
//! host; every field is recomputed or recovered from the guest on each
//! call.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Empty when the caller only has the name (e.g. from `list`, which
    /// does not pay for the mount-table heuristic per entry).
    pub project_path: String,
}
