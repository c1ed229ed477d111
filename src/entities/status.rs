// Filing Status - "New" / "Renewal"
//
// The two fallback statuses are seeded at schema setup; additional statuses
// can be created through manual CRUD and are matched by name.

use serde::{Deserialize, Serialize};

/// Name of the status assigned to first-time filings.
pub const STATUS_NEW: &str = "New";

/// Name of the status assigned when the upload filename carries the
/// "renewal" marker.
pub const STATUS_RENEWAL: &str = "Renewal";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}
