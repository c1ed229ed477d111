// Sector Taxonomies - DTI Files and DTI-NCCP
//
// Two independent industry classifications. A business may carry one label
// from each: the DTI-Files sector comes from the uploaded filing itself,
// the DTI-NCCP sector is assigned by the classifier (or by hand, at which
// point the business is marked verified).

use serde::{Deserialize, Serialize};

/// Sector from the DTI filing archives. Lazily created by the ingestor when
/// a filing names a sector the registry does not know yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorDtiFiles {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Short code, usually decoded from the upload's filename.
    pub code: String,
}

/// Sector from the DTI-NCCP taxonomy, the target label set of the
/// classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorDtiNccp {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub code: String,
}

/// One curated training text tagged with a DTI-NCCP sector. Used only as
/// classifier training corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorDatasetEntry {
    pub id: i64,
    pub sector_dti_nccp_id: i64,
    pub text: String,
}
