// Business Entity - establishments and their declared lines of business
//
// A Business row is one registered establishment; each Amenity row is one
// "line of business" declared for it. Reference fields (status, the two
// sector taxonomies) are stored as row ids and resolved into names when a
// joined view is needed.

use serde::{Deserialize, Serialize};

// ============================================================================
// TYPE OF BUSINESS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessType {
    Single,
    Partnership,
    Corporation,
    Cooperative,
    WorkersAssociation,
}

impl BusinessType {
    /// Stored integer code (stable, matches the legacy registry dumps).
    pub fn code(&self) -> i64 {
        match self {
            BusinessType::Single => 1,
            BusinessType::Partnership => 2,
            BusinessType::Corporation => 3,
            BusinessType::Cooperative => 4,
            BusinessType::WorkersAssociation => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(BusinessType::Single),
            2 => Some(BusinessType::Partnership),
            3 => Some(BusinessType::Corporation),
            4 => Some(BusinessType::Cooperative),
            5 => Some(BusinessType::WorkersAssociation),
            _ => None,
        }
    }

    /// Human-readable label for display, search, and exports.
    pub fn label(&self) -> &'static str {
        match self {
            BusinessType::Single => "Single",
            BusinessType::Partnership => "Partnership",
            BusinessType::Corporation => "Corporation",
            BusinessType::Cooperative => "Cooperative",
            BusinessType::WorkersAssociation => "Workers Association/Labor Union",
        }
    }
}

// ============================================================================
// TYPE OF BUSINESS OWNERSHIP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipType {
    Filipino,
    JointVenture,
    Foreign,
}

impl OwnershipType {
    pub fn code(&self) -> i64 {
        match self {
            OwnershipType::Filipino => 1,
            OwnershipType::JointVenture => 2,
            OwnershipType::Foreign => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(OwnershipType::Filipino),
            2 => Some(OwnershipType::JointVenture),
            3 => Some(OwnershipType::Foreign),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OwnershipType::Filipino => "Filipino",
            OwnershipType::JointVenture => "Philippine-Foreign Joint Venture",
            OwnershipType::Foreign => "Foreign",
        }
    }
}

// ============================================================================
// BUSINESS
// ============================================================================

/// One registered establishment.
///
/// Invariants: `taxpayer_name` is always present; `capital`, when present,
/// is a non-negative currency amount (enforced by a schema CHECK).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    /// Row id; 0 for a business not yet persisted.
    pub id: i64,
    pub taxpayer_name: String,
    pub business_name: Option<String>,
    pub business_type: Option<BusinessType>,
    pub ownership_type: Option<OwnershipType>,
    pub address: Option<String>,
    pub tel_number: Option<String>,
    pub barangay: Option<String>,
    pub capital: Option<f64>,
    pub status_id: Option<i64>,
    pub sector_dti_files_id: Option<i64>,
    pub sector_dti_nccp_id: Option<i64>,
    /// Legacy reference carried for schema compatibility; never written by
    /// active logic.
    pub division_id: Option<i64>,
    /// Filing year.
    pub year: i32,
    /// A verified business carries a final sector_dti_nccp assignment.
    pub is_verified: bool,
}

impl Business {
    /// "Taxpayer (Business Name)" display form used in log lines.
    pub fn display_name(&self) -> String {
        format!(
            "{} ({})",
            self.taxpayer_name,
            self.business_name.as_deref().unwrap_or("")
        )
    }
}

// ============================================================================
// AMENITY
// ============================================================================

/// One declared "line of business" attached to an establishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amenity {
    pub id: i64,
    pub name: String,
    pub business_id: i64,
}

// ============================================================================
// JOINED VIEW
// ============================================================================

/// A business together with the resolved names of its reference rows.
///
/// This is the shape the filter builder, exports, and the classifier consume:
/// full-text search needs the status and sector names, not their ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRow {
    pub business: Business,
    pub status_name: Option<String>,
    pub sector_dti_files_name: Option<String>,
    pub sector_dti_nccp_name: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_type_codes_round_trip() {
        for code in 1..=5 {
            let ty = BusinessType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert!(BusinessType::from_code(0).is_none());
        assert!(BusinessType::from_code(6).is_none());
    }

    #[test]
    fn test_ownership_type_codes_round_trip() {
        for code in 1..=3 {
            let ty = OwnershipType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert!(OwnershipType::from_code(4).is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(BusinessType::Single.label(), "Single");
        assert_eq!(
            BusinessType::WorkersAssociation.label(),
            "Workers Association/Labor Union"
        );
        assert_eq!(
            OwnershipType::JointVenture.label(),
            "Philippine-Foreign Joint Venture"
        );
    }

    #[test]
    fn test_display_name() {
        let business = Business {
            id: 1,
            taxpayer_name: "Dela Cruz, Juan".to_string(),
            business_name: Some("JDC Trading".to_string()),
            business_type: None,
            ownership_type: None,
            address: None,
            tel_number: None,
            barangay: None,
            capital: None,
            status_id: None,
            sector_dti_files_id: None,
            sector_dti_nccp_id: None,
            division_id: None,
            year: 2020,
            is_verified: false,
        };
        assert_eq!(business.display_name(), "Dela Cruz, Juan (JDC Trading)");
    }
}
