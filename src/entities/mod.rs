// Entity Models - the registry's relational vocabulary
//
// Each file holds one entity family: the establishment itself, the two
// sector taxonomies, the filing status, and the optional geocoordinate.
// Persistence lives in `crate::db`; these types carry no connection state.

pub mod business;
pub mod location;
pub mod sector;
pub mod status;

pub use business::{Amenity, Business, BusinessRow, BusinessType, OwnershipType};
pub use location::Location;
pub use sector::{SectorDatasetEntry, SectorDtiFiles, SectorDtiNccp};
pub use status::{Status, STATUS_NEW, STATUS_RENEWAL};
