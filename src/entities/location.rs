// Location - optional geocoordinate attached 1:1 to a business

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub business_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
