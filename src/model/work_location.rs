use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Read-only reference data for the geofence matcher.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WorkLocation {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Head Office")]
    pub name: String,

    #[schema(example = 23.7770)]
    pub latitude: f64,

    #[schema(example = 90.3990)]
    pub longitude: f64,

    #[schema(example = 150.0)]
    pub radius_meters: f64,

    #[schema(example = true)]
    pub is_active: bool,
}
