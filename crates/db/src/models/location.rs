use meowl_core::error::CoreError;
use meowl_core::location::{LocationCandidate, LocationStatus};
use meowl_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct LocationCandidateRow {
    pub id: DbId,
    pub meowl_id: DbId,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub proposer_id: DbId,
    pub status: String,
    pub verification_count: i32,
    pub verified_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TryFrom<LocationCandidateRow> for LocationCandidate {
    type Error = CoreError;

    fn try_from(row: LocationCandidateRow) -> Result<Self, Self::Error> {
        Ok(LocationCandidate {
            status: parse_column::<LocationStatus>("location_candidates.status", &row.status)?,
            id: row.id,
            meowl_id: row.meowl_id,
            lat: row.lat,
            lng: row.lng,
            address: row.address,
            proposer_id: row.proposer_id,
            verification_count: row.verification_count,
            verified_at: row.verified_at,
            created_at: row.created_at,
        })
    }
}
