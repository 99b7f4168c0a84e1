//! Equipment model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Bookable piece of equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipment {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
}
