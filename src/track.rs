use serde::{Deserialize, Serialize};

// Plain data shapes shared with the web front-end. Field names follow the
// front-end's camelCase interface.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: String,
    /// bearing in degrees
    pub direction: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub positions: Vec<Position>,
}
