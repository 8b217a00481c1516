use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub users_count: i64,
    pub api_calls_count: i64,
    pub storage_usage_mb: f64,
    pub tables_count: i64,
    pub rows_count: i64,
}
