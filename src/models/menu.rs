use serde::{Deserialize, Serialize};

/// One row of the numbered menu offered for a session step. The live set for
/// a (session, step) pair is exactly the rows from the most recent
/// regeneration; ordinals restart at 1 and are not stable across
/// regenerations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    pub session_id: String,
    pub step: i64,
    pub ordinal: i64,
    pub entity_id: String,
    pub label: String,
}
