use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Open,
    Reserved,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Open => "open",
            SlotState::Reserved => "reserved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reserved" => SlotState::Reserved,
            _ => SlotState::Open,
        }
    }
}

/// A provider + date + time unit of bookable capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub provider_id: String,
    pub date: String,
    pub time: String,
    pub state: SlotState,
}

/// A committed reservation. Created only by a successful confirmation and
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub patient_id: String,
    pub slot_id: String,
    pub facility_id: String,
    pub specialty_id: String,
    pub channel: String,
    pub created_at: NaiveDateTime,
}

/// Booking joined with its directory names, for the upcoming/past listings.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub date: String,
    pub time: String,
    pub provider_name: String,
    pub specialty_name: String,
    pub facility_name: String,
}
