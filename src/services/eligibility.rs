use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::{Patient, Specialty};
use crate::services::matching;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied,
}

/// Gate applied before a specialty is persisted. Patients of the configured
/// class need a completed visit inside the referral window, either in the
/// requested specialty or in the bridging specialty. The bridging specialty
/// itself is always bookable — it is the entry point that produces the
/// qualifying visit.
pub fn check(
    conn: &Connection,
    config: &AppConfig,
    patient: &Patient,
    specialty: &Specialty,
    now: NaiveDateTime,
) -> anyhow::Result<Eligibility> {
    if matching::normalize(&patient.class) != matching::normalize(&config.gated_patient_class) {
        return Ok(Eligibility::Allowed);
    }
    if matching::normalize(&specialty.name) == matching::normalize(&config.bridge_specialty) {
        return Ok(Eligibility::Allowed);
    }

    let mut specialty_ids = vec![specialty.id.as_str()];
    let bridge = queries::find_specialty_by_name(conn, &config.bridge_specialty)?;
    if let Some(ref bridge) = bridge {
        specialty_ids.push(bridge.id.as_str());
    }

    let since = now - Duration::days(config.referral_window_days);
    if queries::has_completed_visit_since(conn, &patient.id, &specialty_ids, &since)? {
        Ok(Eligibility::Allowed)
    } else {
        tracing::info!(
            patient_id = %patient.id,
            specialty = %specialty.name,
            "eligibility gate denied booking"
        );
        Ok(Eligibility::Denied)
    }
}
