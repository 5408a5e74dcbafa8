use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, Session, SlotState};

/// Result of the pre-commit validation, in rule order. The first two are
/// terminal for the session; a taken slot only forces a fresh hour menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictCheck {
    Clear,
    ProviderAlreadyBooked,
    SpecialtyAlreadyBooked,
    SlotTaken,
}

/// Outcome of the authoritative confirmation commit.
#[derive(Debug)]
pub enum CommitOutcome {
    Booked(Booking),
    ProviderAlreadyBooked,
    SpecialtyAlreadyBooked,
    SlotTaken,
}

/// Validates a candidate reservation. Run once when the hour is selected
/// (soft) and again at confirmation (authoritative, since user think-time
/// elapses between menu and "SI").
pub fn check(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    specialty_id: &str,
    date: &str,
    time: &str,
) -> anyhow::Result<ConflictCheck> {
    if queries::patient_has_provider_booking(conn, patient_id, provider_id, date)? {
        return Ok(ConflictCheck::ProviderAlreadyBooked);
    }
    if queries::patient_has_specialty_booking(conn, patient_id, specialty_id, date)? {
        return Ok(ConflictCheck::SpecialtyAlreadyBooked);
    }
    match queries::get_slot(conn, provider_id, date, time)? {
        Some(slot) if slot.state == SlotState::Open => Ok(ConflictCheck::Clear),
        _ => Ok(ConflictCheck::SlotTaken),
    }
}

/// Re-validates and commits the reservation: booking insert plus the slot's
/// OPEN→RESERVED flip happen in one transaction with a compare-and-swap on
/// the slot state, so at most one of two concurrent confirmations can win.
pub fn confirm(conn: &mut Connection, session: &Session, channel: &str) -> anyhow::Result<CommitOutcome> {
    let patient_id = session.patient_id.as_deref().unwrap_or_default();
    let provider_id = session.provider_id.as_deref().unwrap_or_default();
    let specialty_id = session.specialty_id.as_deref().unwrap_or_default();
    let facility_id = session.facility_id.as_deref().unwrap_or_default();
    let date = session.date.as_deref().unwrap_or_default();
    let time = session.time.as_deref().unwrap_or_default();

    if queries::patient_has_provider_booking(conn, patient_id, provider_id, date)? {
        return Ok(CommitOutcome::ProviderAlreadyBooked);
    }
    if queries::patient_has_specialty_booking(conn, patient_id, specialty_id, date)? {
        return Ok(CommitOutcome::SpecialtyAlreadyBooked);
    }

    let Some(slot) = queries::get_slot(conn, provider_id, date, time)? else {
        return Ok(CommitOutcome::SlotTaken);
    };

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        patient_id: patient_id.to_string(),
        slot_id: slot.id.clone(),
        facility_id: facility_id.to_string(),
        specialty_id: specialty_id.to_string(),
        channel: channel.to_string(),
        created_at: Utc::now().naive_utc(),
    };

    if queries::create_booking_reserving_slot(conn, &booking)? {
        tracing::info!(
            booking_id = %booking.id,
            slot_id = %slot.id,
            patient_id = %patient_id,
            "booking committed"
        );
        Ok(CommitOutcome::Booked(booking))
    } else {
        tracing::warn!(slot_id = %slot.id, "slot reserved concurrently, confirmation lost race");
        Ok(CommitOutcome::SlotTaken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{
        ConsultationType, Facility, Patient, Provider, Session, Slot, Specialty,
    };

    struct Fixture {
        conn: Connection,
        session: Session,
    }

    fn setup() -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_facility(&conn, &Facility { id: "f1".into(), name: "HOSPITAL NORTE".into() })
            .unwrap();
        queries::insert_specialty(&conn, &Specialty { id: "sp1".into(), name: "CARDIOLOGÍA".into() })
            .unwrap();
        for (id, name) in [("d1", "DRA. ANA SUÁREZ"), ("d2", "DR. LUIS PAREDES")] {
            queries::insert_provider(
                &conn,
                &Provider {
                    id: id.into(),
                    name: name.into(),
                    facility_id: "f1".into(),
                    specialty_id: "sp1".into(),
                },
            )
            .unwrap();
        }
        queries::insert_patient(
            &conn,
            &Patient {
                id: "p1".into(),
                cedula: "0502417025".into(),
                full_name: "Paciente Uno".into(),
                class: "particular".into(),
            },
        )
        .unwrap();
        for (id, provider, time) in [
            ("sl1", "d1", "09:00"),
            ("sl2", "d1", "10:00"),
            ("sl3", "d2", "09:00"),
        ] {
            queries::insert_slot(
                &conn,
                &Slot {
                    id: id.into(),
                    provider_id: provider.into(),
                    date: "2025-10-10".into(),
                    time: time.into(),
                    state: SlotState::Open,
                },
            )
            .unwrap();
        }

        let mut session = Session::new(
            "+593911",
            ConsultationType::New,
            Utc::now().naive_utc(),
        );
        session.patient_id = Some("p1".into());
        session.facility_id = Some("f1".into());
        session.specialty_id = Some("sp1".into());
        session.provider_id = Some("d1".into());
        session.date = Some("2025-10-10".into());
        session.time = Some("09:00".into());

        Fixture { conn, session }
    }

    #[test]
    fn test_clear_when_no_conflicts() {
        let f = setup();
        let result = check(&f.conn, "p1", "d1", "sp1", "2025-10-10", "09:00").unwrap();
        assert_eq!(result, ConflictCheck::Clear);
    }

    #[test]
    fn test_commit_reserves_slot_and_creates_booking() {
        let mut f = setup();
        match confirm(&mut f.conn, &f.session, "whatsapp").unwrap() {
            CommitOutcome::Booked(b) => assert_eq!(b.slot_id, "sl1"),
            other => panic!("expected booked, got {other:?}"),
        }

        let slot = queries::get_slot(&f.conn, "d1", "2025-10-10", "09:00")
            .unwrap()
            .unwrap();
        assert_eq!(slot.state, SlotState::Reserved);
        assert_eq!(queries::count_bookings(&f.conn).unwrap(), 1);
    }

    #[test]
    fn test_second_commit_for_same_slot_loses() {
        let mut f = setup();
        assert!(matches!(
            confirm(&mut f.conn, &f.session, "whatsapp").unwrap(),
            CommitOutcome::Booked(_)
        ));

        // A different patient targeting the same slot.
        queries::insert_patient(
            &f.conn,
            &Patient {
                id: "p2".into(),
                cedula: "0912345678".into(),
                full_name: "Paciente Dos".into(),
                class: "particular".into(),
            },
        )
        .unwrap();
        let mut other = f.session.clone();
        other.id = uuid::Uuid::new_v4().to_string();
        other.patient_id = Some("p2".into());

        assert!(matches!(
            confirm(&mut f.conn, &other, "whatsapp").unwrap(),
            CommitOutcome::SlotTaken
        ));
        assert_eq!(queries::count_bookings(&f.conn).unwrap(), 1);
    }

    #[test]
    fn test_same_provider_same_date_rejected() {
        let mut f = setup();
        assert!(matches!(
            confirm(&mut f.conn, &f.session, "whatsapp").unwrap(),
            CommitOutcome::Booked(_)
        ));

        // Same patient, same provider and date, a different open hour.
        let result = check(&f.conn, "p1", "d1", "sp1", "2025-10-10", "10:00").unwrap();
        assert_eq!(result, ConflictCheck::ProviderAlreadyBooked);
    }

    #[test]
    fn test_same_specialty_other_provider_rejected() {
        let mut f = setup();
        assert!(matches!(
            confirm(&mut f.conn, &f.session, "whatsapp").unwrap(),
            CommitOutcome::Booked(_)
        ));

        // Provider B, same specialty, same date: rule b.
        let result = check(&f.conn, "p1", "d2", "sp1", "2025-10-10", "09:00").unwrap();
        assert_eq!(result, ConflictCheck::SpecialtyAlreadyBooked);

        let mut other = f.session.clone();
        other.id = uuid::Uuid::new_v4().to_string();
        other.provider_id = Some("d2".into());
        assert!(matches!(
            confirm(&mut f.conn, &other, "whatsapp").unwrap(),
            CommitOutcome::SpecialtyAlreadyBooked
        ));
    }

    #[test]
    fn test_missing_slot_is_taken() {
        let f = setup();
        let result = check(&f.conn, "p1", "d1", "sp1", "2025-10-10", "23:00").unwrap();
        assert_eq!(result, ConflictCheck::SlotTaken);
    }
}
