use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    AnswerEntry, Booking, BookingSummary, ConsultationType, Facility, MenuOption, Patient,
    Provider, Session, SessionStatus, Slot, SlotState, Specialty, Step,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Sessions ──

pub fn find_open_session(conn: &Connection, phone: &str) -> anyhow::Result<Option<Session>> {
    let result = conn.query_row(
        "SELECT id, phone, consultation_type, patient_id, facility_id, specialty_id, provider_id,
                date, time, confirmation_answer, status, created_at, last_answer_at
         FROM sessions WHERE phone = ?1 AND status = 'open'",
        params![phone],
        |row| Ok(parse_session_row(row)),
    );

    match result {
        Ok(session) => Ok(Some(session?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_session(conn: &Connection, session: &Session) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, phone, consultation_type, patient_id, facility_id, specialty_id,
                               provider_id, date, time, confirmation_answer, status, created_at, last_answer_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            session.id,
            session.phone,
            session.consultation_type.as_str(),
            session.patient_id,
            session.facility_id,
            session.specialty_id,
            session.provider_id,
            session.date,
            session.time,
            session.confirmation_answer,
            session.status.as_str(),
            ts(&session.created_at),
            ts(&session.last_answer_at),
        ],
    )?;
    Ok(())
}

pub fn save_session(conn: &Connection, session: &Session) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE sessions SET patient_id = ?2, facility_id = ?3, specialty_id = ?4, provider_id = ?5,
                             date = ?6, time = ?7, confirmation_answer = ?8, status = ?9, last_answer_at = ?10
         WHERE id = ?1",
        params![
            session.id,
            session.patient_id,
            session.facility_id,
            session.specialty_id,
            session.provider_id,
            session.date,
            session.time,
            session.confirmation_answer,
            session.status.as_str(),
            ts(&session.last_answer_at),
        ],
    )?;
    Ok(())
}

pub fn delete_session(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
    Ok(())
}

fn parse_session_row(row: &rusqlite::Row) -> anyhow::Result<Session> {
    let consultation_type: String = row.get(2)?;
    let status: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    let last_answer_at: String = row.get(12)?;

    Ok(Session {
        id: row.get(0)?,
        phone: row.get(1)?,
        consultation_type: ConsultationType::parse(&consultation_type),
        patient_id: row.get(3)?,
        facility_id: row.get(4)?,
        specialty_id: row.get(5)?,
        provider_id: row.get(6)?,
        date: row.get(7)?,
        time: row.get(8)?,
        confirmation_answer: row.get(9)?,
        status: SessionStatus::parse(&status),
        created_at: parse_ts(&created_at),
        last_answer_at: parse_ts(&last_answer_at),
    })
}

// ── Menu options ──

/// Replaces the option rows for `step` and purges every later step, so stale
/// numerals can never be replayed after a re-list. Inserted rows get ordinals
/// 1..=k in the order given.
pub fn replace_options(
    conn: &Connection,
    session_id: &str,
    step: Step,
    items: &[(String, String)],
) -> anyhow::Result<Vec<MenuOption>> {
    conn.execute(
        "DELETE FROM session_options WHERE session_id = ?1 AND step >= ?2",
        params![session_id, step.index()],
    )?;

    let mut options = Vec::with_capacity(items.len());
    for (i, (entity_id, label)) in items.iter().enumerate() {
        let ordinal = (i + 1) as i64;
        conn.execute(
            "INSERT INTO session_options (session_id, step, ordinal, entity_id, label)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, step.index(), ordinal, entity_id, label],
        )?;
        options.push(MenuOption {
            session_id: session_id.to_string(),
            step: step.index(),
            ordinal,
            entity_id: entity_id.clone(),
            label: label.clone(),
        });
    }
    Ok(options)
}

pub fn get_options(
    conn: &Connection,
    session_id: &str,
    step: Step,
) -> anyhow::Result<Vec<MenuOption>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, step, ordinal, entity_id, label
         FROM session_options WHERE session_id = ?1 AND step = ?2 ORDER BY ordinal ASC",
    )?;

    let rows = stmt.query_map(params![session_id, step.index()], |row| {
        Ok(MenuOption {
            session_id: row.get(0)?,
            step: row.get(1)?,
            ordinal: row.get(2)?,
            entity_id: row.get(3)?,
            label: row.get(4)?,
        })
    })?;

    let mut options = vec![];
    for row in rows {
        options.push(row?);
    }
    Ok(options)
}

// ── Answer log ──

pub fn append_answer(
    conn: &Connection,
    session_id: &str,
    step: Step,
    entity_id: &str,
    label: &str,
    answered_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO session_answers (session_id, step, entity_id, label, answered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(session_id, step) DO UPDATE SET
           entity_id = excluded.entity_id,
           label = excluded.label,
           answered_at = excluded.answered_at",
        params![session_id, step.index(), entity_id, label, ts(answered_at)],
    )?;
    Ok(())
}

pub fn get_answers(conn: &Connection, session_id: &str) -> anyhow::Result<Vec<AnswerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT step, entity_id, label, answered_at
         FROM session_answers WHERE session_id = ?1 ORDER BY step ASC",
    )?;

    let rows = stmt.query_map(params![session_id], |row| {
        let answered_at: String = row.get(3)?;
        Ok(AnswerEntry {
            step: row.get(0)?,
            entity_id: row.get(1)?,
            label: row.get(2)?,
            answered_at: parse_ts(&answered_at),
        })
    })?;

    let mut answers = vec![];
    for row in rows {
        answers.push(row?);
    }
    Ok(answers)
}

pub fn truncate_answers_from(
    conn: &Connection,
    session_id: &str,
    step: Step,
) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM session_answers WHERE session_id = ?1 AND step >= ?2",
        params![session_id, step.index()],
    )?;
    Ok(())
}

// ── Patient directory ──

pub fn get_patient_by_cedula(conn: &Connection, cedula: &str) -> anyhow::Result<Option<Patient>> {
    optional_row(conn.query_row(
        "SELECT id, cedula, full_name, class FROM patients WHERE cedula = ?1",
        params![cedula],
        parse_patient_row,
    ))
}

pub fn get_patient(conn: &Connection, id: &str) -> anyhow::Result<Option<Patient>> {
    optional_row(conn.query_row(
        "SELECT id, cedula, full_name, class FROM patients WHERE id = ?1",
        params![id],
        parse_patient_row,
    ))
}

fn parse_patient_row(row: &rusqlite::Row) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        cedula: row.get(1)?,
        full_name: row.get(2)?,
        class: row.get(3)?,
    })
}

// ── Facility / specialty / provider directories ──

pub fn list_facilities(conn: &Connection) -> anyhow::Result<Vec<Facility>> {
    let mut stmt = conn.prepare("SELECT id, name FROM facilities ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Facility {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut facilities = vec![];
    for row in rows {
        facilities.push(row?);
    }
    Ok(facilities)
}

pub fn get_facility(conn: &Connection, id: &str) -> anyhow::Result<Option<Facility>> {
    optional_row(conn.query_row(
        "SELECT id, name FROM facilities WHERE id = ?1",
        params![id],
        |row| {
            Ok(Facility {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    ))
}

pub fn list_specialties_at_facility(
    conn: &Connection,
    facility_id: &str,
) -> anyhow::Result<Vec<Specialty>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT s.id, s.name FROM specialties s
         INNER JOIN providers p ON p.specialty_id = s.id
         WHERE p.facility_id = ?1 ORDER BY s.name ASC",
    )?;
    let rows = stmt.query_map(params![facility_id], |row| {
        Ok(Specialty {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut specialties = vec![];
    for row in rows {
        specialties.push(row?);
    }
    Ok(specialties)
}

pub fn get_specialty(conn: &Connection, id: &str) -> anyhow::Result<Option<Specialty>> {
    optional_row(conn.query_row(
        "SELECT id, name FROM specialties WHERE id = ?1",
        params![id],
        |row| {
            Ok(Specialty {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    ))
}

pub fn find_specialty_by_name(conn: &Connection, name: &str) -> anyhow::Result<Option<Specialty>> {
    optional_row(conn.query_row(
        "SELECT id, name FROM specialties WHERE name = ?1 COLLATE NOCASE",
        params![name],
        |row| {
            Ok(Specialty {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    ))
}

pub fn get_provider(conn: &Connection, id: &str) -> anyhow::Result<Option<Provider>> {
    optional_row(conn.query_row(
        "SELECT id, name, facility_id, specialty_id FROM providers WHERE id = ?1",
        params![id],
        parse_provider_row,
    ))
}

/// Providers of a specialty at a facility holding at least one open slot in
/// the given date range.
pub fn list_available_providers(
    conn: &Connection,
    facility_id: &str,
    specialty_id: &str,
    from: &str,
    to: &str,
) -> anyhow::Result<Vec<Provider>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT p.id, p.name, p.facility_id, p.specialty_id FROM providers p
         INNER JOIN slots sl ON sl.provider_id = p.id
         WHERE p.facility_id = ?1 AND p.specialty_id = ?2
           AND sl.state = 'open' AND sl.date >= ?3 AND sl.date <= ?4
         ORDER BY p.name ASC",
    )?;
    let rows = stmt.query_map(params![facility_id, specialty_id, from, to], parse_provider_row)?;

    let mut providers = vec![];
    for row in rows {
        providers.push(row?);
    }
    Ok(providers)
}

fn parse_provider_row(row: &rusqlite::Row) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        facility_id: row.get(2)?,
        specialty_id: row.get(3)?,
    })
}

// ── Slots ──

pub fn list_open_dates(
    conn: &Connection,
    provider_id: &str,
    from: &str,
    to: &str,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT date FROM slots
         WHERE provider_id = ?1 AND state = 'open' AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(params![provider_id, from, to], |row| row.get::<_, String>(0))?;

    let mut dates = vec![];
    for row in rows {
        dates.push(row?);
    }
    Ok(dates)
}

pub fn list_open_times(
    conn: &Connection,
    provider_id: &str,
    date: &str,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT time FROM slots
         WHERE provider_id = ?1 AND date = ?2 AND state = 'open'
         ORDER BY time ASC",
    )?;
    let rows = stmt.query_map(params![provider_id, date], |row| row.get::<_, String>(0))?;

    let mut times = vec![];
    for row in rows {
        times.push(row?);
    }
    Ok(times)
}

pub fn get_slot(
    conn: &Connection,
    provider_id: &str,
    date: &str,
    time: &str,
) -> anyhow::Result<Option<Slot>> {
    optional_row(conn.query_row(
        "SELECT id, provider_id, date, time, state FROM slots
         WHERE provider_id = ?1 AND date = ?2 AND time = ?3",
        params![provider_id, date, time],
        parse_slot_row,
    ))
}

fn parse_slot_row(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    let state: String = row.get(4)?;
    Ok(Slot {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        state: SlotState::parse(&state),
    })
}

// ── Visits ──

pub fn has_completed_visit_since(
    conn: &Connection,
    patient_id: &str,
    specialty_ids: &[&str],
    since: &NaiveDateTime,
) -> anyhow::Result<bool> {
    if specialty_ids.is_empty() {
        return Ok(false);
    }

    let placeholders: Vec<String> = (0..specialty_ids.len())
        .map(|i| format!("?{}", i + 3))
        .collect();
    let sql = format!(
        "SELECT COUNT(*) FROM visits
         WHERE patient_id = ?1 AND status = 'completed' AND occurred_at >= ?2
           AND specialty_id IN ({})",
        placeholders.join(", ")
    );

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(patient_id.to_string()),
        Box::new(ts(since)),
    ];
    for id in specialty_ids {
        params_vec.push(Box::new(id.to_string()));
    }
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count > 0)
}

// ── Bookings ──

/// Flips the slot OPEN→RESERVED and inserts the booking row as one atomic
/// unit. The UPDATE doubles as a compare-and-swap: zero affected rows means
/// the slot was taken concurrently and nothing is written.
pub fn create_booking_reserving_slot(
    conn: &mut Connection,
    booking: &Booking,
) -> anyhow::Result<bool> {
    let tx = conn.transaction()?;

    let reserved = tx.execute(
        "UPDATE slots SET state = 'reserved' WHERE id = ?1 AND state = 'open'",
        params![booking.slot_id],
    )?;
    if reserved == 0 {
        return Ok(false);
    }

    tx.execute(
        "INSERT INTO bookings (id, patient_id, slot_id, facility_id, specialty_id, channel, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking.id,
            booking.patient_id,
            booking.slot_id,
            booking.facility_id,
            booking.specialty_id,
            booking.channel,
            ts(&booking.created_at),
        ],
    )?;

    tx.commit()?;
    Ok(true)
}

pub fn patient_has_provider_booking(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    date: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN slots sl ON sl.id = b.slot_id
         WHERE b.patient_id = ?1 AND sl.provider_id = ?2 AND sl.date = ?3",
        params![patient_id, provider_id, date],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn patient_has_specialty_booking(
    conn: &Connection,
    patient_id: &str,
    specialty_id: &str,
    date: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings b
         INNER JOIN slots sl ON sl.id = b.slot_id
         WHERE b.patient_id = ?1 AND b.specialty_id = ?2 AND sl.date = ?3",
        params![patient_id, specialty_id, date],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_patient_bookings(
    conn: &Connection,
    patient_id: &str,
    upcoming: bool,
    today: &str,
) -> anyhow::Result<Vec<BookingSummary>> {
    let sql = if upcoming {
        "SELECT sl.date, sl.time, p.name, sp.name, f.name FROM bookings b
         INNER JOIN slots sl ON sl.id = b.slot_id
         INNER JOIN providers p ON p.id = sl.provider_id
         INNER JOIN specialties sp ON sp.id = b.specialty_id
         INNER JOIN facilities f ON f.id = b.facility_id
         WHERE b.patient_id = ?1 AND sl.date >= ?2
         ORDER BY sl.date ASC, sl.time ASC"
    } else {
        "SELECT sl.date, sl.time, p.name, sp.name, f.name FROM bookings b
         INNER JOIN slots sl ON sl.id = b.slot_id
         INNER JOIN providers p ON p.id = sl.provider_id
         INNER JOIN specialties sp ON sp.id = b.specialty_id
         INNER JOIN facilities f ON f.id = b.facility_id
         WHERE b.patient_id = ?1 AND sl.date < ?2
         ORDER BY sl.date DESC, sl.time DESC"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![patient_id, today], |row| {
        Ok(BookingSummary {
            date: row.get(0)?,
            time: row.get(1)?,
            provider_name: row.get(2)?,
            specialty_name: row.get(3)?,
            facility_name: row.get(4)?,
        })
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;
    Ok(count)
}

// ── Collaborator writes (seeding, shared with the admin surfaces) ──

pub fn insert_patient(conn: &Connection, patient: &Patient) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO patients (id, cedula, full_name, class) VALUES (?1, ?2, ?3, ?4)",
        params![patient.id, patient.cedula, patient.full_name, patient.class],
    )?;
    Ok(())
}

pub fn insert_facility(conn: &Connection, facility: &Facility) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO facilities (id, name) VALUES (?1, ?2)",
        params![facility.id, facility.name],
    )?;
    Ok(())
}

pub fn insert_specialty(conn: &Connection, specialty: &Specialty) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO specialties (id, name) VALUES (?1, ?2)",
        params![specialty.id, specialty.name],
    )?;
    Ok(())
}

pub fn insert_provider(conn: &Connection, provider: &Provider) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO providers (id, name, facility_id, specialty_id) VALUES (?1, ?2, ?3, ?4)",
        params![
            provider.id,
            provider.name,
            provider.facility_id,
            provider.specialty_id
        ],
    )?;
    Ok(())
}

pub fn insert_slot(conn: &Connection, slot: &Slot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO slots (id, provider_id, date, time, state) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            slot.id,
            slot.provider_id,
            slot.date,
            slot.time,
            slot.state.as_str()
        ],
    )?;
    Ok(())
}

pub fn insert_visit(
    conn: &Connection,
    patient_id: &str,
    specialty_id: &str,
    status: &str,
    occurred_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO visits (id, patient_id, specialty_id, status, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::new_v4().to_string(),
            patient_id,
            specialty_id,
            status,
            ts(occurred_at),
        ],
    )?;
    Ok(())
}

fn optional_row<T>(result: rusqlite::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
