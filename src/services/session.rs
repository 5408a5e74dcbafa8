use chrono::{Duration, Utc};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::{ConsultationType, Session};
use crate::services::matching;

/// Result of resolving an inbound phone number to a conversation.
#[derive(Debug)]
pub enum LookupResult {
    /// A live session inside the rolling window; the message is an answer.
    Existing(Session),
    /// No live session and the message picked a top-level menu entry.
    Created(Session),
    /// No live session and the message was not a menu choice.
    MenuPrompt,
}

/// Finds the open session for `phone` within the configured window, or
/// interprets the message as a top-level menu choice and creates one. A stale
/// open session found here is superseded (deleted) rather than resumed; there
/// is no background reaper.
pub fn lookup_or_create(
    conn: &Connection,
    config: &AppConfig,
    phone: &str,
    message: &str,
) -> anyhow::Result<LookupResult> {
    let now = Utc::now().naive_utc();

    if let Some(session) = queries::find_open_session(conn, phone)? {
        let cutoff = now - Duration::minutes(config.session_window_minutes);
        if session.last_answer_at > cutoff {
            return Ok(LookupResult::Existing(session));
        }
        tracing::debug!(phone = %phone, session_id = %session.id, "superseding stale session");
        queries::delete_session(conn, &session.id)?;
    }

    let Some(consultation_type) = parse_menu_choice(message) else {
        return Ok(LookupResult::MenuPrompt);
    };

    let session = Session::new(phone, consultation_type, now);
    queries::insert_session(conn, &session)?;
    tracing::info!(
        phone = %phone,
        session_id = %session.id,
        consultation_type = consultation_type.as_str(),
        "created session"
    );
    Ok(LookupResult::Created(session))
}

fn parse_menu_choice(message: &str) -> Option<ConsultationType> {
    let normalized = matching::normalize(message);
    match normalized.as_str() {
        "1" => Some(ConsultationType::New),
        "2" => Some(ConsultationType::Upcoming),
        "3" => Some(ConsultationType::Past),
        _ => {
            if normalized.contains("nueva") || normalized.contains("agendar") {
                Some(ConsultationType::New)
            } else if normalized.contains("proxima") {
                Some(ConsultationType::Upcoming)
            } else if normalized.contains("anterior") || normalized.contains("pasada") {
                Some(ConsultationType::Past)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::SessionStatus;

    fn config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            clinic_name: "Test".to_string(),
            session_window_minutes: 20,
            lookahead_days: 14,
            gated_patient_class: "afiliado".to_string(),
            bridge_specialty: "MEDICINA GENERAL".to_string(),
            referral_window_days: 90,
            booking_channel: "whatsapp".to_string(),
        }
    }

    #[test]
    fn test_unrecognized_first_message_prompts_menu() {
        let conn = db::init_db(":memory:").unwrap();
        let result = lookup_or_create(&conn, &config(), "+593911", "hola").unwrap();
        assert!(matches!(result, LookupResult::MenuPrompt));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "menu prompt must not create a session");
    }

    #[test]
    fn test_menu_choice_creates_session() {
        let conn = db::init_db(":memory:").unwrap();
        let result = lookup_or_create(&conn, &config(), "+593911", "1").unwrap();
        match result {
            LookupResult::Created(s) => {
                assert_eq!(s.consultation_type, ConsultationType::New);
                assert_eq!(s.status, SessionStatus::Open);
            }
            other => panic!("expected created session, got {other:?}"),
        }
    }

    #[test]
    fn test_text_menu_choices() {
        let conn = db::init_db(":memory:").unwrap();
        match lookup_or_create(&conn, &config(), "+593911", "ver mis próximas citas").unwrap() {
            LookupResult::Created(s) => {
                assert_eq!(s.consultation_type, ConsultationType::Upcoming)
            }
            other => panic!("expected created session, got {other:?}"),
        }
    }

    #[test]
    fn test_existing_session_is_resumed() {
        let conn = db::init_db(":memory:").unwrap();
        let created = match lookup_or_create(&conn, &config(), "+593911", "1").unwrap() {
            LookupResult::Created(s) => s,
            other => panic!("expected created session, got {other:?}"),
        };
        match lookup_or_create(&conn, &config(), "+593911", "0502417025").unwrap() {
            LookupResult::Existing(s) => assert_eq!(s.id, created.id),
            other => panic!("expected existing session, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_session_is_superseded() {
        let conn = db::init_db(":memory:").unwrap();
        let created = match lookup_or_create(&conn, &config(), "+593911", "1").unwrap() {
            LookupResult::Created(s) => s,
            other => panic!("expected created session, got {other:?}"),
        };

        let stale = (Utc::now().naive_utc() - Duration::minutes(30))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        conn.execute(
            "UPDATE sessions SET last_answer_at = ?1 WHERE id = ?2",
            rusqlite::params![stale, created.id],
        )
        .unwrap();

        // An answer-looking message no longer resumes; it is read as a menu
        // choice against a fresh conversation.
        let result = lookup_or_create(&conn, &config(), "+593911", "0502417025").unwrap();
        assert!(matches!(result, LookupResult::MenuPrompt));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "stale session must be deleted");
    }

    #[test]
    fn test_open_session_unique_per_phone() {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        let first = Session::new("+593911", ConsultationType::New, now);
        queries::insert_session(&conn, &first).unwrap();

        let second = Session::new("+593911", ConsultationType::New, now);
        assert!(
            queries::insert_session(&conn, &second).is_err(),
            "two open sessions for one phone must violate the unique index"
        );
    }
}
