use rusqlite::Connection;

use crate::db::queries;
use crate::models::{MenuOption, Step};
use crate::services::matching::{self, Resolution};

/// Replaces the menu for `step`, purging that step and every later one.
/// Returns the freshly numbered rows.
pub fn replace(
    conn: &Connection,
    session_id: &str,
    step: Step,
    items: &[(String, String)],
) -> anyhow::Result<Vec<MenuOption>> {
    queries::replace_options(conn, session_id, step, items)
}

/// Resolves a raw answer against the live option rows for the step.
pub fn resolve(
    conn: &Connection,
    session_id: &str,
    step: Step,
    raw: &str,
) -> anyhow::Result<Resolution> {
    let options = queries::get_options(conn, session_id, step)?;
    Ok(matching::resolve(raw, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{ConsultationType, Session};

    fn setup() -> (Connection, Session) {
        let conn = db::init_db(":memory:").unwrap();
        let session = Session::new(
            "+593999000111",
            ConsultationType::New,
            chrono::Utc::now().naive_utc(),
        );
        queries::insert_session(&conn, &session).unwrap();
        (conn, session)
    }

    fn items(labels: &[&str]) -> Vec<(String, String)> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| (format!("id{i}"), l.to_string()))
            .collect()
    }

    #[test]
    fn test_replace_renumbers_from_one() {
        let (conn, session) = setup();
        replace(&conn, &session.id, Step::Facility, &items(&["A", "B", "C"])).unwrap();
        replace(&conn, &session.id, Step::Facility, &items(&["B", "C"])).unwrap();

        let options = queries::get_options(&conn, &session.id, Step::Facility).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].ordinal, 1);
        assert_eq!(options[0].label, "B");
        assert_eq!(options[1].ordinal, 2);
    }

    #[test]
    fn test_replace_purges_later_steps() {
        let (conn, session) = setup();
        replace(&conn, &session.id, Step::Facility, &items(&["A"])).unwrap();
        replace(&conn, &session.id, Step::Specialty, &items(&["X", "Y"])).unwrap();
        replace(&conn, &session.id, Step::Provider, &items(&["P"])).unwrap();

        // Re-entering the specialty step must drop the provider menu too.
        replace(&conn, &session.id, Step::Specialty, &items(&["Z"])).unwrap();

        assert_eq!(
            queries::get_options(&conn, &session.id, Step::Facility).unwrap().len(),
            1
        );
        let specialties = queries::get_options(&conn, &session.id, Step::Specialty).unwrap();
        assert_eq!(specialties.len(), 1);
        assert_eq!(specialties[0].label, "Z");
        assert!(queries::get_options(&conn, &session.id, Step::Provider)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_resolve_reads_stored_rows() {
        let (conn, session) = setup();
        replace(
            &conn,
            &session.id,
            Step::Specialty,
            &items(&["MEDICINA GENERAL", "CARDIOLOGÍA"]),
        )
        .unwrap();

        match resolve(&conn, &session.id, Step::Specialty, "cardio").unwrap() {
            Resolution::One(o) => assert_eq!(o.ordinal, 2),
            other => panic!("expected one match, got {other:?}"),
        }
        assert_eq!(
            resolve(&conn, &session.id, Step::Specialty, "dermatologia").unwrap(),
            Resolution::None
        );
    }
}
