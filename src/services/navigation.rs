use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Session, Step};

/// What the BACK keyword resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum BackOutcome {
    /// The answer to replay through normal dispatch: re-fills step `step`
    /// and regenerates the menu of the step after it.
    Replay {
        step: Step,
        entity_id: String,
        label: String,
    },
    /// Not enough answered steps to go back to.
    Unavailable,
}

/// Steps one state backward, derived from the append-only answer log rather
/// than a stored history stack: the two most recently answered fields are
/// cleared (keeping the ordering invariant), the log is truncated to before
/// the earlier one, and that earlier answer is handed back for replay.
pub fn go_back(conn: &Connection, session: &mut Session) -> anyhow::Result<BackOutcome> {
    let answers = queries::get_answers(conn, &session.id)?;
    if answers.len() < 2 {
        return Ok(BackOutcome::Unavailable);
    }

    let replay = &answers[answers.len() - 2];
    let Some(step) = Step::from_index(replay.step) else {
        return Ok(BackOutcome::Unavailable);
    };

    session.clear_from(step);
    queries::truncate_answers_from(conn, &session.id, step)?;
    queries::save_session(conn, session)?;

    tracing::debug!(
        session_id = %session.id,
        step = replay.step,
        "replaying previous answer after BACK"
    );
    Ok(BackOutcome::Replay {
        step,
        entity_id: replay.entity_id.clone(),
        label: replay.label.clone(),
    })
}
