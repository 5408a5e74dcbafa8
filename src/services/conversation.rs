use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::models::{ConsultationType, Session, SessionStatus, Step};
use crate::services::conflict::{self, CommitOutcome, ConflictCheck};
use crate::services::eligibility::{self, Eligibility};
use crate::services::matching::{self, Resolution};
use crate::services::navigation::{self, BackOutcome};
use crate::services::options;
use crate::services::replies;
use crate::services::session::{self as session_store, LookupResult};
use crate::state::AppState;

pub async fn process_message(
    state: &Arc<AppState>,
    phone: &str,
    text: &str,
) -> anyhow::Result<String> {
    let mut db = state.db.lock().unwrap();
    dispatch(&mut db, &state.config, phone, text)
}

/// One request/response unit: finds or creates the session, runs the
/// keyword interceptors, then hands the message to the current step.
pub fn dispatch(
    conn: &mut Connection,
    config: &AppConfig,
    phone: &str,
    text: &str,
) -> anyhow::Result<String> {
    let mut session = match session_store::lookup_or_create(conn, config, phone, text)? {
        LookupResult::MenuPrompt => return Ok(replies::main_menu(&config.clinic_name)),
        LookupResult::Created(_) => return Ok(replies::ask_cedula()),
        LookupResult::Existing(session) => session,
    };

    let normalized = matching::normalize(text);

    if normalized == "cancelar" || normalized == "salir" {
        queries::delete_session(conn, &session.id)?;
        tracing::info!(phone = %phone, session_id = %session.id, "session cancelled by user");
        return Ok(replies::cancelled(&config.clinic_name));
    }

    if normalized == "atras" || normalized == "volver" {
        // No recoverable prior context until the facility is chosen.
        if session.facility_id.is_none() {
            return Ok(replies::back_unavailable());
        }
        return match navigation::go_back(conn, &mut session)? {
            BackOutcome::Replay {
                step,
                entity_id,
                label,
            } => apply_answer(conn, config, &mut session, step, &entity_id, &label),
            BackOutcome::Unavailable => Ok(replies::back_unavailable()),
        };
    }

    let step = session.current_step();
    tracing::info!(phone = %phone, step = ?step, "dispatching answer");

    match step {
        Step::Identification => handle_identification(conn, config, &mut session, text),
        Step::Confirmation => handle_confirmation(conn, config, &mut session, &normalized),
        step => match options::resolve(conn, &session.id, step, text)? {
            Resolution::None => Ok(replies::option_not_found()),
            Resolution::Many => Ok(replies::option_ambiguous()),
            Resolution::One(option) => apply_answer(
                conn,
                config,
                &mut session,
                step,
                &option.entity_id,
                &option.label,
            ),
        },
    }
}

fn handle_identification(
    conn: &mut Connection,
    config: &AppConfig,
    session: &mut Session,
    text: &str,
) -> anyhow::Result<String> {
    let cedula: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if cedula.is_empty() {
        return Ok(replies::ask_cedula());
    }

    let Some(patient) = queries::get_patient_by_cedula(conn, &cedula)? else {
        return Ok(replies::patient_not_found());
    };

    match session.consultation_type {
        ConsultationType::New => apply_answer(
            conn,
            config,
            session,
            Step::Identification,
            &patient.id,
            &patient.cedula,
        ),
        ConsultationType::Upcoming | ConsultationType::Past => {
            let upcoming = session.consultation_type == ConsultationType::Upcoming;
            let today = Utc::now().naive_utc().date().format("%Y-%m-%d").to_string();
            let bookings = queries::list_patient_bookings(conn, &patient.id, upcoming, &today)?;
            queries::delete_session(conn, &session.id)?;

            let header = if upcoming {
                replies::upcoming_header()
            } else {
                replies::past_header()
            };
            Ok(replies::bookings_list(header, &bookings, &config.clinic_name))
        }
    }
}

/// Persists a resolved answer and moves the conversation forward: field set,
/// answer logged, next step's menu regenerated. Shared by normal dispatch and
/// by BACK replay, so both paths stay identical.
fn apply_answer(
    conn: &mut Connection,
    config: &AppConfig,
    session: &mut Session,
    step: Step,
    entity_id: &str,
    label: &str,
) -> anyhow::Result<String> {
    let now = Utc::now().naive_utc();

    match step {
        Step::Specialty => {
            let patient_id = session.patient_id.as_deref().unwrap_or_default();
            let patient = queries::get_patient(conn, patient_id)?
                .context("session references a missing patient")?;
            let specialty = queries::get_specialty(conn, entity_id)?
                .context("resolved option references a missing specialty")?;

            if eligibility::check(conn, config, &patient, &specialty, now)? == Eligibility::Denied {
                queries::delete_session(conn, &session.id)?;
                return Ok(replies::eligibility_rejected(
                    &specialty.name,
                    &config.bridge_specialty,
                    &config.clinic_name,
                ));
            }
        }
        Step::Time => {
            let patient_id = session.patient_id.as_deref().unwrap_or_default();
            let provider_id = session.provider_id.as_deref().unwrap_or_default();
            let specialty_id = session.specialty_id.as_deref().unwrap_or_default();
            let date = session.date.as_deref().unwrap_or_default().to_string();

            match conflict::check(conn, patient_id, provider_id, specialty_id, &date, entity_id)? {
                ConflictCheck::Clear => {}
                ConflictCheck::ProviderAlreadyBooked => {
                    queries::delete_session(conn, &session.id)?;
                    return Ok(replies::already_booked_with_provider(
                        &date_label(&date),
                        &config.clinic_name,
                    ));
                }
                ConflictCheck::SpecialtyAlreadyBooked => {
                    queries::delete_session(conn, &session.id)?;
                    return Ok(replies::already_booked_specialty(
                        &date_label(&date),
                        &config.clinic_name,
                    ));
                }
                ConflictCheck::SlotTaken => {
                    return refresh_hours(conn, config, session);
                }
            }
        }
        _ => {}
    }

    session.set_field(step, entity_id.to_string());
    session.last_answer_at = now;
    queries::append_answer(conn, &session.id, step, entity_id, label, &now)?;
    queries::save_session(conn, session)?;

    match step.next() {
        Some(Step::Confirmation) => confirmation_prompt(conn, session),
        Some(next) => match enter_step(conn, config, session, next)? {
            StepEntry::Menu(menu) => Ok(menu),
            StepEntry::Empty => {
                queries::delete_session(conn, &session.id)?;
                Ok(replies::no_availability(&config.clinic_name))
            }
        },
        None => confirmation_prompt(conn, session),
    }
}

enum StepEntry {
    Menu(String),
    Empty,
}

/// (Re)enters a step: regenerates its option rows from live data and renders
/// the numbered menu.
fn enter_step(
    conn: &Connection,
    config: &AppConfig,
    session: &Session,
    step: Step,
) -> anyhow::Result<StepEntry> {
    let facility_id = session.facility_id.as_deref().unwrap_or_default();
    let specialty_id = session.specialty_id.as_deref().unwrap_or_default();
    let provider_id = session.provider_id.as_deref().unwrap_or_default();
    let (from, to) = lookahead_range(config);

    let items: Vec<(String, String)> = match step {
        Step::Facility => queries::list_facilities(conn)?
            .into_iter()
            .map(|f| (f.id, f.name))
            .collect(),
        Step::Specialty => queries::list_specialties_at_facility(conn, facility_id)?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect(),
        Step::Provider => {
            queries::list_available_providers(conn, facility_id, specialty_id, &from, &to)?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        }
        Step::Date => queries::list_open_dates(conn, provider_id, &from, &to)?
            .into_iter()
            .map(|d| {
                let label = date_label(&d);
                (d, label)
            })
            .collect(),
        Step::Time => {
            let date = session.date.as_deref().unwrap_or_default();
            queries::list_open_times(conn, provider_id, date)?
                .into_iter()
                .map(|t| (t.clone(), t))
                .collect()
        }
        Step::Identification | Step::Confirmation => vec![],
    };

    if items.is_empty() {
        tracing::info!(session_id = %session.id, step = ?step, "no candidates for step");
        return Ok(StepEntry::Empty);
    }

    let menu = options::replace(conn, &session.id, step, &items)?;
    Ok(StepEntry::Menu(replies::numbered_menu(step, &menu)))
}

fn handle_confirmation(
    conn: &mut Connection,
    config: &AppConfig,
    session: &mut Session,
    normalized: &str,
) -> anyhow::Result<String> {
    match normalized {
        "si" => {}
        "no" => {
            queries::delete_session(conn, &session.id)?;
            return Ok(replies::cancelled(&config.clinic_name));
        }
        _ => return Ok(replies::confirm_reprompt()),
    }

    match conflict::confirm(conn, session, &config.booking_channel)? {
        CommitOutcome::Booked(_) => {
            session.confirmation_answer = Some("SI".to_string());
            session.status = SessionStatus::Booked;
            session.last_answer_at = Utc::now().naive_utc();
            queries::save_session(conn, session)?;

            let provider_id = session.provider_id.as_deref().unwrap_or_default();
            let provider = queries::get_provider(conn, provider_id)?
                .context("session references a missing provider")?;
            let date = session.date.as_deref().unwrap_or_default();
            let time = session.time.as_deref().unwrap_or_default();
            Ok(replies::booking_confirmed(
                &provider.name,
                &date_label(date),
                time,
            ))
        }
        CommitOutcome::ProviderAlreadyBooked => {
            let date = session.date.as_deref().unwrap_or_default().to_string();
            queries::delete_session(conn, &session.id)?;
            Ok(replies::already_booked_with_provider(
                &date_label(&date),
                &config.clinic_name,
            ))
        }
        CommitOutcome::SpecialtyAlreadyBooked => {
            let date = session.date.as_deref().unwrap_or_default().to_string();
            queries::delete_session(conn, &session.id)?;
            Ok(replies::already_booked_specialty(
                &date_label(&date),
                &config.clinic_name,
            ))
        }
        CommitOutcome::SlotTaken => refresh_hours(conn, config, session),
    }
}

/// The chosen hour disappeared under us: drop it and re-offer the live hour
/// menu, or end the conversation if nothing is left.
fn refresh_hours(
    conn: &mut Connection,
    config: &AppConfig,
    session: &mut Session,
) -> anyhow::Result<String> {
    session.clear_from(Step::Time);
    session.last_answer_at = Utc::now().naive_utc();
    queries::truncate_answers_from(conn, &session.id, Step::Time)?;
    queries::save_session(conn, session)?;

    match enter_step(conn, config, session, Step::Time)? {
        StepEntry::Menu(menu) => Ok(replies::slot_taken(&menu)),
        StepEntry::Empty => {
            queries::delete_session(conn, &session.id)?;
            Ok(replies::no_availability(&config.clinic_name))
        }
    }
}

fn confirmation_prompt(conn: &Connection, session: &Session) -> anyhow::Result<String> {
    let patient = queries::get_patient(conn, session.patient_id.as_deref().unwrap_or_default())?
        .context("session references a missing patient")?;
    let facility = queries::get_facility(conn, session.facility_id.as_deref().unwrap_or_default())?
        .context("session references a missing facility")?;
    let specialty =
        queries::get_specialty(conn, session.specialty_id.as_deref().unwrap_or_default())?
            .context("session references a missing specialty")?;
    let provider = queries::get_provider(conn, session.provider_id.as_deref().unwrap_or_default())?
        .context("session references a missing provider")?;
    let date = session.date.as_deref().unwrap_or_default();
    let time = session.time.as_deref().unwrap_or_default();

    Ok(replies::confirm_prompt(
        &patient.full_name,
        &facility.name,
        &specialty.name,
        &provider.name,
        &date_label(date),
        time,
    ))
}

fn lookahead_range(config: &AppConfig) -> (String, String) {
    let today = Utc::now().naive_utc().date();
    let until = today + chrono::Duration::days(config.lookahead_days);
    (
        today.format("%Y-%m-%d").to_string(),
        until.format("%Y-%m-%d").to_string(),
    )
}

fn date_label(date: &str) -> String {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}
