use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Top-level menu choice recorded at session creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    New,
    Upcoming,
    Past,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::New => "new",
            ConsultationType::Upcoming => "upcoming",
            ConsultationType::Past => "past",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "upcoming" => ConsultationType::Upcoming,
            "past" => ConsultationType::Past,
            _ => ConsultationType::New,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Booked,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Booked => "booked",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "booked" => SessionStatus::Booked,
            "cancelled" => SessionStatus::Cancelled,
            _ => SessionStatus::Open,
        }
    }
}

/// One ordered field of the booking flow. Fields are filled strictly in this
/// order; an unset field implies every later field is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Identification,
    Facility,
    Specialty,
    Provider,
    Date,
    Time,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Identification,
        Step::Facility,
        Step::Specialty,
        Step::Provider,
        Step::Date,
        Step::Time,
        Step::Confirmation,
    ];

    pub fn index(self) -> i64 {
        Step::ALL.iter().position(|s| *s == self).unwrap_or(0) as i64
    }

    pub fn from_index(i: i64) -> Option<Step> {
        Step::ALL.get(usize::try_from(i).ok()?).copied()
    }

    pub fn next(self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }
}

/// One entry of the append-only per-session answer log. Forward dispatch
/// appends a row per resolved step; backward navigation reads and truncates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub step: i64,
    pub entity_id: String,
    pub label: String,
    pub answered_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub phone: String,
    pub consultation_type: ConsultationType,
    pub patient_id: Option<String>,
    pub facility_id: Option<String>,
    pub specialty_id: Option<String>,
    pub provider_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub confirmation_answer: Option<String>,
    pub status: SessionStatus,
    pub created_at: NaiveDateTime,
    pub last_answer_at: NaiveDateTime,
}

impl Session {
    pub fn new(phone: &str, consultation_type: ConsultationType, now: NaiveDateTime) -> Self {
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            consultation_type,
            patient_id: None,
            facility_id: None,
            specialty_id: None,
            provider_id: None,
            date: None,
            time: None,
            confirmation_answer: None,
            status: SessionStatus::Open,
            created_at: now,
            last_answer_at: now,
        }
    }

    /// The first unset field, i.e. the step the next answer belongs to.
    pub fn current_step(&self) -> Step {
        if self.patient_id.is_none() {
            Step::Identification
        } else if self.facility_id.is_none() {
            Step::Facility
        } else if self.specialty_id.is_none() {
            Step::Specialty
        } else if self.provider_id.is_none() {
            Step::Provider
        } else if self.date.is_none() {
            Step::Date
        } else if self.time.is_none() {
            Step::Time
        } else {
            Step::Confirmation
        }
    }

    pub fn field(&self, step: Step) -> Option<&str> {
        match step {
            Step::Identification => self.patient_id.as_deref(),
            Step::Facility => self.facility_id.as_deref(),
            Step::Specialty => self.specialty_id.as_deref(),
            Step::Provider => self.provider_id.as_deref(),
            Step::Date => self.date.as_deref(),
            Step::Time => self.time.as_deref(),
            Step::Confirmation => self.confirmation_answer.as_deref(),
        }
    }

    pub fn set_field(&mut self, step: Step, value: String) {
        match step {
            Step::Identification => self.patient_id = Some(value),
            Step::Facility => self.facility_id = Some(value),
            Step::Specialty => self.specialty_id = Some(value),
            Step::Provider => self.provider_id = Some(value),
            Step::Date => self.date = Some(value),
            Step::Time => self.time = Some(value),
            Step::Confirmation => self.confirmation_answer = Some(value),
        }
    }

    /// Clears `step` and every later field, preserving the ordering invariant.
    pub fn clear_from(&mut self, step: Step) {
        for s in Step::ALL.iter().filter(|s| **s >= step) {
            match s {
                Step::Identification => self.patient_id = None,
                Step::Facility => self.facility_id = None,
                Step::Specialty => self.specialty_id = None,
                Step::Provider => self.provider_id = None,
                Step::Date => self.date = None,
                Step::Time => self.time = None,
                Step::Confirmation => self.confirmation_answer = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("+593999000111", ConsultationType::New, chrono::Utc::now().naive_utc())
    }

    #[test]
    fn test_current_step_advances_in_order() {
        let mut s = session();
        assert_eq!(s.current_step(), Step::Identification);
        s.patient_id = Some("p1".into());
        assert_eq!(s.current_step(), Step::Facility);
        s.facility_id = Some("f1".into());
        assert_eq!(s.current_step(), Step::Specialty);
        s.specialty_id = Some("e1".into());
        s.provider_id = Some("d1".into());
        s.date = Some("2025-10-10".into());
        assert_eq!(s.current_step(), Step::Time);
        s.time = Some("09:00".into());
        assert_eq!(s.current_step(), Step::Confirmation);
    }

    #[test]
    fn test_clear_from_clears_all_later_fields() {
        let mut s = session();
        s.patient_id = Some("p1".into());
        s.facility_id = Some("f1".into());
        s.specialty_id = Some("e1".into());
        s.provider_id = Some("d1".into());
        s.date = Some("2025-10-10".into());
        s.time = Some("09:00".into());

        s.clear_from(Step::Provider);

        assert_eq!(s.patient_id.as_deref(), Some("p1"));
        assert_eq!(s.specialty_id.as_deref(), Some("e1"));
        assert!(s.provider_id.is_none());
        assert!(s.date.is_none());
        assert!(s.time.is_none());
        assert_eq!(s.current_step(), Step::Provider);
    }

    #[test]
    fn test_step_index_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::from_index(step.index()), Some(step));
        }
        assert_eq!(Step::from_index(7), None);
        assert_eq!(Step::Time.next(), Some(Step::Confirmation));
        assert_eq!(Step::Confirmation.next(), None);
    }
}
