use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub clinic_name: String,
    /// Rolling window for resuming an open session, in minutes.
    pub session_window_minutes: i64,
    /// How far ahead provider availability is offered, in days.
    pub lookahead_days: i64,
    /// Patient class that must show a qualifying recent visit before booking
    /// a specialty.
    pub gated_patient_class: String,
    /// Specialty whose completed visits satisfy the gate for any specialty.
    pub bridge_specialty: String,
    pub referral_window_days: i64,
    /// Channel tag recorded on bookings created by this engine.
    pub booking_channel: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "citabot.db".to_string()),
            clinic_name: env::var("CLINIC_NAME")
                .unwrap_or_else(|_| "Centro Médico Vida".to_string()),
            session_window_minutes: env::var("SESSION_WINDOW_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            lookahead_days: env::var("LOOKAHEAD_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(14),
            gated_patient_class: env::var("GATED_PATIENT_CLASS")
                .unwrap_or_else(|_| "afiliado".to_string()),
            bridge_specialty: env::var("BRIDGE_SPECIALTY")
                .unwrap_or_else(|_| "MEDICINA GENERAL".to_string()),
            referral_window_days: env::var("REFERRAL_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(90),
            booking_channel: env::var("BOOKING_CHANNEL").unwrap_or_else(|_| "whatsapp".to_string()),
        }
    }
}
