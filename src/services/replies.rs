//! Reply texts for the chat channel. The markup conventions — `*bold*`
//! markers, numbered bullets, fixed emoji per menu — are part of the contract
//! with the upstream chat client and are rendered as-is.

use crate::models::{BookingSummary, MenuOption, Step};

pub fn main_menu(clinic_name: &str) -> String {
    format!(
        "👋 *Bienvenido a {clinic_name}.*\n\n\
         1. Agendar una nueva cita\n\
         2. Ver mis próximas citas\n\
         3. Ver mis citas anteriores\n\n\
         Responda con el número de la opción deseada."
    )
}

pub fn ask_cedula() -> String {
    "🪪 Por favor indique su número de cédula.".to_string()
}

pub fn patient_not_found() -> String {
    "❌ No encontramos un paciente registrado con esa cédula. Verifique el número e intente de nuevo."
        .to_string()
}

pub fn step_header(step: Step) -> &'static str {
    match step {
        Step::Facility => "🏥 *Seleccione la sede:*",
        Step::Specialty => "🩺 *Seleccione la especialidad:*",
        Step::Provider => "👨‍⚕️ *Seleccione el médico:*",
        Step::Date => "📅 *Seleccione la fecha:*",
        Step::Time => "🕐 *Seleccione la hora:*",
        _ => "*Seleccione una opción:*",
    }
}

pub fn numbered_menu(step: Step, options: &[MenuOption]) -> String {
    let mut out = format!("{}\n\n", step_header(step));
    for option in options {
        out.push_str(&format!("{}. {}\n", option.ordinal, option.label));
    }
    out.push_str("\nEscriba *atras* para volver o *cancelar* para salir.");
    out
}

pub fn option_not_found() -> String {
    "❌ No encontramos esa opción. Responda con el número o el nombre tal como aparece en la lista."
        .to_string()
}

pub fn option_ambiguous() -> String {
    "⚠️ Su respuesta coincide con varias opciones. Sea más específico o responda con el número."
        .to_string()
}

pub fn confirm_prompt(
    patient_name: &str,
    facility_name: &str,
    specialty_name: &str,
    provider_name: &str,
    date: &str,
    time: &str,
) -> String {
    format!(
        "📝 *Confirme su cita:*\n\n\
         👤 Paciente: {patient_name}\n\
         🏥 Sede: {facility_name}\n\
         🩺 Especialidad: {specialty_name}\n\
         👨‍⚕️ Médico: {provider_name}\n\
         📅 Fecha: {date}\n\
         🕐 Hora: {time}\n\n\
         Responda *SI* para confirmar o *NO* para cancelar."
    )
}

pub fn confirm_reprompt() -> String {
    "Responda *SI* para confirmar o *NO* para cancelar.".to_string()
}

pub fn booking_confirmed(provider_name: &str, date: &str, time: &str) -> String {
    format!(
        "✅ *Su cita ha sido registrada.*\n\n\
         👨‍⚕️ {provider_name}\n\
         📅 {date} a las {time}\n\n\
         Le esperamos. Gracias por usar nuestro servicio."
    )
}

pub fn cancelled(clinic_name: &str) -> String {
    format!(
        "🚫 Hemos cancelado el proceso.\n\n{}",
        main_menu(clinic_name)
    )
}

pub fn eligibility_rejected(specialty_name: &str, bridge_specialty: &str, clinic_name: &str) -> String {
    format!(
        "❌ Para agendar *{specialty_name}* necesita una consulta completada en los últimos meses \
         en esa especialidad o en *{bridge_specialty}*.\n\n{}",
        main_menu(clinic_name)
    )
}

pub fn already_booked_with_provider(date: &str, clinic_name: &str) -> String {
    format!(
        "❌ Usted ya tiene una cita con este médico para el {date}.\n\n{}",
        main_menu(clinic_name)
    )
}

pub fn already_booked_specialty(date: &str, clinic_name: &str) -> String {
    format!(
        "❌ Usted ya tiene una cita en esta especialidad para el {date}.\n\n{}",
        main_menu(clinic_name)
    )
}

pub fn slot_taken(hour_menu: &str) -> String {
    format!("⚠️ Lo sentimos, esa hora acaba de ser tomada.\n\n{hour_menu}")
}

pub fn no_availability(clinic_name: &str) -> String {
    format!(
        "😔 No hay disponibilidad en este momento. Intente más tarde.\n\n{}",
        main_menu(clinic_name)
    )
}

pub fn back_unavailable() -> String {
    "⚠️ Aún no hay un paso anterior al cual volver.".to_string()
}

pub fn bookings_list(header: &str, bookings: &[BookingSummary], clinic_name: &str) -> String {
    if bookings.is_empty() {
        return format!(
            "📋 No encontramos citas registradas.\n\n{}",
            main_menu(clinic_name)
        );
    }

    let mut out = format!("{header}\n\n");
    for (i, b) in bookings.iter().enumerate() {
        out.push_str(&format!(
            "{}. 📅 {} {} — {} ({}, {})\n",
            i + 1,
            b.date,
            b.time,
            b.provider_name,
            b.specialty_name,
            b.facility_name
        ));
    }
    out.push_str(&format!("\n{}", main_menu(clinic_name)));
    out
}

pub fn upcoming_header() -> &'static str {
    "📋 *Sus próximas citas:*"
}

pub fn past_header() -> &'static str {
    "📋 *Sus citas anteriores:*"
}

pub fn generic_failure() -> String {
    "Lo sentimos, estamos presentando inconvenientes. Intente nuevamente en unos minutos."
        .to_string()
}
