pub mod booking;
pub mod directory;
pub mod menu;
pub mod session;

pub use booking::{Booking, BookingSummary, Slot, SlotState};
pub use directory::{Facility, Patient, Provider, Specialty};
pub use menu::MenuOption;
pub use session::{AnswerEntry, ConsultationType, Session, SessionStatus, Step};
