pub mod error;
pub mod events;
pub mod id;
pub mod schedule;

pub use error::{CoreError, Result};
pub use id::{generate_patient_uid, is_patient_uid};
pub use schedule::{BUSINESS_SLOTS, available_slots, parse_date, parse_slot, slot_datetime};
