//! Services injected into request handlers through `AppState`.
//!
//! External collaborators sit behind traits (`ChatModel`, `OcrEngine`,
//! `VideoConferencing`) so tests can swap them out; their failures degrade
//! to fallbacks instead of failing requests.

pub mod audit;
pub mod catalog;
pub mod ocr;
pub mod orders;
pub mod triage;
pub mod video;

pub use audit::{AuditAction, AuditTrail};
pub use catalog::{MedicineCatalog, MedicineQuery, MedicineView};
pub use ocr::{NO_TEXT_PLACEHOLDER, OcrEngine, OcrError, OcrService, TesseractOcr};
pub use orders::{OrderBook, PharmacyOrder};
pub use triage::{ChatModel, ChatReply, ChatTurn, GroqChatModel, TriageAssistant, TriageError};
pub use video::{VideoConferencing, VideoError, VideoService, ZoomClient};
