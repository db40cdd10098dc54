pub mod booking;
pub mod session;
pub mod user;

pub use booking::{BookingDraft, DraftKey};
pub use session::{Continuation, Resume, Session};
pub use user::{normalize_phone, Doctor, User};
