//! Collaborator traits defined in `casitas-core` and implemented by other crates.

pub mod clock;
pub mod media;
pub mod record;
pub mod session;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use media::{MediaStore, MediaStoreDiagnostics, StoredMedia};
pub use record::RecordStore;
pub use session::{SessionRecord, SessionStore, SessionUpdate};
pub use storage::StorageProvider;
