//! In-memory reference adapters.
//!
//! These back the domain ports with process-local state: the default for
//! development and the only adapters exercised by the test suite. A managed
//! document store or identity provider slots in behind the same traits
//! without touching the domain.

pub mod auth_store;
pub mod doc_store;
pub mod mailer;

pub use self::auth_store::MemoryAuthStore;
pub use self::doc_store::MemoryDocStore;
pub use self::mailer::RecordingMailer;
