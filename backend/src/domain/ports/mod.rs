//! Driven ports: the external collaborators the domain depends on.
//!
//! In hexagonal terms these are *driven* ports: the sync engine and the
//! auth workflow call them without knowing (or importing) the backing
//! infrastructure, which keeps domain tests deterministic because they can
//! substitute in-memory adapters instead of wiring a managed store.

pub mod auth_store;
pub mod doc_store;
pub mod mailer;

pub use self::auth_store::{AuthStore, AuthStoreError, AuthUser, AuthUserPatch};
pub use self::doc_store::{DocStore, StoreError};
pub use self::mailer::{MailError, Mailer};
