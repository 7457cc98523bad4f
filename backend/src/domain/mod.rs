//! Domain core: entities, validation, conflict resolution, sync engine,
//! and the authentication workflow.
//!
//! Everything in this module is transport-agnostic. Inbound adapters map
//! [`Error`] values onto their own wire formats; outbound adapters implement
//! the traits in [`ports`].

pub mod auth;
pub mod conflict;
pub mod document;
pub mod entity;
pub mod error;
pub mod ports;
pub mod sync;
pub mod timestamp;
pub mod validate;

pub use self::document::Document;
pub use self::entity::EntityKind;
pub use self::error::{Error, ErrorCode};

/// Response header carrying the request-scoped trace identifier.
pub const TRACE_ID_HEADER: &str = "trace-id";
