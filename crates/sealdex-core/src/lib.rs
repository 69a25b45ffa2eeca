//! sealdex-core: shared types, configuration, and error taxonomy
//!
//! Everything in this crate is trust-domain neutral: both the client-side
//! indexing machinery and the server-side index store build on it.

pub mod config;
pub mod error;
pub mod types;

pub use config::SealdexConfig;
pub use error::{SealdexError, SealdexResult};
pub use types::{DocumentId, FolderId, KeyGen};
