//! burrow server library
//!
//! HTTP front end for [`burrow_kernel`]: the authentication gate, CORS
//! handling, a small file-method engine over the jailed filesystem, and the
//! plain/TLS listeners.

pub mod auth;
pub mod constants;
pub mod cors;
pub mod engine;
pub mod error;
pub mod server;
pub mod state;

pub use error::{ServerError, ServerResult, StartupError};
pub use server::{router, run};
pub use state::AppState;
