pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

pub use router::dispatch;
pub use types::{AppState, Request};
