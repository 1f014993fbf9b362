pub mod auth;
pub mod engine;
pub mod jsonstore;
pub mod protocol;
pub mod records;
pub mod server;
