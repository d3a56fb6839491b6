//! Request handlers.

pub mod delivery;
pub mod health;
pub mod manifest;
pub mod stream;

pub use health::{health, ready};
