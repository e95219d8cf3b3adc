//! Ask/answer correlation.

pub mod manager;

pub use manager::{Session, SessionManager};
