//! Database query functions organized by domain.

pub mod session;
pub mod settings;
