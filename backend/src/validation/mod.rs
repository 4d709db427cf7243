//! Request payload validation.

pub mod rules;

pub use validator::Validate;
