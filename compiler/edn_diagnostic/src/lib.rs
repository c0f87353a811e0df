//! Diagnostic system for the EDN IR compiler.
//!
//! - Error codes for searchability ([`ErrorCode`])
//! - Clear messages (what went wrong)
//! - Labeled spans (where it went wrong)
//! - Notes (why it matters)
//!
//! Rendering is left to the driver.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
