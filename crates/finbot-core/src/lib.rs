//! Domain services for finbot
//!
//! Everything here operates on a [`finbot_store::Database`] handle and
//! returns [`CoreError`] with stable machine-readable codes for the
//! API layer.

pub mod aging;
pub mod credit;
pub mod error;
pub mod forecast;
pub mod ledger;
pub mod recurring;
pub mod reports;

pub use error::{CoreError, CoreResult, ErrorCode};
