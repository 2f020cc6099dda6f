//! Utility types shared by the library and the `telopay` binary.
//!
//! - [`money_amount`] - Decimal amount parsing for the payment form
//! - [`sig_down`] - Ctrl-C / SIGTERM handling while following a transaction
//! - [`telemetry`] - `tracing` subscriber setup, optional OpenTelemetry export

pub mod money_amount;
pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
