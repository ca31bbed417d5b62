//! # Utility Modules
//!
//! Supporting utilities that sit outside the wire format.
//!
//! ## Components
//! - **Logging**: tracing subscriber setup from `LoggingConfig`

pub mod logging;

pub use logging::init_logging;
