//! Port probing and allocation.
//!
//! * `checker` - connect/bind checks for a host and port
//! * `reservation` - process-wide claims that make port selection atomic
mod checker;
mod reservation;

pub use checker::{DEFAULT_CONNECT_TIMEOUT, PortChecker};
pub use reservation::PortReservation;
