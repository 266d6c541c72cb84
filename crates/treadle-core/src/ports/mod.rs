//! Ports - the seams the executor reaches the outside world through.
//!
//! Only time and id generation live here; the training pipeline's external
//! operations are ports of the training crate.

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
