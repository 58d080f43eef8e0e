//! Callback Timers
//!
//! One-shot (`set_timeout`) and periodic (`set_interval`) callbacks, each
//! schedule running on its own background thread. Waiting is done on a
//! condition variable so that [`Timer::stop`] interrupts a pending wait
//! immediately.

mod timer;

pub use timer::{Timer, TimerError};
