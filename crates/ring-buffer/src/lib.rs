//! Byte Ring Buffer
//!
//! Fixed-capacity circular byte store that sits between a serial link and
//! its frame decoder. The buffer holds no locks: one instance belongs to
//! exactly one link reader loop.

mod buffer;

pub use buffer::{RingBuffer, SENTINEL};
