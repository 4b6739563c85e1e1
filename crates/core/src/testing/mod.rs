//! Test doubles for the queue's collaborators.
//!
//! # Example
//!
//! ```rust,ignore
//! use queueline_core::testing::FixedClock;
//!
//! let clock = FixedClock::on(2026, 10, 19);
//! // ...issue tickets...
//! clock.advance_days(1);
//! // the next issue starts again at number 1
//! ```

mod fixed_clock;
mod memory;

pub use fixed_clock::FixedClock;
pub use memory::MemoryTransaction;
