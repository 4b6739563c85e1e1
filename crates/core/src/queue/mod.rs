//! Walk-up queue: ticket issuance, the now-serving pointer, and derived status.

pub mod advancer;
mod day_state;
pub mod issuer;
mod service;
mod sqlite_store;
mod status;
mod store;
mod types;

pub use day_state::{QueueDayState, STATE_KEY};
pub use service::QueueService;
pub use sqlite_store::{RetryPolicy, SqliteQueueStore};
pub use status::{derive_status, StatusCounts, TicketStatus};
pub use store::{QueueError, QueueStore, QueueTransaction};
pub use types::{AdvanceOutcome, QueueSnapshot, ResetOutcome, Ticket, TicketView};
