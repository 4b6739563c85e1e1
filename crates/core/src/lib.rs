pub mod audit;
pub mod auth;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod queue;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, QueueConfig, SanitizedConfig, ServerConfig,
};
pub use queue::{
    derive_status, AdvanceOutcome, QueueDayState, QueueError, QueueService, QueueSnapshot,
    QueueStore, QueueTransaction, ResetOutcome, RetryPolicy, SqliteQueueStore, StatusCounts,
    Ticket, TicketStatus, TicketView,
};
