use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Everything the audit trail records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    TicketIssued {
        ticket_id: String,
        number: u32,
        service_date: NaiveDate,
        user_id: String,
    },

    QueueAdvanced {
        service_date: NaiveDate,
        previous_number: u32,
        new_current_number: u32,
        mark_completed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_ticket_id: Option<String>,
        user_id: String,
    },

    /// Counters overwritten by an operator. The `replaced_*` fields are the
    /// record as it was, absent if there was none.
    QueueReset {
        service_date: NaiveDate,
        #[serde(default)]
        replaced_service_date: Option<NaiveDate>,
        #[serde(default)]
        replaced_next_number: Option<u32>,
        #[serde(default)]
        replaced_current_number: Option<u32>,
        user_id: String,
    },
}

impl AuditEvent {
    /// Storage name of the variant, matching its serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketIssued { .. } => "ticket_issued",
            Self::QueueAdvanced { .. } => "queue_advanced",
            Self::QueueReset { .. } => "queue_reset",
        }
    }

    /// Ticket the event concerns, indexed for lookups.
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketIssued { ticket_id, .. } => Some(ticket_id),
            Self::QueueAdvanced {
                completed_ticket_id,
                ..
            } => completed_ticket_id.as_deref(),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } | Self::QueueReset { .. } => {
                None
            }
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TicketIssued { user_id, .. }
            | Self::QueueAdvanced { user_id, .. }
            | Self::QueueReset { user_id, .. } => Some(user_id),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// A persisted audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_service_events_have_no_ids() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.ticket_id(), None);
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn test_ticket_issued_ids() {
        let event = AuditEvent::TicketIssued {
            ticket_id: "t-1".to_string(),
            number: 7,
            service_date: date(),
            user_id: "anonymous".to_string(),
        };
        assert_eq!(event.event_type(), "ticket_issued");
        assert_eq!(event.ticket_id(), Some("t-1"));
        assert_eq!(event.user_id(), Some("anonymous"));
    }

    #[test]
    fn test_advance_ticket_id_is_the_completed_one() {
        let skipped = AuditEvent::QueueAdvanced {
            service_date: date(),
            previous_number: 2,
            new_current_number: 3,
            mark_completed: false,
            completed_ticket_id: None,
            user_id: "operator".to_string(),
        };
        assert_eq!(skipped.ticket_id(), None);

        let completed = AuditEvent::QueueAdvanced {
            service_date: date(),
            previous_number: 2,
            new_current_number: 3,
            mark_completed: true,
            completed_ticket_id: Some("t-2".to_string()),
            user_id: "operator".to_string(),
        };
        assert_eq!(completed.ticket_id(), Some("t-2"));
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = AuditEvent::QueueReset {
            service_date: date(),
            replaced_service_date: Some(date()),
            replaced_next_number: Some(12),
            replaced_current_number: Some(9),
            user_id: "operator".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["service_date"], "2026-10-19");
        assert_eq!(json["replaced_next_number"], 12);

        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
