use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use confreg_core::{AggregateId, AttendeeId, SocietyId};
use confreg_events::EventEnvelope;
use confreg_identity::{SessionEvent, SessionId, SessionState};

use crate::read_model::SocietyStore;

/// Session directory entry. Backs `/whoami` and duplicate-email detection
/// during account upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReadModel {
    pub session_id: SessionId,
    pub attendee_id: AttendeeId,
    pub state: SessionState,
    pub email: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    society_id: SocietyId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum SessionProjectionError {
    #[error("failed to deserialize session event: {0}")]
    Deserialize(String),
    #[error("society isolation violation: {0}")]
    SocietyIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Sessions read model builder.
#[derive(Debug)]
pub struct SessionsProjection<S>
where
    S: SocietyStore<SessionId, SessionReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> SessionsProjection<S>
where
    S: SocietyStore<SessionId, SessionReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, society_id: SocietyId, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors
                .get(&CursorKey {
                    society_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, society_id: SocietyId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    society_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    pub fn get(&self, society_id: SocietyId, session_id: &SessionId) -> Option<SessionReadModel> {
        self.store.get(society_id, session_id)
    }

    pub fn list(&self, society_id: SocietyId) -> Vec<SessionReadModel> {
        self.store.list(society_id)
    }

    /// Whether an email is already bound to a session in this society.
    /// Checked before an upgrade begins; comparison is case-insensitive.
    pub fn email_in_use(&self, society_id: SocietyId, email: &str) -> bool {
        let wanted = email.trim().to_lowercase();
        self.store.list(society_id).into_iter().any(|rm| {
            rm.email
                .as_deref()
                .is_some_and(|e| e.to_lowercase() == wanted)
        })
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), SessionProjectionError> {
        if envelope.aggregate_type() != "identity.session" {
            return Ok(());
        }

        let society_id = envelope.society_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(society_id, aggregate_id);
        if seq == 0 {
            return Err(SessionProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(SessionProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: SessionEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| SessionProjectionError::Deserialize(e.to_string()))?;

        let (event_society, session_id) = match &ev {
            SessionEvent::Started(e) => (e.society_id, e.session_id),
            SessionEvent::UpgradeStarted(e) => (e.society_id, e.session_id),
            SessionEvent::UpgradeCompleted(e) => (e.society_id, e.session_id),
            SessionEvent::UpgradeAborted(e) => (e.society_id, e.session_id),
        };

        if event_society != society_id {
            return Err(SessionProjectionError::SocietyIsolation(
                "event society_id does not match envelope society_id".to_string(),
            ));
        }
        if session_id.0 != aggregate_id {
            return Err(SessionProjectionError::SocietyIsolation(
                "event session_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            SessionEvent::Started(e) => {
                self.store.upsert(
                    society_id,
                    e.session_id,
                    SessionReadModel {
                        session_id: e.session_id,
                        attendee_id: e.attendee_id,
                        state: SessionState::Anonymous,
                        email: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SessionEvent::UpgradeStarted(e) => {
                self.mutate(society_id, session_id, e.occurred_at, |rm| {
                    rm.state = SessionState::Upgrading;
                    rm.email = Some(e.email.clone());
                });
            }
            SessionEvent::UpgradeCompleted(e) => {
                self.mutate(society_id, session_id, e.occurred_at, |rm| {
                    rm.state = SessionState::Authenticated;
                });
            }
            SessionEvent::UpgradeAborted(e) => {
                self.mutate(society_id, session_id, e.occurred_at, |rm| {
                    rm.state = SessionState::Anonymous;
                    rm.email = None;
                });
            }
        }

        self.update_cursor(society_id, aggregate_id, seq);
        Ok(())
    }

    fn mutate(
        &self,
        society_id: SocietyId,
        session_id: SessionId,
        occurred_at: DateTime<Utc>,
        f: impl FnOnce(&mut SessionReadModel),
    ) {
        if let Some(mut rm) = self.store.get(society_id, &session_id) {
            f(&mut rm);
            rm.updated_at = occurred_at;
            self.store.upsert(society_id, session_id, rm);
        }
    }
}
