//! Session aggregate: anonymous-to-credentialed account upgrade.
//!
//! The upgrade is modeled as an explicit state transition
//! (`Anonymous → Upgrading → Authenticated`) so a half-finished upgrade is a
//! visible state, not an implicit side effect of a wizard step. An upgraded
//! account with no completed payment is a reachable, tolerated terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use confreg_core::{Aggregate, AggregateId, AggregateRoot, AttendeeId, DomainError, SocietyId};
use confreg_events::Event;

use crate::credentials::{validate_email, validate_simple_password};

/// Session identifier (society-scoped via `society_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub AggregateId);

impl SessionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Anonymous,
    Upgrading,
    Authenticated,
}

/// Aggregate root: attendee session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    society_id: Option<SocietyId>,
    attendee_id: Option<AttendeeId>,
    state: SessionState,
    email: Option<String>,
    version: u64,
    created: bool,
}

impl Session {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SessionId) -> Self {
        Self {
            id,
            society_id: None,
            attendee_id: None,
            state: SessionState::Anonymous,
            email: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SessionId {
        self.id
    }

    pub fn society_id(&self) -> Option<SocietyId> {
        self.society_id
    }

    pub fn attendee_id(&self) -> Option<AttendeeId> {
        self.attendee_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.state != SessionState::Authenticated
    }
}

impl AggregateRoot for Session {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartAnonymousSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAnonymousSession {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BeginUpgrade.
///
/// The password is validated here but never emitted in an event; credential
/// storage belongs to the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginUpgrade {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub email: String,
    pub password: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteUpgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteUpgrade {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AbortUpgrade (provider rejected the credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortUpgrade {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    StartAnonymous(StartAnonymousSession),
    BeginUpgrade(BeginUpgrade),
    CompleteUpgrade(CompleteUpgrade),
    AbortUpgrade(AbortUpgrade),
}

/// Event: SessionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UpgradeStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeStarted {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UpgradeCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCompleted {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UpgradeAborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeAborted {
    pub society_id: SocietyId,
    pub session_id: SessionId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    Started(SessionStarted),
    UpgradeStarted(UpgradeStarted),
    UpgradeCompleted(UpgradeCompleted),
    UpgradeAborted(UpgradeAborted),
}

impl Event for SessionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Started(_) => "identity.session.started",
            SessionEvent::UpgradeStarted(_) => "identity.session.upgrade_started",
            SessionEvent::UpgradeCompleted(_) => "identity.session.upgrade_completed",
            SessionEvent::UpgradeAborted(_) => "identity.session.upgrade_aborted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::Started(e) => e.occurred_at,
            SessionEvent::UpgradeStarted(e) => e.occurred_at,
            SessionEvent::UpgradeCompleted(e) => e.occurred_at,
            SessionEvent::UpgradeAborted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Session {
    type Command = SessionCommand;
    type Event = SessionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SessionEvent::Started(e) => {
                self.id = e.session_id;
                self.society_id = Some(e.society_id);
                self.attendee_id = Some(e.attendee_id);
                self.state = SessionState::Anonymous;
                self.created = true;
            }
            SessionEvent::UpgradeStarted(e) => {
                self.state = SessionState::Upgrading;
                self.email = Some(e.email.clone());
            }
            SessionEvent::UpgradeCompleted(_) => {
                self.state = SessionState::Authenticated;
            }
            SessionEvent::UpgradeAborted(_) => {
                self.state = SessionState::Anonymous;
                self.email = None;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SessionCommand::StartAnonymous(cmd) => self.handle_start(cmd),
            SessionCommand::BeginUpgrade(cmd) => self.handle_begin_upgrade(cmd),
            SessionCommand::CompleteUpgrade(cmd) => self.handle_complete_upgrade(cmd),
            SessionCommand::AbortUpgrade(cmd) => self.handle_abort_upgrade(cmd),
        }
    }
}

impl Session {
    fn ensure_society(&self, society_id: SocietyId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.society_id != Some(society_id) {
            return Err(DomainError::invariant("society mismatch"));
        }
        Ok(())
    }

    fn ensure_session_id(&self, session_id: SessionId) -> Result<(), DomainError> {
        if self.id != session_id {
            return Err(DomainError::invariant("session_id mismatch"));
        }
        Ok(())
    }

    fn handle_start(&self, cmd: &StartAnonymousSession) -> Result<Vec<SessionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("session already exists"));
        }

        Ok(vec![SessionEvent::Started(SessionStarted {
            society_id: cmd.society_id,
            session_id: cmd.session_id,
            attendee_id: cmd.attendee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_upgrade(&self, cmd: &BeginUpgrade) -> Result<Vec<SessionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_society(cmd.society_id)?;
        self.ensure_session_id(cmd.session_id)?;

        match self.state {
            SessionState::Anonymous => {}
            SessionState::Upgrading => {
                return Err(DomainError::conflict("upgrade already in progress"));
            }
            SessionState::Authenticated => {
                return Err(DomainError::conflict("session is already authenticated"));
            }
        }

        validate_email(&cmd.email).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_simple_password(&cmd.password)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        Ok(vec![SessionEvent::UpgradeStarted(UpgradeStarted {
            society_id: cmd.society_id,
            session_id: cmd.session_id,
            email: cmd.email.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete_upgrade(
        &self,
        cmd: &CompleteUpgrade,
    ) -> Result<Vec<SessionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_society(cmd.society_id)?;
        self.ensure_session_id(cmd.session_id)?;

        if self.state != SessionState::Upgrading {
            return Err(DomainError::conflict("no upgrade in progress"));
        }

        Ok(vec![SessionEvent::UpgradeCompleted(UpgradeCompleted {
            society_id: cmd.society_id,
            session_id: cmd.session_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_abort_upgrade(&self, cmd: &AbortUpgrade) -> Result<Vec<SessionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_society(cmd.society_id)?;
        self.ensure_session_id(cmd.session_id)?;

        if self.state != SessionState::Upgrading {
            return Err(DomainError::conflict("no upgrade in progress"));
        }

        Ok(vec![SessionEvent::UpgradeAborted(UpgradeAborted {
            society_id: cmd.society_id,
            session_id: cmd.session_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_society_id() -> SocietyId {
        SocietyId::new()
    }

    fn test_session_id() -> SessionId {
        SessionId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn started(society_id: SocietyId, session_id: SessionId) -> Session {
        let mut session = Session::empty(session_id);
        let events = session
            .handle(&SessionCommand::StartAnonymous(StartAnonymousSession {
                society_id,
                session_id,
                attendee_id: AttendeeId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);
        session
    }

    fn begin_upgrade_cmd(society_id: SocietyId, session_id: SessionId) -> SessionCommand {
        SessionCommand::BeginUpgrade(BeginUpgrade {
            society_id,
            session_id,
            email: "guest@example.com".to_string(),
            password: "abc123".to_string(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn start_creates_anonymous_session() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let session = started(society_id, session_id);

        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.is_anonymous());
        assert_eq!(session.society_id(), Some(society_id));
        assert_eq!(session.version(), 1);
    }

    #[test]
    fn upgrade_walks_anonymous_to_authenticated() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let mut session = started(society_id, session_id);

        let events = session
            .handle(&begin_upgrade_cmd(society_id, session_id))
            .unwrap();
        session.apply(&events[0]);
        assert_eq!(session.state(), SessionState::Upgrading);
        assert_eq!(session.email(), Some("guest@example.com"));

        let events = session
            .handle(&SessionCommand::CompleteUpgrade(CompleteUpgrade {
                society_id,
                session_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(!session.is_anonymous());
    }

    #[test]
    fn upgrade_from_authenticated_is_conflict() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let mut session = started(society_id, session_id);

        for cmd in [
            begin_upgrade_cmd(society_id, session_id),
            SessionCommand::CompleteUpgrade(CompleteUpgrade {
                society_id,
                session_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = session.handle(&cmd).unwrap();
            session.apply(&events[0]);
        }

        let err = session
            .handle(&begin_upgrade_cmd(society_id, session_id))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn begin_upgrade_rejects_weak_password() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let session = started(society_id, session_id);

        let err = session
            .handle(&SessionCommand::BeginUpgrade(BeginUpgrade {
                society_id,
                session_id,
                email: "guest@example.com".to_string(),
                password: "123".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn begin_upgrade_rejects_invalid_email() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let session = started(society_id, session_id);

        let err = session
            .handle(&SessionCommand::BeginUpgrade(BeginUpgrade {
                society_id,
                session_id,
                email: "not-an-email".to_string(),
                password: "abc123".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn abort_returns_to_anonymous() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let mut session = started(society_id, session_id);

        let events = session
            .handle(&begin_upgrade_cmd(society_id, session_id))
            .unwrap();
        session.apply(&events[0]);

        let events = session
            .handle(&SessionCommand::AbortUpgrade(AbortUpgrade {
                society_id,
                session_id,
                reason: Some("email already in use".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);

        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.email(), None);
    }

    #[test]
    fn complete_without_begin_is_conflict() {
        let society_id = test_society_id();
        let session_id = test_session_id();
        let session = started(society_id, session_id);

        let err = session
            .handle(&SessionCommand::CompleteUpgrade(CompleteUpgrade {
                society_id,
                session_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_against_missing_session_are_not_found() {
        let session = Session::empty(test_session_id());
        let err = session
            .handle(&SessionCommand::CompleteUpgrade(CompleteUpgrade {
                society_id: test_society_id(),
                session_id: session.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
