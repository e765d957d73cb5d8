//! Infrastructure wiring for the HTTP app.
//!
//! Builds the in-memory event store/bus pair, the command dispatcher, the
//! projections (fed by a bus subscriber thread), the period catalog, the
//! member verifier, and the payment session manager.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use confreg_core::{AggregateId, DomainError, SocietyId};
use confreg_events::{EventBus, EventEnvelope, InMemoryEventBus};
use confreg_identity::{Session, SessionCommand, SessionId};
use confreg_infra::{
    CommandDispatcher, DispatchError, InMemoryEventStore, InMemorySocietyStore, PeriodCatalog,
    RegistrationReadModel, RegistrationsProjection, SessionReadModel, SessionsProjection,
    StoredEvent,
};
use confreg_membership::{MemberVerifier, StaticDirectoryVerifier};
use confreg_payments::PaymentSessionManager;
use confreg_pricing::{Grade, GradeLabels, PriceResolution, RegistrationPeriod, resolve_price};
use confreg_registration::{Registration, RegistrationCommand, RegistrationId};

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type RegProjection =
    RegistrationsProjection<Arc<InMemorySocietyStore<RegistrationId, RegistrationReadModel>>>;
type SessProjection = SessionsProjection<Arc<InMemorySocietyStore<SessionId, SessionReadModel>>>;

/// Payment provider settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Provider client key handed to the checkout surface.
    pub client_key: String,
    /// Base URL the provider redirects back to.
    pub callback_base: String,
}

pub struct AppServices {
    dispatcher: Dispatcher,
    registrations: Arc<RegProjection>,
    sessions: Arc<SessProjection>,
    periods: PeriodCatalog,
    labels: RwLock<HashMap<SocietyId, GradeLabels>>,
    verifier: Arc<StaticDirectoryVerifier>,
    payment_sessions: PaymentSessionManager,
    payment_config: PaymentConfig,
}

/// Build the in-memory service graph and start the projection subscriber.
pub fn build_services(payment_config: PaymentConfig) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus.clone());

    let reg_store: Arc<InMemorySocietyStore<RegistrationId, RegistrationReadModel>> =
        Arc::new(InMemorySocietyStore::new());
    let registrations = Arc::new(RegistrationsProjection::new(reg_store));
    let sess_store: Arc<InMemorySocietyStore<SessionId, SessionReadModel>> =
        Arc::new(InMemorySocietyStore::new());
    let sessions = Arc::new(SessionsProjection::new(sess_store));

    // Feed the projections from the bus. Subscribe before any dispatch so no
    // early event is missed.
    let registrations_clone = registrations.clone();
    let sessions_clone = sessions.clone();
    let bus_clone = bus.clone();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        let sub = bus_clone.subscribe();
        let _ = ready_tx.send(());
        while let Ok(env) = sub.recv() {
            if let Err(e) = registrations_clone.apply_envelope(&env) {
                tracing::error!(error = ?e, "registrations projection failed to apply envelope");
            }
            if let Err(e) = sessions_clone.apply_envelope(&env) {
                tracing::error!(error = ?e, "sessions projection failed to apply envelope");
            }
        }
    });
    let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

    AppServices {
        dispatcher,
        registrations,
        sessions,
        periods: PeriodCatalog::new(),
        labels: RwLock::new(HashMap::new()),
        verifier: Arc::new(StaticDirectoryVerifier::new()),
        payment_sessions: PaymentSessionManager::new(),
        payment_config,
    }
}

impl AppServices {
    pub fn dispatch_registration(
        &self,
        society_id: SocietyId,
        registration_id: RegistrationId,
        command: RegistrationCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Registration>(
            society_id,
            registration_id.0,
            "registration",
            command,
            |_s, id| Registration::empty(RegistrationId::new(id)),
        )
    }

    pub fn dispatch_session(
        &self,
        society_id: SocietyId,
        session_id: SessionId,
        command: SessionCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Session>(
            society_id,
            session_id.0,
            "identity.session",
            command,
            |_s, id| Session::empty(SessionId::new(id)),
        )
    }

    pub fn registrations(&self) -> &RegProjection {
        &self.registrations
    }

    pub fn sessions(&self) -> &SessProjection {
        &self.sessions
    }

    pub fn periods(&self) -> &PeriodCatalog {
        &self.periods
    }

    pub fn verifier(&self) -> &dyn MemberVerifier {
        self.verifier.as_ref()
    }

    pub fn payment_sessions(&self) -> &PaymentSessionManager {
        &self.payment_sessions
    }

    pub fn payment_config(&self) -> &PaymentConfig {
        &self.payment_config
    }

    pub fn labels(&self, society_id: SocietyId) -> GradeLabels {
        self.labels
            .read()
            .ok()
            .and_then(|map| map.get(&society_id).cloned())
            .unwrap_or_default()
    }

    pub fn set_labels(&self, society_id: SocietyId, labels: GradeLabels) {
        if let Ok(mut map) = self.labels.write() {
            map.insert(society_id, labels);
        }
    }

    /// The period active now for a society, if any.
    pub fn active_period(
        &self,
        society_id: SocietyId,
        now: DateTime<Utc>,
    ) -> Option<RegistrationPeriod> {
        self.periods.active(society_id, now)
    }

    /// Enumerate grades for the active period with resolved display names.
    pub fn active_grades(&self, society_id: SocietyId, now: DateTime<Utc>) -> Vec<Grade> {
        match self.active_period(society_id, now) {
            Some(period) => Grade::enumerate(&period, &self.labels(society_id)),
            None => vec![],
        }
    }

    /// Find a grade in the active period by key and resolve its price.
    ///
    /// The key matches the grade's canonical id, raw code, or display name,
    /// case-insensitively. The resolved price may legitimately be missing.
    pub fn resolve_grade(
        &self,
        society_id: SocietyId,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<(Grade, PriceResolution), DomainError> {
        let period = self
            .active_period(society_id, now)
            .ok_or_else(|| DomainError::validation("no registration period is active"))?;
        let grades = Grade::enumerate(&period, &self.labels(society_id));

        let wanted = key.trim().to_lowercase();
        let grade = grades
            .iter()
            .find(|g| g.id.to_lowercase() == wanted)
            .or_else(|| grades.iter().find(|g| g.code.to_lowercase() == wanted))
            .or_else(|| grades.iter().find(|g| g.name.to_lowercase() == wanted))
            .cloned()
            .ok_or_else(|| DomainError::validation(format!("unknown grade '{key}'")))?;

        let resolution = resolve_price(&period, &grade);
        Ok((grade, resolution))
    }

    /// Seed a member record in the dev verifier directory.
    pub fn seed_member(&self, society_id: SocietyId, member: confreg_membership::VerifiedMember) {
        self.verifier.insert(society_id, member);
    }
}

/// New registration aggregate id.
pub fn new_registration_id() -> RegistrationId {
    RegistrationId::new(AggregateId::new())
}

/// New session aggregate id.
pub fn new_session_id() -> SessionId {
    SessionId::new(AggregateId::new())
}
