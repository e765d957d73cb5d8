use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use confreg_core::{AggregateId, AttendeeId, ConferenceId, SocietyId};
use confreg_events::EventEnvelope;
use confreg_registration::{
    Agreements, AttendeeInfo, GradeChoice, PaymentStatus, RegistrationEvent, RegistrationId,
    RegistrationStatus, WizardStep,
};

use crate::read_model::SocietyStore;

/// Query-optimized view of one registration, including everything the wizard
/// needs to resume a draft (step, agreements, attendee info, grade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReadModel {
    pub registration_id: RegistrationId,
    pub conference_id: ConferenceId,
    pub attendee_id: AttendeeId,
    pub step: WizardStep,
    pub status: RegistrationStatus,
    pub payment_status: PaymentStatus,
    pub agreements: Agreements,
    pub attendee: Option<AttendeeInfo>,
    pub grade: Option<GradeChoice>,
    pub order_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    society_id: SocietyId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum RegistrationProjectionError {
    #[error("failed to deserialize registration event: {0}")]
    Deserialize(String),
    #[error("society isolation violation: {0}")]
    SocietyIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Registrations read model builder.
///
/// Idempotent under at-least-once delivery: per-stream cursors skip
/// already-applied sequence numbers.
#[derive(Debug)]
pub struct RegistrationsProjection<S>
where
    S: SocietyStore<RegistrationId, RegistrationReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> RegistrationsProjection<S>
where
    S: SocietyStore<RegistrationId, RegistrationReadModel>,
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

    pub fn get(
        &self,
        society_id: SocietyId,
        registration_id: &RegistrationId,
    ) -> Option<RegistrationReadModel> {
        self.store.get(society_id, registration_id)
    }

    pub fn list(&self, society_id: SocietyId) -> Vec<RegistrationReadModel> {
        self.store.list(society_id)
    }

    /// The attendee's resumable draft: pending, not complete, most recently
    /// updated first.
    pub fn draft_for(
        &self,
        society_id: SocietyId,
        attendee_id: AttendeeId,
    ) -> Option<RegistrationReadModel> {
        self.store
            .list(society_id)
            .into_iter()
            .filter(|rm| {
                rm.attendee_id == attendee_id
                    && rm.status == RegistrationStatus::Pending
                    && rm.step != WizardStep::Complete
            })
            .max_by_key(|rm| rm.updated_at)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), RegistrationProjectionError> {
        if envelope.aggregate_type() != "registration" {
            return Ok(());
        }

        let society_id = envelope.society_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(society_id, aggregate_id);
        if seq == 0 {
            return Err(RegistrationProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(RegistrationProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: RegistrationEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| RegistrationProjectionError::Deserialize(e.to_string()))?;

        let (event_society, registration_id) = match &ev {
            RegistrationEvent::Started(e) => (e.society_id, e.registration_id),
            RegistrationEvent::TermsAccepted(e) => (e.society_id, e.registration_id),
            RegistrationEvent::AttendeeInfoSubmitted(e) => (e.society_id, e.registration_id),
            RegistrationEvent::GradeSelected(e) => (e.society_id, e.registration_id),
            RegistrationEvent::MemberVerificationRecorded(e) => (e.society_id, e.registration_id),
            RegistrationEvent::SteppedBack(e) => (e.society_id, e.registration_id),
            RegistrationEvent::PaymentStarted(e) => (e.society_id, e.registration_id),
            RegistrationEvent::PaymentConfirmed(e) => (e.society_id, e.registration_id),
            RegistrationEvent::PaymentFailed(e) => (e.society_id, e.registration_id),
            RegistrationEvent::Cancelled(e) => (e.society_id, e.registration_id),
        };

        if event_society != society_id {
            return Err(RegistrationProjectionError::SocietyIsolation(
                "event society_id does not match envelope society_id".to_string(),
            ));
        }
        if registration_id.0 != aggregate_id {
            return Err(RegistrationProjectionError::SocietyIsolation(
                "event registration_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            RegistrationEvent::Started(e) => {
                self.store.upsert(
                    society_id,
                    e.registration_id,
                    RegistrationReadModel {
                        registration_id: e.registration_id,
                        conference_id: e.conference_id,
                        attendee_id: e.attendee_id,
                        step: WizardStep::Terms,
                        status: RegistrationStatus::Pending,
                        payment_status: PaymentStatus::Unpaid,
                        agreements: Agreements::default(),
                        attendee: None,
                        grade: None,
                        order_id: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            RegistrationEvent::TermsAccepted(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.agreements = e.agreements;
                    rm.step = WizardStep::Info;
                });
            }
            RegistrationEvent::AttendeeInfoSubmitted(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.attendee = Some(e.attendee.clone());
                    rm.step = WizardStep::Verification;
                });
            }
            RegistrationEvent::GradeSelected(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.grade = Some(e.choice.clone());
                    rm.step = WizardStep::Payment;
                });
            }
            RegistrationEvent::MemberVerificationRecorded(e) => {
                // Audit detail lives on the aggregate; only freshen the view.
                self.mutate(society_id, registration_id, e.occurred_at, |_| {});
            }
            RegistrationEvent::SteppedBack(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.step = e.to;
                });
            }
            RegistrationEvent::PaymentStarted(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.order_id = Some(e.order_id.clone());
                    rm.payment_status = PaymentStatus::PendingPayment;
                });
            }
            RegistrationEvent::PaymentConfirmed(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.payment_status = PaymentStatus::Paid;
                    rm.status = RegistrationStatus::Confirmed;
                    rm.step = WizardStep::Complete;
                });
            }
            RegistrationEvent::PaymentFailed(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.payment_status = PaymentStatus::Unpaid;
                });
            }
            RegistrationEvent::Cancelled(e) => {
                self.mutate(society_id, registration_id, e.occurred_at, |rm| {
                    rm.status = RegistrationStatus::Cancelled;
                });
            }
        }

        self.update_cursor(society_id, aggregate_id, seq);
        Ok(())
    }

    fn mutate(
        &self,
        society_id: SocietyId,
        registration_id: RegistrationId,
        occurred_at: DateTime<Utc>,
        f: impl FnOnce(&mut RegistrationReadModel),
    ) {
        if let Some(mut rm) = self.store.get(society_id, &registration_id) {
            f(&mut rm);
            rm.updated_at = occurred_at;
            self.store.upsert(society_id, registration_id, rm);
        }
    }
}
