//! Integration tests for the full event-sourced pipeline.
//!
//! Command → EventStore → EventBus → Projection → ReadModel, verifying that
//! wizard commands land in the read model, that society isolation holds, and
//! that optimistic concurrency conflicts are detected.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::sync::Arc;

    use confreg_core::{AggregateId, AttendeeId, ConferenceId, SocietyId};
    use confreg_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use confreg_identity::{
        BeginUpgrade, CompleteUpgrade, Session, SessionCommand, SessionId, SessionState,
        StartAnonymousSession,
    };
    use confreg_registration::{
        AcceptTerms, Agreements, AttendeeInfo, BeginPayment, ConfirmPayment, GradeChoice,
        Registration, RegistrationCommand, RegistrationId, RegistrationStatus, SelectGrade,
        StartRegistration, SubmitAttendeeInfo, WizardStep,
    };

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::InMemoryEventStore;
    use crate::projections::registrations::{RegistrationReadModel, RegistrationsProjection};
    use crate::projections::sessions::{SessionReadModel, SessionsProjection};
    use crate::read_model::InMemorySocietyStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
    type RegProjection =
        Arc<RegistrationsProjection<Arc<InMemorySocietyStore<RegistrationId, RegistrationReadModel>>>>;
    type SessProjection =
        Arc<SessionsProjection<Arc<InMemorySocietyStore<SessionId, SessionReadModel>>>>;

    fn setup() -> (
        CommandDispatcher<InMemoryEventStore, Bus>,
        RegProjection,
        SessProjection,
    ) {
        let store = InMemoryEventStore::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store, bus.clone());

        let reg_store: Arc<InMemorySocietyStore<RegistrationId, RegistrationReadModel>> =
            Arc::new(InMemorySocietyStore::new());
        let registrations = Arc::new(RegistrationsProjection::new(reg_store));
        let sess_store: Arc<InMemorySocietyStore<SessionId, SessionReadModel>> =
            Arc::new(InMemorySocietyStore::new());
        let sessions = Arc::new(SessionsProjection::new(sess_store));

        // Subscribe to the bus BEFORE any events are published.
        let registrations_clone = registrations.clone();
        let sessions_clone = sessions.clone();
        let bus_clone = bus.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let sub = bus_clone.subscribe();
            let _ = ready_tx.send(());
            loop {
                match sub.recv() {
                    Ok(env) => {
                        if let Err(e) = registrations_clone.apply_envelope(&env) {
                            eprintln!("failed to apply registration envelope: {e:?}");
                        }
                        if let Err(e) = sessions_clone.apply_envelope(&env) {
                            eprintln!("failed to apply session envelope: {e:?}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        // Ensure the subscriber is ready before returning.
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

        (dispatcher, registrations, sessions)
    }

    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn all_agreements() -> Agreements {
        Agreements {
            terms_of_service: true,
            privacy_policy: true,
            third_party_sharing: true,
        }
    }

    fn attendee_info() -> AttendeeInfo {
        AttendeeInfo {
            name: "Kim Minji".to_string(),
            email: "minji@example.com".to_string(),
            phone: "010-1234-5678".to_string(),
            affiliation: "Seoul Dental Clinic".to_string(),
            license_number: "D-4821".to_string(),
        }
    }

    fn dispatch_registration(
        dispatcher: &CommandDispatcher<InMemoryEventStore, Bus>,
        society_id: SocietyId,
        registration_id: RegistrationId,
        command: RegistrationCommand,
    ) -> Result<(), DispatchError> {
        dispatcher
            .dispatch::<Registration>(
                society_id,
                registration_id.0,
                "registration",
                command,
                |_, id| Registration::empty(RegistrationId::new(id)),
            )
            .map(|_| ())
    }

    #[test]
    fn wizard_walkthrough_updates_the_read_model() {
        let (dispatcher, registrations, _) = setup();
        let society_id = SocietyId::new();
        let registration_id = RegistrationId::new(AggregateId::new());
        let attendee_id = AttendeeId::new();

        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::Start(StartRegistration {
                society_id,
                registration_id,
                conference_id: ConferenceId::new(),
                attendee_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::AcceptTerms(AcceptTerms {
                society_id,
                registration_id,
                agreements: all_agreements(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::SubmitAttendeeInfo(SubmitAttendeeInfo {
                society_id,
                registration_id,
                attendee: attendee_info(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::SelectGrade(SelectGrade {
                society_id,
                registration_id,
                choice: GradeChoice {
                    grade_id: "member".to_string(),
                    grade_code: "Member".to_string(),
                    amount: Some(100_000),
                    fallback: false,
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        wait_for_processing();

        // The draft is resumable with step, agreements, and info intact.
        let draft = registrations.draft_for(society_id, attendee_id).unwrap();
        assert_eq!(draft.step, WizardStep::Payment);
        assert!(draft.agreements.all_accepted());
        assert_eq!(draft.attendee.as_ref().unwrap().name, "Kim Minji");

        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::BeginPayment(BeginPayment {
                society_id,
                registration_id,
                order_id: "ord-1".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        dispatch_registration(
            &dispatcher,
            society_id,
            registration_id,
            RegistrationCommand::ConfirmPayment(ConfirmPayment {
                society_id,
                registration_id,
                order_id: "ord-1".to_string(),
                amount: 100_000,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        wait_for_processing();

        let rm = registrations.get(society_id, &registration_id).unwrap();
        assert_eq!(rm.step, WizardStep::Complete);
        assert_eq!(rm.status, RegistrationStatus::Confirmed);
        // A completed registration is no longer a resumable draft.
        assert!(registrations.draft_for(society_id, attendee_id).is_none());
    }

    #[test]
    fn societies_do_not_see_each_others_registrations() {
        let (dispatcher, registrations, _) = setup();
        let society_a = SocietyId::new();
        let society_b = SocietyId::new();
        let registration_id = RegistrationId::new(AggregateId::new());

        dispatch_registration(
            &dispatcher,
            society_a,
            registration_id,
            RegistrationCommand::Start(StartRegistration {
                society_id: society_a,
                registration_id,
                conference_id: ConferenceId::new(),
                attendee_id: AttendeeId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        wait_for_processing();

        assert!(registrations.get(society_a, &registration_id).is_some());
        assert!(registrations.get(society_b, &registration_id).is_none());
        assert!(registrations.list(society_b).is_empty());
    }

    #[test]
    fn replayed_start_command_is_a_concurrency_conflict() {
        let (dispatcher, _, _) = setup();
        let society_id = SocietyId::new();
        let registration_id = RegistrationId::new(AggregateId::new());

        let start = RegistrationCommand::Start(StartRegistration {
            society_id,
            registration_id,
            conference_id: ConferenceId::new(),
            attendee_id: AttendeeId::new(),
            occurred_at: Utc::now(),
        });

        dispatch_registration(&dispatcher, society_id, registration_id, start.clone()).unwrap();
        let err =
            dispatch_registration(&dispatcher, society_id, registration_id, start).unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn session_upgrade_reaches_the_directory() {
        let (dispatcher, _, sessions) = setup();
        let society_id = SocietyId::new();
        let session_id = SessionId::new(AggregateId::new());

        let dispatch = |cmd: SessionCommand| {
            dispatcher.dispatch::<Session>(
                society_id,
                session_id.0,
                "identity.session",
                cmd,
                |_, id| Session::empty(SessionId::new(id)),
            )
        };

        dispatch(SessionCommand::StartAnonymous(StartAnonymousSession {
            society_id,
            session_id,
            attendee_id: AttendeeId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        dispatch(SessionCommand::BeginUpgrade(BeginUpgrade {
            society_id,
            session_id,
            email: "guest@example.com".to_string(),
            password: "abc123".to_string(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        dispatch(SessionCommand::CompleteUpgrade(CompleteUpgrade {
            society_id,
            session_id,
            occurred_at: Utc::now(),
        }))
        .unwrap();

        wait_for_processing();

        let rm = sessions.get(society_id, &session_id).unwrap();
        assert_eq!(rm.state, SessionState::Authenticated);
        assert!(sessions.email_in_use(society_id, "GUEST@example.com"));
        assert!(!sessions.email_in_use(society_id, "other@example.com"));
    }
}
