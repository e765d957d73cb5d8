//! Payment session bookkeeping.
//!
//! A session is initialized at most once per entry into the payment step and
//! is bound to (provider client key, registration, amount). Re-entering the
//! step reuses the live session; it is torn down and re-initialized only when
//! the provider key or the amount changed.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use confreg_core::AggregateId;

use crate::error::PaymentError;

/// A live provider session for one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub client_key: String,
    pub registration_id: AggregateId,
    /// Amount in minor units the session was opened for.
    pub amount: u64,
    /// Set once the provider reports its payment methods as loaded.
    pub methods_ready: bool,
}

/// How `ensure_session` satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInit {
    /// No live session existed; a new one was opened.
    Initialized,
    /// A live session matched the key and amount and was kept.
    Reused,
    /// A live session existed but the key or amount changed; it was torn
    /// down and replaced.
    Reinitialized,
}

/// Tracks live payment sessions, keyed by registration.
#[derive(Debug, Default)]
pub struct PaymentSessionManager {
    sessions: RwLock<HashMap<AggregateId, PaymentSession>>,
}

impl PaymentSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize or reuse the session for a registration.
    pub fn ensure_session(
        &self,
        client_key: &str,
        registration_id: AggregateId,
        amount: u64,
    ) -> Result<SessionInit, PaymentError> {
        if client_key.trim().is_empty() {
            return Err(PaymentError::ProviderMisconfigured(
                "client key is not set".to_string(),
            ));
        }

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PaymentError::ProviderMisconfigured("session state poisoned".to_string()))?;

        let init = match sessions.get(&registration_id) {
            Some(live) if live.client_key == client_key && live.amount == amount => {
                return Ok(SessionInit::Reused);
            }
            Some(_) => SessionInit::Reinitialized,
            None => SessionInit::Initialized,
        };

        tracing::debug!(%registration_id, amount, ?init, "opening payment session");
        sessions.insert(
            registration_id,
            PaymentSession {
                client_key: client_key.to_string(),
                registration_id,
                amount,
                methods_ready: false,
            },
        );
        Ok(init)
    }

    /// Record that the provider finished loading its payment methods.
    pub fn mark_methods_ready(&self, registration_id: AggregateId) -> Result<(), PaymentError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PaymentError::ProviderMisconfigured("session state poisoned".to_string()))?;
        match sessions.get_mut(&registration_id) {
            Some(session) => {
                session.methods_ready = true;
                Ok(())
            }
            None => Err(PaymentError::SessionNotInitialized),
        }
    }

    /// The live session for a registration, if any.
    pub fn session(&self, registration_id: AggregateId) -> Option<PaymentSession> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(&registration_id).cloned())
    }

    /// The live, methods-ready session, as required before checkout.
    pub fn checkout_session(
        &self,
        registration_id: AggregateId,
    ) -> Result<PaymentSession, PaymentError> {
        let session = self
            .session(registration_id)
            .ok_or(PaymentError::SessionNotInitialized)?;
        if !session.methods_ready {
            return Err(PaymentError::MethodsNotReady);
        }
        Ok(session)
    }

    /// Tear down the session for a registration, if any.
    pub fn teardown(&self, registration_id: AggregateId) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(&registration_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_initializes() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();
        assert_eq!(
            mgr.ensure_session("ck_test", reg, 100_000).unwrap(),
            SessionInit::Initialized
        );
    }

    #[test]
    fn re_entry_with_same_binding_reuses() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();
        mgr.ensure_session("ck_test", reg, 100_000).unwrap();
        mgr.mark_methods_ready(reg).unwrap();

        assert_eq!(
            mgr.ensure_session("ck_test", reg, 100_000).unwrap(),
            SessionInit::Reused
        );
        // Reuse keeps the ready flag.
        assert!(mgr.session(reg).unwrap().methods_ready);
    }

    #[test]
    fn amount_change_reinitializes() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();
        mgr.ensure_session("ck_test", reg, 100_000).unwrap();
        mgr.mark_methods_ready(reg).unwrap();

        assert_eq!(
            mgr.ensure_session("ck_test", reg, 80_000).unwrap(),
            SessionInit::Reinitialized
        );
        // Re-init resets readiness; methods must load again.
        assert!(!mgr.session(reg).unwrap().methods_ready);
    }

    #[test]
    fn key_change_reinitializes() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();
        mgr.ensure_session("ck_old", reg, 100_000).unwrap();
        assert_eq!(
            mgr.ensure_session("ck_new", reg, 100_000).unwrap(),
            SessionInit::Reinitialized
        );
    }

    #[test]
    fn blank_key_is_misconfiguration() {
        let mgr = PaymentSessionManager::new();
        let err = mgr
            .ensure_session("  ", AggregateId::new(), 100_000)
            .unwrap_err();
        assert!(matches!(err, PaymentError::ProviderMisconfigured(_)));
    }

    #[test]
    fn checkout_requires_initialized_and_ready() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();

        assert_eq!(
            mgr.checkout_session(reg).unwrap_err(),
            PaymentError::SessionNotInitialized
        );

        mgr.ensure_session("ck_test", reg, 100_000).unwrap();
        assert_eq!(
            mgr.checkout_session(reg).unwrap_err(),
            PaymentError::MethodsNotReady
        );

        mgr.mark_methods_ready(reg).unwrap();
        assert_eq!(mgr.checkout_session(reg).unwrap().amount, 100_000);
    }

    #[test]
    fn teardown_removes_the_session() {
        let mgr = PaymentSessionManager::new();
        let reg = AggregateId::new();
        mgr.ensure_session("ck_test", reg, 100_000).unwrap();
        mgr.teardown(reg);
        assert!(mgr.session(reg).is_none());
    }
}
