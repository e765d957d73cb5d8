use confreg_core::SocietyId;
use confreg_identity::{PrincipalId, Role};

/// Society context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SocietyContext {
    society_id: SocietyId,
}

impl SocietyContext {
    pub fn new(society_id: SocietyId) -> Self {
        Self { society_id }
    }

    pub fn society_id(&self) -> SocietyId {
        self.society_id
    }
}

/// Principal context for a request (authenticated identity + roles).
///
/// `anonymous` marks a guest session token: the attendee has a valid JWT but
/// has not completed the account upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
    anonymous: bool,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>, anonymous: bool) -> Self {
        Self {
            principal_id,
            roles,
            anonymous,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}
