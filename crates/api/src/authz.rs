//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use confreg_identity::{
    AuthzError, CommandAuthorization, Permission, Principal, SocietyMembership, authorize,
};

use crate::context::{PrincipalContext, SocietyContext};

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    society: &SocietyContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = SocietyMembership {
        society_id: society.society_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_society_id: society.society_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Minimal role→permission mapping stub.
///
/// Attendees can drive their own registration; society admins can do
/// everything. A real policy source can replace this later.
fn permissions_from_roles(roles: &[confreg_identity::Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }
    if roles.iter().any(|r| r.as_str() == "attendee") {
        return vec![
            Permission::new("registrations.write"),
            Permission::new("sessions.write"),
            Permission::new("periods.read"),
        ];
    }

    Vec::new()
}
