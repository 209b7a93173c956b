//! Role- and ownership-scoped authorization, evaluated per operation.
//!
//! Denials are authorization failures (403), deliberately distinct from
//! not-found, so a caller can tell a record it may not touch from a record
//! that does not exist.

use uuid::Uuid;

use crate::directory::{Capability, Principal, Role};
use crate::shared::error::ApiError;

/// How much of the customer base a principal may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerVisibility {
    All,
    AssignedTo(Uuid),
}

/// Admin and Supervisor see every customer; an Agent only the customers
/// assigned to them.
pub fn customer_visibility(principal: &Principal) -> CustomerVisibility {
    if principal.satisfies(Role::Supervisor) {
        CustomerVisibility::All
    } else {
        CustomerVisibility::AssignedTo(principal.id)
    }
}

pub fn can_view_customer(principal: &Principal, assigned_agent_id: Option<Uuid>) -> bool {
    match customer_visibility(principal) {
        CustomerVisibility::All => true,
        CustomerVisibility::AssignedTo(agent_id) => assigned_agent_id == Some(agent_id),
    }
}

pub fn require_view_customer(
    principal: &Principal,
    assigned_agent_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if can_view_customer(principal, assigned_agent_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Customer is assigned to another agent"))
    }
}

pub fn require_reassign_customer(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::ReassignCustomers) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only supervisors and admins may reassign customers",
        ))
    }
}

pub fn require_delete_customer(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::DeleteCustomers) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins may delete customers"))
    }
}

/// Ticket detail reads and updates are limited to supervisors, admins, and
/// the ticket's own assigned agent.
pub fn can_access_ticket_detail(principal: &Principal, ticket_agent_id: Option<Uuid>) -> bool {
    principal.satisfies(Role::Supervisor) || ticket_agent_id == Some(principal.id)
}

pub fn require_ticket_detail(
    principal: &Principal,
    ticket_agent_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if can_access_ticket_detail(principal, ticket_agent_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Ticket is assigned to another agent"))
    }
}

/// Reassigning a ticket is a supervisor action even for the current assignee.
pub fn require_reassign_ticket(principal: &Principal) -> Result<(), ApiError> {
    if principal.satisfies(Role::Supervisor) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only supervisors and admins may reassign tickets",
        ))
    }
}

pub fn require_delete_ticket(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::DeleteTickets) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only supervisors and admins may delete tickets",
        ))
    }
}

pub fn require_manage_campaigns(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::ManageCampaigns) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only supervisors and admins may modify campaigns",
        ))
    }
}

pub fn require_view_reports(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::ViewReports) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only supervisors and admins may view reports",
        ))
    }
}

pub fn require_view_security_logs(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::ViewSecurityLogs) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins may view security logs"))
    }
}

pub fn require_manage_users(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_capability(Capability::ManageUsers) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins may manage users"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: Uuid) -> Principal {
        Principal::new(id, "agent", Role::Agent)
    }

    fn supervisor() -> Principal {
        Principal::new(Uuid::new_v4(), "sup", Role::Supervisor)
    }

    fn admin() -> Principal {
        Principal::new(Uuid::new_v4(), "admin", Role::Admin)
    }

    #[test]
    fn test_agent_sees_only_own_customers() {
        let id = Uuid::new_v4();
        let principal = agent(id);

        assert_eq!(
            customer_visibility(&principal),
            CustomerVisibility::AssignedTo(id)
        );
        assert!(can_view_customer(&principal, Some(id)));
        assert!(!can_view_customer(&principal, Some(Uuid::new_v4())));
        assert!(!can_view_customer(&principal, None));
    }

    #[test]
    fn test_supervisor_sees_all_customers() {
        assert_eq!(customer_visibility(&supervisor()), CustomerVisibility::All);
        assert!(can_view_customer(&supervisor(), None));
    }

    #[test]
    fn test_customer_delete_is_admin_only() {
        assert!(require_delete_customer(&admin()).is_ok());
        assert!(require_delete_customer(&supervisor()).is_err());
        assert!(require_delete_customer(&agent(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_ticket_detail_requires_assignee_or_supervisor() {
        let assignee = Uuid::new_v4();

        assert!(require_ticket_detail(&agent(assignee), Some(assignee)).is_ok());
        assert!(require_ticket_detail(&agent(Uuid::new_v4()), Some(assignee)).is_err());
        assert!(require_ticket_detail(&supervisor(), Some(assignee)).is_ok());
        assert!(require_ticket_detail(&admin(), None).is_ok());
        assert!(require_ticket_detail(&agent(Uuid::new_v4()), None).is_err());
    }

    #[test]
    fn test_ticket_delete_requires_supervisor() {
        assert!(require_delete_ticket(&supervisor()).is_ok());
        assert!(require_delete_ticket(&agent(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_campaign_mutation_requires_supervisor() {
        assert!(require_manage_campaigns(&supervisor()).is_ok());
        assert!(require_manage_campaigns(&agent(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_security_logs_admin_only() {
        assert!(require_view_security_logs(&admin()).is_ok());
        assert!(require_view_security_logs(&supervisor()).is_err());
    }

    #[test]
    fn test_superuser_overrides_every_gate() {
        let root = agent(Uuid::new_v4()).superuser();

        assert_eq!(customer_visibility(&root), CustomerVisibility::All);
        assert!(require_delete_customer(&root).is_ok());
        assert!(require_ticket_detail(&root, None).is_ok());
        assert!(require_view_security_logs(&root).is_ok());
    }
}
