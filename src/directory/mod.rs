use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::security::access;
use crate::shared::error::ApiError;
use crate::shared::schema::users;
use crate::shared::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ViewCustomers,
    ManageCustomers,
    ReassignCustomers,
    DeleteCustomers,
    ViewCalls,
    ManageCalls,
    ViewTickets,
    ManageTickets,
    DeleteTickets,
    ViewCampaigns,
    ManageCampaigns,
    ViewReports,
    ViewSecurityLogs,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    Agent,
    Supervisor,
    Admin,
}

impl Role {
    /// Capability set per role, evaluated once per check instead of scattered
    /// per-handler role comparisons. Each tier is a superset of the previous.
    pub fn capabilities(&self) -> HashSet<Capability> {
        match self {
            Self::Agent => {
                let mut caps = HashSet::new();
                caps.insert(Capability::ViewCustomers);
                caps.insert(Capability::ManageCustomers);
                caps.insert(Capability::ViewCalls);
                caps.insert(Capability::ManageCalls);
                caps.insert(Capability::ViewTickets);
                caps.insert(Capability::ManageTickets);
                caps.insert(Capability::ViewCampaigns);
                caps
            }
            Self::Supervisor => {
                let mut caps = Self::Agent.capabilities();
                caps.insert(Capability::ReassignCustomers);
                caps.insert(Capability::DeleteTickets);
                caps.insert(Capability::ManageCampaigns);
                caps.insert(Capability::ViewReports);
                caps
            }
            Self::Admin => {
                let mut caps = Self::Supervisor.capabilities();
                caps.insert(Capability::DeleteCustomers);
                caps.insert(Capability::ViewSecurityLogs);
                caps.insert(Capability::ManageUsers);
                caps
            }
        }
    }

    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities().contains(capability)
    }

    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Self::Agent => 1,
            Self::Supervisor => 2,
            Self::Admin => 3,
        }
    }

    pub fn is_at_least(&self, other: &Role) -> bool {
        self.hierarchy_level() >= other.hierarchy_level()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Supervisor => "Supervisor",
            Self::Admin => "Admin",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "supervisor" => Ok(Self::Supervisor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Authenticated actor attached to a request by the authentication
/// middleware. Immutable for the lifetime of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(id: Uuid, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            is_superuser: false,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    /// Superusers satisfy every role check.
    pub fn satisfies(&self, required: Role) -> bool {
        self.is_superuser || self.role.is_at_least(&required)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.is_superuser || self.role.has_capability(&capability)
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub department: Option<String>,
    pub phone_extension: Option<String>,
    pub supervisor_id: Option<Uuid>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Result<Principal, UnknownRole> {
        let role: Role = self.role.parse()?;
        let principal = Principal::new(self.id, self.username.clone(), role);
        Ok(if self.is_superuser {
            principal.superuser()
        } else {
            principal
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub department: Option<String>,
    pub phone_extension: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            department: user.department,
            phone_extension: user.phone_extension,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub department: Option<String>,
    pub phone_extension: Option<String>,
    pub supervisor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    access::require_manage_users(&principal)?;

    let mut conn = state.conn.get()?;

    let mut q = users::table.into_boxed();
    if let Some(role) = query.role {
        q = q.filter(users::role.eq(role));
    }

    let rows: Vec<User> = q.order(users::username.asc()).load(&mut conn)?;

    Ok(Json(rows.into_iter().map(UserProfile::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    access::require_manage_users(&principal)?;

    let role: Role = req
        .role
        .parse()
        .map_err(|e: UnknownRole| ApiError::validation(e.to_string()))?;

    if req.username.trim().is_empty() {
        return Err(ApiError::validation("username must not be empty"));
    }

    let password_hash = hash_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        username: req.username,
        email: req.email,
        password_hash,
        role: role.as_str().to_string(),
        department: req.department,
        phone_extension: req.phone_extension,
        supervisor_id: req.supervisor_id,
        is_superuser: false,
        is_active: true,
        created_at: Utc::now(),
    };

    let mut conn = state.conn.get()?;
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::Conflict("username already taken".to_string()),
            other => ApiError::Database(other),
        })?;

    Ok(Json(user.into()))
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<UserProfile>, ApiError> {
    let mut conn = state.conn.get()?;

    let user: User = users::table
        .filter(users::id.eq(principal.id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.into()))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    use argon2::Argon2;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/me", get(current_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_sets_are_nested() {
        let agent = Role::Agent.capabilities();
        let supervisor = Role::Supervisor.capabilities();
        let admin = Role::Admin.capabilities();

        assert!(agent.is_subset(&supervisor));
        assert!(supervisor.is_subset(&admin));
    }

    #[test]
    fn test_agent_cannot_delete_or_manage_campaigns() {
        assert!(!Role::Agent.has_capability(&Capability::DeleteCustomers));
        assert!(!Role::Agent.has_capability(&Capability::DeleteTickets));
        assert!(!Role::Agent.has_capability(&Capability::ManageCampaigns));
        assert!(Role::Agent.has_capability(&Capability::ManageTickets));
    }

    #[test]
    fn test_hierarchy_ordering() {
        assert!(Role::Admin.is_at_least(&Role::Supervisor));
        assert!(Role::Supervisor.is_at_least(&Role::Agent));
        assert!(!Role::Agent.is_at_least(&Role::Supervisor));
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Agent, Role::Supervisor, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Manager".parse::<Role>().is_err());
    }

    #[test]
    fn test_superuser_satisfies_every_check() {
        let principal = Principal::new(Uuid::new_v4(), "root", Role::Agent).superuser();

        assert!(principal.satisfies(Role::Admin));
        assert!(principal.has_capability(Capability::DeleteCustomers));
        assert!(principal.has_capability(Capability::ViewSecurityLogs));
    }

    #[test]
    fn test_plain_agent_does_not_satisfy_admin() {
        let principal = Principal::new(Uuid::new_v4(), "jane", Role::Agent);

        assert!(!principal.satisfies(Role::Admin));
        assert!(!principal.has_capability(Capability::ManageUsers));
    }

    #[test]
    fn test_user_principal_parses_stored_role() {
        let user = User {
            id: Uuid::new_v4(),
            username: "sup1".to_string(),
            email: "sup1@example.com".to_string(),
            password_hash: String::new(),
            role: "Supervisor".to_string(),
            department: None,
            phone_extension: None,
            supervisor_id: None,
            is_superuser: false,
            is_active: true,
            created_at: Utc::now(),
        };

        let principal = user.principal().unwrap();
        assert_eq!(principal.role, Role::Supervisor);
        assert!(!principal.is_superuser);
    }
}
