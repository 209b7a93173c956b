use diesel::prelude::*;
use diesel::PgConnection;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::{Customer, UNKNOWN_PHONE};
use crate::directory::Role;
use crate::shared::error::ApiError;
use crate::shared::schema::{customers, users};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("duplicate customer key: {0}")]
    DuplicateKey(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(inner) => ApiError::Database(inner),
            StoreError::DuplicateKey(key) => {
                ApiError::Conflict(format!("duplicate customer key: {key}"))
            }
        }
    }
}

/// Customer persistence seam used by the identity resolver and the agent
/// assignment engine. The production implementation wraps a live diesel
/// connection so a webhook admission can run resolve + assign + record
/// creation inside one transaction; the in-memory implementation backs the
/// engine tests.
pub trait CustomerStore {
    fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, StoreError>;
    fn find_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError>;
    /// Atomic insert: returns `None` when another writer holds one of the
    /// unique identifying keys, without surfacing an error.
    fn try_insert(&mut self, customer: &Customer) -> Result<Option<Customer>, StoreError>;
    fn update_full_name(&mut self, id: Uuid, full_name: &str) -> Result<(), StoreError>;
    fn set_assigned_agent(&mut self, id: Uuid, agent_id: Uuid) -> Result<(), StoreError>;
    /// Active users with role exactly Agent, ordered by id ascending.
    fn agent_pool(&mut self) -> Result<Vec<Uuid>, StoreError>;
    /// Current number of assigned customers per agent. Agents with no
    /// customers are simply absent.
    fn assignment_counts(&mut self) -> Result<HashMap<Uuid, i64>, StoreError>;
}

pub struct PgCustomerStore<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgCustomerStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

impl CustomerStore for PgCustomerStore<'_> {
    fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(customers::table
            .filter(customers::email.eq(email))
            .first(&mut *self.conn)
            .optional()?)
    }

    fn find_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError> {
        Ok(customers::table
            .filter(customers::phone_number.eq(phone))
            .first(&mut *self.conn)
            .optional()?)
    }

    fn try_insert(&mut self, customer: &Customer) -> Result<Option<Customer>, StoreError> {
        Ok(diesel::insert_into(customers::table)
            .values(customer)
            .on_conflict_do_nothing()
            .get_result(&mut *self.conn)
            .optional()?)
    }

    fn update_full_name(&mut self, id: Uuid, full_name: &str) -> Result<(), StoreError> {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::full_name.eq(full_name))
            .execute(&mut *self.conn)?;
        Ok(())
    }

    fn set_assigned_agent(&mut self, id: Uuid, agent_id: Uuid) -> Result<(), StoreError> {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::assigned_agent_id.eq(Some(agent_id)))
            .execute(&mut *self.conn)?;
        Ok(())
    }

    fn agent_pool(&mut self) -> Result<Vec<Uuid>, StoreError> {
        Ok(users::table
            .filter(users::role.eq(Role::Agent.as_str()))
            .filter(users::is_active.eq(true))
            .select(users::id)
            .order(users::id.asc())
            .load(&mut *self.conn)?)
    }

    fn assignment_counts(&mut self) -> Result<HashMap<Uuid, i64>, StoreError> {
        let rows: Vec<(Option<Uuid>, i64)> = customers::table
            .filter(customers::assigned_agent_id.is_not_null())
            .group_by(customers::assigned_agent_id)
            .select((customers::assigned_agent_id, diesel::dsl::count_star()))
            .load(&mut *self.conn)?;

        Ok(rows
            .into_iter()
            .filter_map(|(agent_id, count)| agent_id.map(|id| (id, count)))
            .collect())
    }
}

/// In-memory store used by the resolver and assignment tests.
#[derive(Debug, Default)]
pub struct InMemoryCustomerStore {
    pub customers: Vec<Customer>,
    pub agents: Vec<Uuid>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: Vec<Uuid>) -> Self {
        Self {
            customers: Vec::new(),
            agents,
        }
    }
}

impl CustomerStore for InMemoryCustomerStore {
    fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.iter().find(|c| c.email == email).cloned())
    }

    fn find_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .customers
            .iter()
            .find(|c| c.phone_number == phone)
            .cloned())
    }

    fn try_insert(&mut self, customer: &Customer) -> Result<Option<Customer>, StoreError> {
        let email_taken = self.customers.iter().any(|c| c.email == customer.email);
        // The email-intake phone placeholder is exempt from uniqueness,
        // matching the partial unique index.
        let phone_taken = customer.phone_number != UNKNOWN_PHONE
            && self
                .customers
                .iter()
                .any(|c| c.phone_number == customer.phone_number);

        if email_taken || phone_taken {
            return Ok(None);
        }

        self.customers.push(customer.clone());
        Ok(Some(customer.clone()))
    }

    fn update_full_name(&mut self, id: Uuid, full_name: &str) -> Result<(), StoreError> {
        if let Some(customer) = self.customers.iter_mut().find(|c| c.id == id) {
            customer.full_name = full_name.to_string();
        }
        Ok(())
    }

    fn set_assigned_agent(&mut self, id: Uuid, agent_id: Uuid) -> Result<(), StoreError> {
        if let Some(customer) = self.customers.iter_mut().find(|c| c.id == id) {
            customer.assigned_agent_id = Some(agent_id);
        }
        Ok(())
    }

    fn agent_pool(&mut self) -> Result<Vec<Uuid>, StoreError> {
        let mut pool = self.agents.clone();
        pool.sort();
        Ok(pool)
    }

    fn assignment_counts(&mut self) -> Result<HashMap<Uuid, i64>, StoreError> {
        let mut counts = HashMap::new();
        for customer in &self.customers {
            if let Some(agent_id) = customer.assigned_agent_id {
                *counts.entry(agent_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
