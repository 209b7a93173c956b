//! Least-loaded assignment of agents to unassigned customers.

use std::collections::HashMap;
use uuid::Uuid;

use super::store::{CustomerStore, StoreError};
use super::Customer;

/// Pick the agent carrying the fewest assigned customers. Ties break on the
/// lowest agent id, so the outcome is deterministic regardless of store
/// ordering.
pub fn select_least_loaded(pool: &[Uuid], counts: &HashMap<Uuid, i64>) -> Option<Uuid> {
    pool.iter()
        .copied()
        .min_by_key(|id| (counts.get(id).copied().unwrap_or(0), *id))
}

/// Bind the least-loaded agent to `customer` and persist the change.
///
/// Idempotent: a customer that already has an agent is left untouched. An
/// empty agent pool leaves the customer unassigned and is not an error, so
/// intake never fails because nobody is on shift.
pub fn assign_agent<S: CustomerStore>(
    store: &mut S,
    customer: &mut Customer,
) -> Result<Option<Uuid>, StoreError> {
    if customer.assigned_agent_id.is_some() {
        return Ok(customer.assigned_agent_id);
    }

    let pool = store.agent_pool()?;
    let counts = store.assignment_counts()?;

    let Some(agent_id) = select_least_loaded(&pool, &counts) else {
        return Ok(None);
    };

    store.set_assigned_agent(customer.id, agent_id)?;
    customer.assigned_agent_id = Some(agent_id);

    Ok(Some(agent_id))
}

#[cfg(test)]
mod tests {
    use super::super::store::InMemoryCustomerStore;
    use super::super::UNKNOWN_PHONE;
    use super::*;

    fn uuid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    fn customer(n: u32, agent: Option<Uuid>) -> Customer {
        let mut c = Customer::new(
            format!("Customer {n}"),
            format!("c{n}@example.com"),
            UNKNOWN_PHONE.to_string(),
        );
        c.assigned_agent_id = agent;
        c
    }

    #[test]
    fn test_least_loaded_agent_wins() {
        let agent_a = uuid(1);
        let agent_c = uuid(2);
        let agent_b = uuid(3);

        let mut store = InMemoryCustomerStore::with_agents(vec![agent_a, agent_c, agent_b]);
        store.customers.push(customer(1, Some(agent_a)));
        store.customers.push(customer(2, Some(agent_a)));
        store.customers.push(customer(3, Some(agent_c)));

        // A carries 2, B carries 0, C carries 1.
        let mut fresh = customer(4, None);
        store.customers.push(fresh.clone());
        let chosen = assign_agent(&mut store, &mut fresh).unwrap();
        assert_eq!(chosen, Some(agent_b));

        // After the recount B and C are tied at 1; the lower id (C) wins.
        let mut next = customer(5, None);
        store.customers.push(next.clone());
        let chosen = assign_agent(&mut store, &mut next).unwrap();
        assert_eq!(chosen, Some(agent_c));
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let agent = uuid(1);
        let other = uuid(2);
        let mut store = InMemoryCustomerStore::with_agents(vec![agent, other]);

        let mut already = customer(1, Some(other));
        store.customers.push(already.clone());

        let chosen = assign_agent(&mut store, &mut already).unwrap();
        assert_eq!(chosen, Some(other));
        assert_eq!(store.customers[0].assigned_agent_id, Some(other));
    }

    #[test]
    fn test_empty_pool_leaves_customer_unassigned() {
        let mut store = InMemoryCustomerStore::new();
        let mut fresh = customer(1, None);
        store.customers.push(fresh.clone());

        let chosen = assign_agent(&mut store, &mut fresh).unwrap();
        assert_eq!(chosen, None);
        assert_eq!(fresh.assigned_agent_id, None);
        assert_eq!(store.customers[0].assigned_agent_id, None);
    }

    #[test]
    fn test_tie_break_is_lowest_id() {
        let low = uuid(1);
        let high = uuid(9);
        let counts = HashMap::new();

        assert_eq!(select_least_loaded(&[high, low], &counts), Some(low));
        assert_eq!(select_least_loaded(&[], &counts), None);
    }

    #[test]
    fn test_assignment_persists_to_store() {
        let agent = uuid(4);
        let mut store = InMemoryCustomerStore::with_agents(vec![agent]);
        let mut fresh = customer(1, None);
        store.customers.push(fresh.clone());

        assign_agent(&mut store, &mut fresh).unwrap();

        assert_eq!(fresh.assigned_agent_id, Some(agent));
        assert_eq!(store.customers[0].assigned_agent_id, Some(agent));
    }
}
