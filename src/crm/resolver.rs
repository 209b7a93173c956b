//! Maps an inbound channel identifier (phone number or email address) to a
//! customer record, creating one when no match exists.

use super::store::{CustomerStore, StoreError};
use super::Customer;

/// Display name given to voice-channel customers until a caller name arrives.
pub const UNKNOWN_CALLER: &str = "Unknown Caller";
/// Phone placeholder for customers created from email intake.
pub const UNKNOWN_PHONE: &str = "Unknown";
/// Display name given to email-channel customers with no sender name.
pub const UNKNOWN_SENDER: &str = "Unknown Sender";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Phone,
}

/// Email placeholder derived from the known phone number, so phone-only
/// intake still satisfies the email uniqueness constraint.
pub fn placeholder_email(phone: &str) -> String {
    format!("{phone}@placeholder.com")
}

/// Find the customer identified by `key` on the given channel, or create one.
///
/// Returns the customer and whether it was created by this call. Lookups and
/// creations are idempotent per key: a lost insert race is resolved by a
/// single re-read instead of surfacing the conflict.
///
/// On the phone channel a customer that still carries the "Unknown Caller"
/// sentinel gets its display name upgraded in place when a real caller name
/// arrives; nothing else about an existing record is touched.
pub fn resolve_customer<S: CustomerStore>(
    store: &mut S,
    channel: Channel,
    key: &str,
    display_name: &str,
) -> Result<(Customer, bool), StoreError> {
    let existing = match channel {
        Channel::Email => store.find_by_email(key)?,
        Channel::Phone => store.find_by_phone(key)?,
    };

    if let Some(mut customer) = existing {
        if channel == Channel::Phone
            && customer.full_name == UNKNOWN_CALLER
            && display_name != UNKNOWN_CALLER
        {
            store.update_full_name(customer.id, display_name)?;
            customer.full_name = display_name.to_string();
        }
        return Ok((customer, false));
    }

    let candidate = match channel {
        Channel::Email => Customer::new(display_name, key.to_string(), UNKNOWN_PHONE.to_string()),
        Channel::Phone => Customer::new(display_name, placeholder_email(key), key.to_string()),
    };

    if let Some(created) = store.try_insert(&candidate)? {
        return Ok((created, true));
    }

    // Lost a creation race against a concurrent delivery for the same key;
    // the record must exist now.
    let raced = match channel {
        Channel::Email => store.find_by_email(key)?,
        Channel::Phone => store.find_by_phone(key)?,
    };

    raced
        .map(|customer| (customer, false))
        .ok_or_else(|| StoreError::DuplicateKey(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::store::InMemoryCustomerStore;
    use super::*;

    #[test]
    fn test_resolve_is_idempotent_per_phone_key() {
        let mut store = InMemoryCustomerStore::new();

        let (first, created) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();
        assert!(created);

        let (second, created) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.customers.len(), 1);
    }

    #[test]
    fn test_phone_creation_populates_placeholder_email() {
        let mut store = InMemoryCustomerStore::new();

        let (customer, _) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();

        assert_eq!(customer.email, "555-0100@placeholder.com");
        assert_eq!(customer.phone_number, "555-0100");
        assert_eq!(customer.account_status, "Active");
        assert_eq!(customer.assigned_agent_id, None);
    }

    #[test]
    fn test_email_creation_populates_placeholder_phone() {
        let mut store = InMemoryCustomerStore::new();

        let (customer, created) =
            resolve_customer(&mut store, Channel::Email, "jane@example.com", "Jane Doe").unwrap();

        assert!(created);
        assert_eq!(customer.full_name, "Jane Doe");
        assert_eq!(customer.phone_number, UNKNOWN_PHONE);
    }

    #[test]
    fn test_unknown_caller_name_is_upgraded_once() {
        let mut store = InMemoryCustomerStore::new();

        resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();

        let (customer, created) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", "Jane Doe").unwrap();
        assert!(!created);
        assert_eq!(customer.full_name, "Jane Doe");

        // A later anonymous call must not revert the known name.
        let (customer, _) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();
        assert_eq!(customer.full_name, "Jane Doe");
    }

    #[test]
    fn test_email_resolve_leaves_existing_name_alone() {
        let mut store = InMemoryCustomerStore::new();

        resolve_customer(&mut store, Channel::Email, "jane@example.com", "Jane Doe").unwrap();
        let (customer, created) =
            resolve_customer(&mut store, Channel::Email, "jane@example.com", "J. Doe").unwrap();

        assert!(!created);
        assert_eq!(customer.full_name, "Jane Doe");
    }

    #[test]
    fn test_two_email_customers_share_the_phone_placeholder() {
        let mut store = InMemoryCustomerStore::new();

        let (_, created) =
            resolve_customer(&mut store, Channel::Email, "a@example.com", "A").unwrap();
        assert!(created);
        let (_, created) =
            resolve_customer(&mut store, Channel::Email, "b@example.com", "B").unwrap();
        assert!(created);
        assert_eq!(store.customers.len(), 2);
    }

    /// Store that pretends the record does not exist on the first lookup,
    /// reproducing a delivery that loses the insert race to a concurrent one.
    struct RacingStore {
        inner: InMemoryCustomerStore,
        hide_first_lookup: bool,
    }

    impl CustomerStore for RacingStore {
        fn find_by_email(&mut self, email: &str) -> Result<Option<Customer>, StoreError> {
            self.inner.find_by_email(email)
        }

        fn find_by_phone(&mut self, phone: &str) -> Result<Option<Customer>, StoreError> {
            if self.hide_first_lookup {
                self.hide_first_lookup = false;
                return Ok(None);
            }
            self.inner.find_by_phone(phone)
        }

        fn try_insert(&mut self, customer: &Customer) -> Result<Option<Customer>, StoreError> {
            self.inner.try_insert(customer)
        }

        fn update_full_name(
            &mut self,
            id: uuid::Uuid,
            full_name: &str,
        ) -> Result<(), StoreError> {
            self.inner.update_full_name(id, full_name)
        }

        fn set_assigned_agent(
            &mut self,
            id: uuid::Uuid,
            agent_id: uuid::Uuid,
        ) -> Result<(), StoreError> {
            self.inner.set_assigned_agent(id, agent_id)
        }

        fn agent_pool(&mut self) -> Result<Vec<uuid::Uuid>, StoreError> {
            self.inner.agent_pool()
        }

        fn assignment_counts(
            &mut self,
        ) -> Result<std::collections::HashMap<uuid::Uuid, i64>, StoreError> {
            self.inner.assignment_counts()
        }
    }

    #[test]
    fn test_lost_insert_race_resolves_by_reread() {
        let mut inner = InMemoryCustomerStore::new();
        let rival = Customer::new(
            UNKNOWN_CALLER,
            placeholder_email("555-0100"),
            "555-0100".to_string(),
        );
        inner.customers.push(rival.clone());

        let mut store = RacingStore {
            inner,
            hide_first_lookup: true,
        };

        // The lookup misses, the insert conflicts on the phone key, and the
        // re-read resolves to the concurrently created record.
        let (customer, created) =
            resolve_customer(&mut store, Channel::Phone, "555-0100", UNKNOWN_CALLER).unwrap();
        assert!(!created);
        assert_eq!(customer.id, rival.id);
        assert_eq!(store.inner.customers.len(), 1);
    }
}
