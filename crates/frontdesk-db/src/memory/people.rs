//! In-memory staff and customer repositories.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use frontdesk_core::cursor::{paginate, Cursor, SortDirection};
use frontdesk_core::merge::{merge_customer, CustomerMerge};
use frontdesk_core::{
    new_v7, Customer, CustomerProfile, CustomerRepository, Page, PageRequest, Result, Staff,
    StaffRepository, UpsertStaffRequest,
};

use super::SharedState;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct MemoryStaffRepository {
    state: SharedState,
}

impl MemoryStaffRepository {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl StaffRepository for MemoryStaffRepository {
    async fn upsert(&self, req: UpsertStaffRequest) -> Result<Staff> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .staff
            .values_mut()
            .find(|s| s.external_id == req.external_id)
        {
            existing.display_name = req.display_name;
            existing.permissions = req.permissions;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let staff = Staff {
            id: new_v7(),
            external_id: req.external_id,
            display_name: req.display_name,
            permissions: req.permissions,
            created_at: now,
            updated_at: now,
        };
        state.staff.insert(staff.id, staff.clone());
        Ok(staff)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Staff>> {
        Ok(self.state.read().await.staff.get(&id).cloned())
    }

    async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.staff.contains_key(id))
            .collect())
    }
}

pub struct MemoryCustomerRepository {
    state: SharedState,
}

impl MemoryCustomerRepository {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl CustomerRepository for MemoryCustomerRepository {
    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<Customer> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let existing_id = state
            .customers
            .values()
            .find(|c| c.sunshine_user_id.as_deref() == Some(profile.sunshine_user_id.as_str()))
            .map(|c| c.id);

        let Some(customer) = existing_id.and_then(|id| state.customers.get_mut(&id)) else {
            let customer = Customer {
                id: new_v7(),
                external_id: profile.external_id,
                sunshine_user_id: Some(profile.sunshine_user_id),
                display_name: non_empty(profile.display_name),
                locale: non_empty(profile.locale),
                metadata: profile.metadata,
                created_at: now,
                updated_at: now,
            };
            state.customers.insert(customer.id, customer.clone());
            return Ok(customer);
        };

        if let CustomerMerge::Update {
            external_id,
            display_name,
            locale,
        } = merge_customer(Some(&*customer), profile)
        {
            if external_id.is_some() {
                customer.external_id = external_id;
            }
            if display_name.is_some() {
                customer.display_name = display_name;
            }
            if locale.is_some() {
                customer.locale = locale;
            }
            customer.updated_at = now;
        }
        Ok(customer.clone())
    }

    async fn find_by_sunshine_user_id(&self, sunshine_user_id: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state
            .customers
            .values()
            .find(|c| c.sunshine_user_id.as_deref() == Some(sunshine_user_id))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Customer>> {
        let state = self.state.read().await;
        let rows: Vec<Customer> = state.customers.values().cloned().collect();
        Ok(paginate(rows, page, SortDirection::Desc, |c: &Customer| {
            Cursor::new(c.created_at, c.id)
        }))
    }
}
