use std::future::Future;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{client::ApiClient, error::ClientError, notice::Notice};

pub mod appointment_service;
pub mod auth_service;
pub mod employee_service;
pub mod expense_service;
pub mod inventory_service;
pub mod patient_service;
pub mod payment_service;
pub mod plan_service;
pub mod treatment_service;

/// Conventional REST collection at `/api/<name>`.
pub struct Resource<T> {
    client: ApiClient,
    name: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            name: self.name,
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Resource<T> {
    pub fn new(client: ApiClient, name: &'static str) -> Self {
        Self {
            client,
            name,
            _record: PhantomData,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn collection_path(&self) -> String {
        format!("/api/{}", self.name)
    }

    pub fn item_path(&self, id: Uuid) -> String {
        format!("/api/{}/{id}", self.name)
    }

    pub async fn list(&self) -> Result<Vec<T>, ClientError> {
        self.client.get(&self.collection_path()).await
    }

    pub async fn get(&self, id: Uuid) -> Result<T, ClientError> {
        self.client.get(&self.item_path(id)).await
    }

    pub async fn create<B: Serialize>(&self, body: &B) -> Result<T, ClientError> {
        self.client.post(&self.collection_path(), body).await
    }

    pub async fn update<B: Serialize>(&self, id: Uuid, body: &B) -> Result<T, ClientError> {
        self.client.put(&self.item_path(id), body).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.client.delete(&self.item_path(id)).await
    }
}

/// Result of a list view's initial fetch.
#[derive(Debug)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub notice: Option<Notice>,
}

/// Run a list fetch; on failure log it, produce a notice, and show an empty list.
pub async fn load_or_empty<T, F>(what: &str, fetch: F) -> Loaded<T>
where
    F: Future<Output = Result<Vec<T>, ClientError>>,
{
    match fetch.await {
        Ok(items) => Loaded { items, notice: None },
        Err(e) => {
            tracing::error!("failed to load {what}: {e}");
            Loaded {
                items: Vec::new(),
                notice: Some(Notice::from_error(&e)),
            }
        }
    }
}

/// Reject blank required fields before anything is sent.
pub(crate) fn require(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
