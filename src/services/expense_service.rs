use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::Expense,
    services::{Resource, require},
    table::Searchable,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseForm {
    pub description: String,
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

impl ExpenseForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        require("description", &self.description)?;
        if self.amount_cents <= 0 {
            return Err(ClientError::validation("amount must be > 0"));
        }
        Ok(())
    }
}

impl Searchable for Expense {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.description.as_str()];
        fields.extend(self.category.as_deref());
        fields
    }
}

#[derive(Clone)]
pub struct ExpenseService {
    resource: Resource<Expense>,
}

impl ExpenseService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "expenses"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Expense>, ClientError> {
        self.resource.list().await
    }

    pub async fn create(&self, form: &ExpenseForm) -> Result<Expense, ClientError> {
        form.validate()?;
        self.resource.create(form).await
    }

    pub async fn update(&self, id: Uuid, form: &ExpenseForm) -> Result<Expense, ClientError> {
        form.validate()?;
        self.resource.update(id, form).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}
