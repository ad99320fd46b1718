use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::Treatment,
    services::{Resource, require},
    table::Searchable,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_min: Option<i32>,
}

impl TreatmentForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        require("name", &self.name)?;
        if self.price_cents < 0 {
            return Err(ClientError::validation("price cannot be negative"));
        }
        if self.duration_min.is_some_and(|d| d <= 0) {
            return Err(ClientError::validation("duration must be > 0"));
        }
        Ok(())
    }
}

impl Searchable for Treatment {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }
}

#[derive(Clone)]
pub struct TreatmentService {
    resource: Resource<Treatment>,
}

impl TreatmentService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "treatments"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Treatment>, ClientError> {
        self.resource.list().await
    }

    pub async fn create(&self, form: &TreatmentForm) -> Result<Treatment, ClientError> {
        form.validate()?;
        self.resource.create(form).await
    }

    pub async fn update(&self, id: Uuid, form: &TreatmentForm) -> Result<Treatment, ClientError> {
        form.validate()?;
        self.resource.update(id, form).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}
