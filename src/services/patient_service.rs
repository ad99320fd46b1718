// src/services/patient_service.rs

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::Patient,
    services::{Resource, require},
    table::{Searchable, filter},
};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientForm {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PatientForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        require("first name", &self.first_name)?;
        require("last name", &self.last_name)?;
        if let Some(email) = self.email.as_deref() {
            if !email.is_empty() && !email.contains('@') {
                return Err(ClientError::validation("email is not valid"));
            }
        }
        Ok(())
    }
}

impl Searchable for Patient {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.first_name.as_str(), self.last_name.as_str()];
        fields.extend(self.phone.as_deref());
        fields.extend(self.email.as_deref());
        fields
    }
}

#[derive(Clone)]
pub struct PatientService {
    resource: Resource<Patient>,
}

impl PatientService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "patients"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Patient>, ClientError> {
        self.resource.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient, ClientError> {
        self.resource.get(id).await
    }

    /// Fetch all patients and keep those matching `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<Patient>, ClientError> {
        let all = self.list().await?;
        Ok(filter(&all, query).into_iter().cloned().collect())
    }

    pub async fn create(&self, form: &PatientForm) -> Result<Patient, ClientError> {
        form.validate()?;
        let created = self.resource.create(form).await?;
        tracing::info!(patient = %created.id, "patient created");
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, form: &PatientForm) -> Result<Patient, ClientError> {
        form.validate()?;
        self.resource.update(id, form).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}
