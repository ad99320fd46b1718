use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::Employee,
    services::{Resource, require},
    table::Searchable,
};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeForm {
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_cents: Option<i64>,
}

impl EmployeeForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        require("first name", &self.first_name)?;
        require("last name", &self.last_name)?;
        require("role", &self.role)?;
        if self.salary_cents.is_some_and(|s| s < 0) {
            return Err(ClientError::validation("salary cannot be negative"));
        }
        Ok(())
    }
}

impl Searchable for Employee {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.first_name.as_str(), self.last_name.as_str(), self.role.as_str()]
    }
}

#[derive(Clone)]
pub struct EmployeeService {
    resource: Resource<Employee>,
}

impl EmployeeService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "employees"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Employee>, ClientError> {
        self.resource.list().await
    }

    pub async fn create(&self, form: &EmployeeForm) -> Result<Employee, ClientError> {
        form.validate()?;
        self.resource.create(form).await
    }

    pub async fn update(&self, id: Uuid, form: &EmployeeForm) -> Result<Employee, ClientError> {
        form.validate()?;
        self.resource.update(id, form).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}

/// Monthly payroll of the listed employees, in cents.
pub fn payroll_cents(employees: &[Employee]) -> i64 {
    employees.iter().filter_map(|e| e.salary_cents).sum()
}
