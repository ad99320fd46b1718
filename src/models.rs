use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    config::Config,
    error::ClientError,
    session::{AuthSession, FileTokenStore, TokenStore},
    slots::SlotDuration,
};

/// Everything a view needs, constructed once and passed down.
#[derive(Clone)]
pub struct AppState {
    pub client: ApiClient,
    pub session: AuthSession,
    pub slot_duration: SlotDuration,
    pub refresh_lead: Duration,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> Result<Self, ClientError> {
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(cfg.token_path.clone()));
        Self::with_store(cfg, store)
    }

    pub fn with_store(cfg: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let session = AuthSession::restore(store);
        let client = ApiClient::new(&cfg.api_url, session.clone())?;
        Ok(Self {
            client,
            session,
            slot_duration: cfg.slot_duration,
            refresh_lead: cfg.refresh_lead,
        })
    }
}

/* -------------------------
   Auth DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Dentist,
    Assistant,
    Receptionist,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Active,
    Waiting,
    Pending,
    #[serde(other)]
    Other,
}

/// Claims carried in the bearer token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<Role>,
    /// Expiry, seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, alias = "emailVerified")]
    pub email_verified: bool,
    #[serde(default, alias = "phoneVerified")]
    pub phone_verified: bool,
    #[serde(default, alias = "planStatus")]
    pub plan_status: Option<PlanStatus>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRef {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl PatientRef {
    pub fn display(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub patient: Option<PatientRef>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Candidate appointment as submitted by the "add appointment" form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    pub patient_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentDraft {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.patient_id.is_none() {
            return Err(ClientError::validation("patient is required"));
        }
        if self.end_time <= self.start_time {
            return Err(ClientError::validation("end time must be after start time"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
}

/* -------------------------
   Flat records
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub salary_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub duration_min: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: i32,
    #[serde(default)]
    pub min_quantity: i32,
    #[serde(default)]
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub description: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

/// Cash payment taken at the desk, waiting for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandPayment {
    pub id: Uuid,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub amount_cents: i64,
    #[serde(default)]
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub duration_months: Option<i32>,
    #[serde(default)]
    pub features: Vec<String>,
}
