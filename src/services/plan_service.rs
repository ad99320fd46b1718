use uuid::Uuid;

use crate::{client::ApiClient, error::ClientError, models::Plan, services::Resource};

/// Subscription plans offered to clinics.
#[derive(Clone)]
pub struct PlanService {
    resource: Resource<Plan>,
}

impl PlanService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "plans"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Plan>, ClientError> {
        let mut plans = self.resource.list().await?;
        plans.sort_by_key(|p| p.price_cents);
        Ok(plans)
    }

    pub async fn get(&self, id: Uuid) -> Result<Plan, ClientError> {
        self.resource.get(id).await
    }
}
