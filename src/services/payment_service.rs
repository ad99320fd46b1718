use uuid::Uuid;

use crate::{client::ApiClient, error::ClientError, models::HandPayment, services::Resource};

#[derive(Clone)]
pub struct PaymentService {
    hand_payments: Resource<HandPayment>,
}

impl PaymentService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            hand_payments: Resource::new(client, "hand-payments"),
        }
    }

    pub async fn list_hand_payments(&self) -> Result<Vec<HandPayment>, ClientError> {
        self.hand_payments.list().await
    }

    /// Mark a desk (cash) payment as received.
    pub async fn confirm_hand_payment(&self, id: Uuid) -> Result<(), ClientError> {
        self.hand_payments
            .client()
            .post_action(&format!("/api/hand-payments/confirm/{id}"))
            .await?;
        tracing::info!(payment = %id, "hand payment confirmed");
        Ok(())
    }
}

pub fn pending(payments: &[HandPayment]) -> Vec<&HandPayment> {
    payments.iter().filter(|p| !p.confirmed).collect()
}
