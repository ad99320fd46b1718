use crate::{
    client::ApiClient,
    error::ClientError,
    models::{Claims, LoginRequest},
    services::require,
};

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Claims, ClientError> {
        let email = email.trim();
        require("email", email)?;
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }

        self.client
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
    }

    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.client.refresh_token().await
    }

    pub async fn logout(&self) {
        self.client.logout().await;
    }
}
