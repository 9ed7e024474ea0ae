//! Bearer token acquisition.
//!
//! The image service fronts a Cognito user pool; the CLI exchanges the
//! configured username/password for an ID token once per invocation via the
//! `USER_PASSWORD_AUTH` flow. Tokens are opaque to the rest of the client.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentityprovider::types::AuthFlowType;
use tessera_core::error::{Result, TesseraError};

/// Bearer credential attached to every service request.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token_type: String,
    token: String,
}

impl BearerToken {
    pub fn new(token_type: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            token: token.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

/// Exchange username/password for a bearer token.
pub async fn authenticate(
    region: &str,
    client_id: &str,
    username: &str,
    password: &str,
) -> Result<BearerToken> {
    tracing::info!(username, "Logging in");

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .no_credentials()
        .load()
        .await;
    let client = aws_sdk_cognitoidentityprovider::Client::new(&config);

    let response = client
        .initiate_auth()
        .auth_flow(AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", username)
        .auth_parameters("PASSWORD", password)
        .send()
        .await
        .map_err(|e| {
            let service_error = e.into_service_error();
            if service_error.is_not_authorized_exception() {
                TesseraError::InvalidCredentials
            } else if service_error.is_resource_not_found_exception() {
                TesseraError::InvalidClientId(client_id.to_string())
            } else {
                TesseraError::Auth(service_error.to_string())
            }
        })?;

    let result = response
        .authentication_result()
        .ok_or_else(|| TesseraError::Auth("no authentication result in response".to_string()))?;

    let token = result
        .id_token()
        .ok_or_else(|| TesseraError::Auth("no id token in response".to_string()))?;
    let token_type = result.token_type().unwrap_or("Bearer");

    tracing::debug!("Authenticated successfully");
    Ok(BearerToken::new(token_type, token))
}
