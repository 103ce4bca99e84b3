//! Authentication Module
//!
//! Account flows: validate the form locally, call the API, and keep the
//! session store in step with the result.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::{
    ApiClient, ApiError, EmailRequest, LoginRequest, MessageResponse, OtpRequest,
    RegisterRequest, ResetPasswordRequest,
};
use crate::session::{Session, SessionStore};
use crate::storage::StorageError;
use crate::validation::{self, ValidationError};

/// Registration screen input
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

pub struct AuthService {
    api: Arc<ApiClient>,
    session: SessionStore,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>, session: SessionStore) -> Self {
        Self { api, session }
    }

    /// Create an account; the server mails an activation OTP
    pub async fn register(&self, form: &RegisterForm) -> Result<String, AuthError> {
        validation::validate_registration(
            &form.email,
            &form.password,
            &form.confirm_password,
            &form.full_name,
        )?;

        let request = RegisterRequest {
            email: form.email.trim().to_string(),
            password: form.password.clone(),
            full_name: form.full_name.trim().to_string(),
            avatar_url: form.avatar_url.clone().filter(|u| !u.is_empty()),
        };

        let response = self.api.register(&request).await?;
        let message = accepted(response, "Registration failed")?;
        info!("Registered account, awaiting activation");
        Ok(message)
    }

    /// Sign in and persist the session
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validation::validate_login(email, password)?;

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let response = self.api.login(&request).await?;
        let data = match (response.is_success(), response.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(AuthError::Rejected(
                    response.message.unwrap_or_else(|| "Login failed".into()),
                ))
            }
        };

        let session = Session {
            access_token: data.access_token,
            user: data.user,
        };
        if session.access_token.is_empty() {
            return Err(AuthError::Rejected("Server returned an empty token".into()));
        }

        self.session.set_session(session.clone())?;
        Ok(session)
    }

    pub async fn activate(&self, email: &str, otp: &str) -> Result<String, AuthError> {
        validation::validate_otp(otp)?;
        validation::validate_email(email)?;

        let request = OtpRequest {
            email: email.trim().to_string(),
            otp: otp.to_string(),
        };
        let response = self.api.activate(&request).await?;
        accepted(response, "Account activation failed")
    }

    pub async fn resend_activation(&self, email: &str) -> Result<String, AuthError> {
        validation::validate_email(email)?;

        let response = self.api.resend_activation(&email_request(email)).await?;
        accepted(response, "Could not resend the OTP code")
    }

    /// Start a password reset; the server mails an OTP
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        validation::validate_email(email)?;

        let response = self.api.forgot_password(&email_request(email)).await?;
        accepted(response, "Could not send the reset code")
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<String, AuthError> {
        validation::validate_otp(otp)?;
        validation::validate_email(email)?;

        let request = OtpRequest {
            email: email.trim().to_string(),
            otp: otp.to_string(),
        };
        let response = self.api.verify_otp(&request).await?;
        accepted(response, "OTP verification failed")
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError> {
        validation::validate_otp(otp)?;
        validation::validate_email(email)?;
        validation::validate_new_password(new_password, confirm_password)?;

        let request = ResetPasswordRequest {
            email: email.trim().to_string(),
            otp: otp.to_string(),
            new_password: new_password.to_string(),
        };
        let response = self.api.reset_password(&request).await?;
        accepted(response, "Password reset failed")
    }

    /// Notify the server if possible, then always drop local credentials
    pub async fn logout(&self) -> Result<(), AuthError> {
        info!("Logging out");

        if let Some(token) = self.session.access_token() {
            if let Err(e) = self.api.logout(&token).await {
                warn!("Logout request failed, clearing local session anyway: {}", e);
            }
        }

        self.session.clear().map_err(|e| {
            error!("Failed to clear stored session: {}", e);
            AuthError::from(e)
        })
    }
}

fn email_request(email: &str) -> EmailRequest {
    EmailRequest {
        email: email.trim().to_string(),
    }
}

fn accepted(response: MessageResponse, fallback: &str) -> Result<String, AuthError> {
    let message = response
        .message
        .clone()
        .filter(|m| !m.trim().is_empty());

    if response.is_success() {
        Ok(message.unwrap_or_default())
    } else {
        Err(AuthError::Rejected(
            message.unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

/// Errors surfaced to the user as a single message
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResponse;
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    // Nothing listens here; any request would fail with a network error.
    fn offline_service() -> AuthService {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        AuthService::new(Arc::new(api), SessionStore::new(Arc::new(MemoryStorage::new())))
    }

    #[test]
    fn accepted_passes_message_through() {
        let ok = ApiResponse {
            status: "success".into(),
            message: Some("Account activated".into()),
            data: None,
        };
        assert_eq!(accepted(ok, "x").unwrap(), "Account activated");

        let rejected = ApiResponse {
            status: "error".into(),
            message: None,
            data: None,
        };
        assert!(matches!(
            accepted(rejected, "Activation failed"),
            Err(AuthError::Rejected(m)) if m == "Activation failed"
        ));
    }

    #[tokio::test]
    async fn short_otp_fails_before_network() {
        let service = offline_service();
        let err = service.activate("lan@mapic.app", "123").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Validation(ValidationError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn invalid_registration_fails_before_network() {
        let service = offline_service();
        let form = RegisterForm {
            email: "lan@mapic.app".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            full_name: "Lan".into(),
            avatar_url: None,
        };
        assert!(matches!(
            service.register(&form).await,
            Err(AuthError::Validation(ValidationError::PasswordMismatch))
        ));
    }

    #[tokio::test]
    async fn logout_without_session_is_local_only() {
        let service = offline_service();
        service.logout().await.unwrap();
    }
}
