//! API Client Module
//!
//! Handles HTTP communication with the MAPIC backend.

use reqwest::{header, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::location::LocationSample;

/// Backend routes
pub mod endpoints {
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const ACTIVATE: &str = "/auth/activate";
    pub const RESEND_ACTIVATION: &str = "/auth/resend-activation";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const VERIFY_OTP: &str = "/auth/verify-otp";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
    pub const LOGOUT: &str = "/auth/logout";

    pub const LOCATIONS: &str = "/api/locations";
    pub const FRIENDS: &str = "/api/friends";
    pub const FRIEND_REQUESTS: &str = "/api/friends/requests";

    pub fn user_location(user_id: &str) -> String {
        format!("{}/{}", LOCATIONS, user_id)
    }

    pub fn accept_friend_request(request_id: &str) -> String {
        format!("{}/{}/accept", FRIEND_REQUESTS, request_id)
    }

    pub fn reject_friend_request(request_id: &str) -> String {
        format!("{}/{}/reject", FRIEND_REQUESTS, request_id)
    }
}

/// API client for the MAPIC backend
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let builder = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json");

        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B, token: Option<&str>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(reqwest::Method::POST, path, token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        read_json(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let response = self
            .request(reqwest::Method::GET, path, Some(token))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        read_json(response).await
    }

    // Auth

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::REGISTER, request, None).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self.post(endpoints::LOGIN, request, None).await?;
        if response.is_success() {
            info!("Login accepted");
        }
        Ok(response)
    }

    pub async fn activate(&self, request: &OtpRequest) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::ACTIVATE, request, None).await
    }

    pub async fn resend_activation(
        &self,
        request: &EmailRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::RESEND_ACTIVATION, request, None).await
    }

    pub async fn forgot_password(
        &self,
        request: &EmailRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::FORGOT_PASSWORD, request, None).await
    }

    pub async fn verify_otp(&self, request: &OtpRequest) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::VERIFY_OTP, request, None).await
    }

    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.post(endpoints::RESET_PASSWORD, request, None).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post(endpoints::LOGOUT, &serde_json::json!({}), Some(access_token))
            .await?;
        info!("Logged out from server");
        Ok(())
    }

    // Locations

    /// Latest locations of the caller's friends
    pub async fn friend_locations(
        &self,
        access_token: &str,
    ) -> Result<Vec<LocationSample>, ApiError> {
        let payload: Payload<Vec<LocationSample>> =
            self.get(endpoints::LOCATIONS, access_token).await?;
        payload.into_data()
    }

    pub async fn user_location(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<LocationSample, ApiError> {
        let payload: Payload<LocationSample> = self
            .get(&endpoints::user_location(user_id), access_token)
            .await?;
        payload.into_data()
    }

    pub async fn post_location(
        &self,
        access_token: &str,
        sample: &LocationSample,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post(endpoints::LOCATIONS, sample, Some(access_token))
            .await?;
        debug!("Shared location for user: {}", sample.user_id);
        Ok(())
    }

    // Friends

    pub async fn friends(&self, access_token: &str) -> Result<Vec<Friend>, ApiError> {
        let payload: Payload<Vec<Friend>> = self.get(endpoints::FRIENDS, access_token).await?;
        payload.into_data()
    }

    pub async fn friend_requests(&self, access_token: &str) -> Result<Vec<FriendRequest>, ApiError> {
        let payload: Payload<Vec<FriendRequest>> =
            self.get(endpoints::FRIEND_REQUESTS, access_token).await?;
        payload.into_data()
    }

    pub async fn send_friend_request(
        &self,
        access_token: &str,
        receiver_id: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = SendFriendRequest { receiver_id };
        self.post(endpoints::FRIEND_REQUESTS, &body, Some(access_token))
            .await
    }

    pub async fn accept_friend_request(
        &self,
        access_token: &str,
        request_id: &str,
    ) -> Result<MessageResponse, ApiError> {
        self.post(
            &endpoints::accept_friend_request(request_id),
            &serde_json::json!({}),
            Some(access_token),
        )
        .await
    }

    pub async fn reject_friend_request(
        &self,
        access_token: &str,
        request_id: &str,
    ) -> Result<MessageResponse, ApiError> {
        self.post(
            &endpoints::reject_friend_request(request_id),
            &serde_json::json!({}),
            Some(access_token),
        )
        .await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.into_message(status),
            Err(_) => format!("Status: {}", status),
        };
        return Err(if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Server(message)
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    // 204 and empty bodies decode as JSON null
    let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };

    serde_json::from_slice(bytes).map_err(|e| ApiError::Parse(e.to_string()))
}

// Envelope

/// Standard `{ status, message, data }` wrapper used by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

pub type MessageResponse = ApiResponse<serde_json::Value>;
pub type AuthResponse = ApiResponse<AuthData>;

/// Data endpoints answer either bare or wrapped in the envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Bare(T),
    Envelope(ApiResponse<T>),
}

impl<T> Payload<T> {
    fn into_data(self) -> Result<T, ApiError> {
        match self {
            Payload::Bare(data) => Ok(data),
            Payload::Envelope(envelope) if !envelope.is_success() => Err(ApiError::Server(
                envelope.message.unwrap_or_else(|| "Request failed".into()),
            )),
            Payload::Envelope(envelope) => envelope
                .data
                .ok_or_else(|| ApiError::Parse("response carried no data".into())),
        }
    }
}

// Request/Response types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for both account activation and password-reset OTP checks
#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendFriendRequest<'a> {
    receiver_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Fields this client does not model, kept so the stored blob stays complete
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorResponse {
    fn into_message(self, status: StatusCode) -> String {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Status: {}", status))
    }
}

/// Backend ids are numeric on the server; the client treats them as opaque strings
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Unsigned(n) => n.to_string(),
    })
}

/// API errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_and_enveloped_payloads_decode() {
        let bare: Payload<Vec<Friend>> =
            serde_json::from_value(json!([{ "id": 7, "fullName": "Minh" }])).unwrap();
        assert_eq!(bare.into_data().unwrap()[0].id, "7");

        let wrapped: Payload<Vec<Friend>> = serde_json::from_value(json!({
            "status": "success",
            "message": "ok",
            "data": [{ "id": "8", "fullName": "Hoa" }]
        }))
        .unwrap();
        assert_eq!(wrapped.into_data().unwrap()[0].full_name, "Hoa");
    }

    #[test]
    fn error_envelope_surfaces_message() {
        let wrapped: Payload<Vec<Friend>> = serde_json::from_value(json!({
            "status": "error",
            "message": "Token expired"
        }))
        .unwrap();
        assert_eq!(
            wrapped.into_data().unwrap_err(),
            ApiError::Server("Token expired".into())
        );
    }

    #[test]
    fn bare_sample_with_status_is_not_mistaken_for_envelope() {
        let payload: Payload<LocationSample> = serde_json::from_value(json!({
            "userId": 3,
            "latitude": 10.77,
            "longitude": 106.70,
            "status": "online",
            "timestamp": "2026-10-15T08:00:00Z"
        }))
        .unwrap();
        let sample = payload.into_data().unwrap();
        assert_eq!(sample.user_id, "3");
        assert_eq!(sample.status.as_deref(), Some("online"));
    }

    #[test]
    fn user_profile_keeps_unknown_fields() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": 42,
            "email": "lan@mapic.app",
            "fullName": "Lan",
            "role": "USER"
        }))
        .unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.extra.get("role"), Some(&json!("USER")));

        let stored = serde_json::to_value(&profile).unwrap();
        assert_eq!(stored["role"], json!("USER"));
        assert_eq!(stored["fullName"], json!("Lan"));
    }

    #[test]
    fn error_body_prefers_message_then_error() {
        let body = ErrorResponse {
            message: None,
            error: Some("Email already exists".into()),
        };
        assert_eq!(
            body.into_message(StatusCode::CONFLICT),
            "Email already exists"
        );
        assert_eq!(
            ErrorResponse::default().into_message(StatusCode::BAD_GATEWAY),
            "Status: 502 Bad Gateway"
        );
    }

    #[test]
    fn register_request_uses_camel_case() {
        let body = serde_json::to_value(RegisterRequest {
            email: "a@b.co".into(),
            password: "secret1".into(),
            full_name: "An".into(),
            avatar_url: None,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "email": "a@b.co", "password": "secret1", "fullName": "An" })
        );
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::user_location("12"), "/api/locations/12");
        assert_eq!(
            endpoints::accept_friend_request("5"),
            "/api/friends/requests/5/accept"
        );
        assert_eq!(
            endpoints::reject_friend_request("5"),
            "/api/friends/requests/5/reject"
        );
    }
}
