//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub ok: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn login_request_tolerates_missing_fields() -> Result<()> {
        let request: LoginRequest = serde_json::from_str(r#"{"user": "admin"}"#)?;
        assert_eq!(request.user, "admin");
        assert!(request.password.is_empty());
        Ok(())
    }

    #[test]
    fn anonymous_session_omits_user() -> Result<()> {
        let response = SessionResponse {
            ok: false,
            authenticated: false,
            user: None,
            error: Some("unauthorized".to_string()),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("user").is_none());
        assert_eq!(value["authenticated"], false);
        Ok(())
    }
}
