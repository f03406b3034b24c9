//! Cognito user pool client over the `X-Amz-Target` JSON protocol.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::{AuthTokens, IdentityProvider};
use crate::config::CloudConfig;
use crate::error::AuthError;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Unauthenticated client for one app client of a user pool.
#[derive(Debug, Clone)]
pub struct CognitoClient {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
}

impl CognitoClient {
    #[must_use]
    pub fn new(config: &CloudConfig) -> Self {
        Self::with_endpoint(
            format!("https://cognito-idp.{}.amazonaws.com/", config.region),
            config.cognito_client_id.clone(),
        )
    }

    /// Client talking to an arbitrary endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }

    async fn call(&self, operation: &str, body: Value) -> Result<Value, AuthError> {
        let payload = serde_json::to_vec(&body).map_err(AuthError::Payload)?;
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let raw = response.bytes().await?;
        if status.is_success() {
            if raw.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&raw).map_err(AuthError::Payload);
        }

        let Ok(error) = serde_json::from_slice::<ErrorBody>(&raw) else {
            return Err(AuthError::Unknown(format!("{operation} answered {status}")));
        };
        // `__type` may carry a namespace: "com.amazonaws...#NotAuthorizedException".
        let code = error.kind.rsplit('#').next().unwrap_or_default();
        tracing::debug!(operation, code, "identity provider rejected request");
        Err(AuthError::from_aws(code, error.message))
    }
}

impl IdentityProvider for CognitoClient {
    async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.call(
            "SignUp",
            json!({
                "ClientId": self.client_id,
                "Username": email,
                "Password": password,
                "UserAttributes": [{"Name": "email", "Value": email}],
            }),
        )
        .await?;
        Ok(())
    }

    async fn confirm_register(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.call(
            "ConfirmSignUp",
            json!({"ClientId": self.client_id, "Username": email, "ConfirmationCode": code}),
        )
        .await?;
        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.call(
            "ForgotPassword",
            json!({"ClientId": self.client_id, "Username": email}),
        )
        .await?;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.call(
            "ConfirmForgotPassword",
            json!({
                "ClientId": self.client_id,
                "Username": email,
                "ConfirmationCode": code,
                "Password": new_password,
            }),
        )
        .await?;
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let raw = self
            .call(
                "InitiateAuth",
                json!({
                    "ClientId": self.client_id,
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "AuthParameters": {"USERNAME": email, "PASSWORD": password},
                }),
            )
            .await?;
        let response: InitiateAuthResponse =
            serde_json::from_value(raw).map_err(AuthError::Payload)?;

        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(AuthTokens {
                id_token: result.id_token,
                access_token: result.access_token,
                refresh_token: result.refresh_token,
            }),
            (None, Some(challenge)) if challenge == "NEW_PASSWORD_REQUIRED" => {
                Err(AuthError::PasswordChangeRequired)
            }
            (None, challenge) => Err(AuthError::Unknown(format!(
                "unsupported challenge {}",
                challenge.unwrap_or_default()
            ))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.call("GlobalSignOut", json!({"AccessToken": access_token}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(operation: &str) -> String {
        format!("{TARGET_PREFIX}.{operation}")
    }

    fn client(server: &MockServer) -> CognitoClient {
        CognitoClient::with_endpoint(format!("{}/", server.uri()), "client-1")
    }

    #[test]
    fn should_build_regional_endpoint() {
        let config = CloudConfig {
            region: "eu-west-1".to_string(),
            cognito_client_id: "abc".to_string(),
            ..CloudConfig::default()
        };
        let client = CognitoClient::new(&config);
        assert_eq!(client.endpoint, "https://cognito-idp.eu-west-1.amazonaws.com/");
        assert_eq!(client.client_id, "abc");
    }

    #[tokio::test]
    async fn should_return_tokens_on_successful_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("InitiateAuth").as_str()))
            .and(header("content-type", CONTENT_TYPE))
            .and(body_partial_json(serde_json::json!({
                "ClientId": "client-1",
                "AuthFlow": "USER_PASSWORD_AUTH",
                "AuthParameters": {"USERNAME": "me@example.com"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "AuthenticationResult": {
                    "IdToken": "id", "AccessToken": "access", "RefreshToken": "refresh",
                    "ExpiresIn": 3600, "TokenType": "Bearer"
                }
            })))
            .mount(&server)
            .await;

        let tokens = client(&server)
            .authenticate("me@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(tokens.id_token, "id");
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn should_map_new_password_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ChallengeName": "NEW_PASSWORD_REQUIRED", "Session": "xyz"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .authenticate("me@example.com", "hunter2")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::PasswordChangeRequired));
    }

    #[tokio::test]
    async fn should_map_namespaced_error_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "__type": "com.amazonaws.cognito#UserNotFoundException",
                "message": "User does not exist."
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .forgot_password("ghost@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UserNotFound(msg) if msg == "User does not exist."));
    }

    #[tokio::test]
    async fn should_send_email_attribute_on_register() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("SignUp").as_str()))
            .and(body_partial_json(serde_json::json!({
                "Username": "me@example.com",
                "UserAttributes": [{"Name": "email", "Value": "me@example.com"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "UserConfirmed": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .register("me@example.com", "hunter2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_accept_empty_sign_out_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("GlobalSignOut").as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).sign_out("access").await.unwrap();
    }
}
