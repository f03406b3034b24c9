//! Account API: identity provider calls and certificate retrieval.

use std::future::Future;

use crate::config::CloudConfig;
use crate::credentials::{CredentialStore, IotCertificate, UserInfo};
use crate::error::AuthError;

/// Tokens returned by a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// User directory holding the cloud accounts.
pub trait IdentityProvider: Send + Sync {
    fn register(&self, email: &str, password: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn confirm_register(&self, email: &str, code: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn forgot_password(&self, email: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthTokens, AuthError>> + Send;

    /// Invalidate every token of the session holding `access_token`.
    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Account operations of the cloud: user lifecycle and device login.
pub struct CloudAuth<P> {
    provider: P,
    http: reqwest::Client,
    api_base: String,
    store: CredentialStore,
}

impl<P: IdentityProvider> CloudAuth<P> {
    pub fn new(provider: P, config: &CloudConfig) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            store: CredentialStore::new(&config.config_dir, &config.mode),
        }
    }

    /// # Errors
    ///
    /// Returns the mapped [`AuthError`] of the identity provider.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.provider.register(email, password).await
    }

    /// # Errors
    ///
    /// Returns the mapped [`AuthError`] of the identity provider.
    pub async fn confirm_register(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.provider.confirm_register(email, code).await
    }

    /// # Errors
    ///
    /// Returns the mapped [`AuthError`] of the identity provider.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.provider.forgot_password(email).await
    }

    /// # Errors
    ///
    /// Returns the mapped [`AuthError`] of the identity provider.
    pub async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.provider
            .confirm_forgot_password(email, code, new_password)
            .await
    }

    /// Log in, fetch this installation's device certificate and store it.
    ///
    /// The provider session is signed out afterwards; only the certificate
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if authentication, certificate retrieval or
    /// storage fails.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo, AuthError> {
        let tokens = self.provider.authenticate(email, password).await?;
        let certificate = self.retrieve_certificate(&tokens.id_token).await?;
        let user = self.store.write(email, &certificate)?;

        if let Err(err) = self.provider.sign_out(&tokens.access_token).await {
            tracing::warn!(error = %err, "unable to sign out after login");
        }
        tracing::info!(thing_name = %user.thing_name, "cloud login complete");
        Ok(user)
    }

    async fn retrieve_certificate(&self, id_token: &str) -> Result<IotCertificate, AuthError> {
        let url = format!("{}/device/create", self.api_base.trim_end_matches('/'));
        let body = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, id_token)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        serde_json::from_slice(&body).map_err(AuthError::Payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider that accepts one password and records sign-outs.
    #[derive(Default)]
    struct FakeProvider {
        signed_out: Mutex<Vec<String>>,
    }

    impl IdentityProvider for FakeProvider {
        async fn register(&self, _email: &str, _password: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn confirm_register(&self, _email: &str, code: &str) -> Result<(), AuthError> {
            if code == "123456" {
                Ok(())
            } else {
                Err(AuthError::from_aws("CodeMismatchException", "wrong code"))
            }
        }

        async fn forgot_password(&self, _email: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn confirm_forgot_password(
            &self,
            _email: &str,
            _code: &str,
            _new_password: &str,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        async fn authenticate(&self, _email: &str, password: &str) -> Result<AuthTokens, AuthError> {
            if password != "hunter2" {
                return Err(AuthError::from_aws("NotAuthorizedException", "Incorrect password"));
            }
            Ok(AuthTokens {
                id_token: "id-token".to_string(),
                access_token: "access-token".to_string(),
                refresh_token: None,
            })
        }

        async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
            self.signed_out.lock().unwrap().push(access_token.to_string());
            Ok(())
        }
    }

    fn config(server: &MockServer, dir: &std::path::Path) -> CloudConfig {
        CloudConfig {
            api_base: server.uri(),
            config_dir: dir.to_path_buf(),
            ..CloudConfig::default()
        }
    }

    #[tokio::test]
    async fn should_store_certificate_and_sign_out_on_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/device/create"))
            .and(header("authorization", "id-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "certificate_pem": "CERT",
                "secret_key": "KEY",
                "thing_name": "thing-42"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let auth = CloudAuth::new(FakeProvider::default(), &config(&server, dir.path()));

        let user = auth.login("me@example.com", "hunter2").await.unwrap();

        assert_eq!(user.thing_name, "thing-42");
        assert_eq!(auth.store.load().unwrap(), Some(user));
        assert_eq!(std::fs::read_to_string(auth.store.certificate_path()).unwrap(), "CERT");
        assert_eq!(*auth.provider.signed_out.lock().unwrap(), vec!["access-token"]);
    }

    #[tokio::test]
    async fn should_not_touch_files_when_authentication_fails() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let auth = CloudAuth::new(FakeProvider::default(), &config(&server, dir.path()));

        let err = auth.login("me@example.com", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert!(auth.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn should_fail_when_certificate_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let auth = CloudAuth::new(FakeProvider::default(), &config(&server, dir.path()));

        let err = auth.login("me@example.com", "hunter2").await.unwrap_err();

        assert!(matches!(err, AuthError::Http(_)));
        assert!(auth.provider.signed_out.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_forward_provider_errors() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let auth = CloudAuth::new(FakeProvider::default(), &config(&server, dir.path()));

        let err = auth.confirm_register("me@example.com", "000000").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCode(_)));
    }
}
