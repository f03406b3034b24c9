//! Account flow through the Cognito client against a mocked identity
//! provider and account API.

use std::path::Path;

use hublink_adapter_cloud::{
    AuthError, CloudAuth, CloudConfig, CloudError, CloudRelay, CognitoClient, SmartHomeHandler,
};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "x-amz-target";

struct Silent;

impl SmartHomeHandler for Silent {
    async fn handle(&self, _message: Value) -> Value {
        Value::Null
    }
}

fn config(server: &MockServer, dir: &Path) -> CloudConfig {
    CloudConfig {
        mode: "test".to_string(),
        cognito_client_id: "client-1".to_string(),
        api_base: format!("{}/api/", server.uri()),
        config_dir: dir.to_path_buf(),
        ..CloudConfig::default()
    }
}

fn auth(server: &MockServer, config: &CloudConfig) -> CloudAuth<CognitoClient> {
    let cognito = CognitoClient::with_endpoint(format!("{}/cognito/", server.uri()), "client-1");
    CloudAuth::new(cognito, config)
}

async fn mount_cognito(server: &MockServer, operation: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/cognito/"))
        .and(header(
            TARGET,
            format!("AWSCognitoIdentityProviderService.{operation}").as_str(),
        ))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn should_log_in_then_log_out() {
    let server = MockServer::start().await;
    mount_cognito(
        &server,
        "InitiateAuth",
        ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {"IdToken": "id-token", "AccessToken": "access-token"}
        })),
    )
    .await;
    mount_cognito(&server, "GlobalSignOut", ResponseTemplate::new(200)).await;
    Mock::given(method("POST"))
        .and(path("/api/device/create"))
        .and(header("authorization", "id-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificate_pem": "CERT", "secret_key": "KEY", "thing_name": "thing-42"
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let user = auth(&server, &config)
        .login("me@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(user.thing_name, "thing-42");
    assert!(dir.path().join("test_iot_certificate.pem").is_file());
    assert!(dir.path().join("test_iot_secret.key").is_file());
    assert!(dir.path().join("test_auth.json").is_file());

    let relay = CloudRelay::new(config, Silent);
    relay.logout().await.unwrap();
    assert!(relay.store().load().unwrap().is_none());
    assert!(matches!(
        relay.publish("alexa/1", b"{}".to_vec()).await,
        Err(CloudError::NotConnected)
    ));
}

#[tokio::test]
async fn should_report_unconfirmed_user() {
    let server = MockServer::start().await;
    mount_cognito(
        &server,
        "InitiateAuth",
        ResponseTemplate::new(400).set_body_json(json!({
            "__type": "UserNotConfirmedException",
            "message": "User is not confirmed."
        })),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let err = auth(&server, &config)
        .login("me@example.com", "hunter2")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::UserNotConfirmed(_)));
    assert!(!dir.path().join("test_auth.json").exists());
}

#[tokio::test]
async fn should_confirm_forgotten_password() {
    let server = MockServer::start().await;
    mount_cognito(&server, "ForgotPassword", ResponseTemplate::new(200).set_body_json(json!({
        "CodeDeliveryDetails": {"DeliveryMedium": "EMAIL"}
    })))
    .await;
    mount_cognito(
        &server,
        "ConfirmForgotPassword",
        ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ExpiredCodeException",
            "message": "Invalid code provided, please request a code again."
        })),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());
    let auth = auth(&server, &config);

    auth.forgot_password("me@example.com").await.unwrap();
    let err = auth
        .confirm_forgot_password("me@example.com", "123456", "n3w")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::ExpiredCode(_)));
}
