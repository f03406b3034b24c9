//! # hublink-adapter-cloud
//!
//! Cloud relay: keeps an MQTT session with the cloud broker so that
//! voice-assistant directives reach the hub, and manages the account the
//! session authenticates as.
//!
//! ## Topics
//!
//! | Direction | Topic | Content |
//! |-----------|-------|---------|
//! | inbound | `<thing>/i/<handler>` | request for a handler (`alexa`) |
//! | outbound | `<thing>/o/alexa/<messageId>` | smart home response |
//!
//! ## Credentials
//!
//! `login` stores the device certificate, its secret key and the user info
//! under `config_dir`, one set of files per `mode`. The relay only ever
//! reads them; `logout` deletes them.

mod auth;
mod client;
mod cognito;
mod config;
mod credentials;
mod error;
mod iot;

pub use auth::{AuthTokens, CloudAuth, IdentityProvider};
pub use client::CloudRelay;
pub use cognito::CognitoClient;
pub use config::{CloudConfig, MODE_DEV};
pub use credentials::{CredentialStore, IotCertificate, UserInfo};
pub use error::{AuthError, CloudError, ConnectError, CredentialError};
pub use iot::{HandlerKind, MessageRouter, Reply, SmartHomeHandler, handler_name};
