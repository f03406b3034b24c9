//! # hublinkd: hublink daemon
//!
//! Composition root that wires the adapters together and runs the hub.
//!
//! ## Responsibilities
//! - Parse the command line and the configuration file
//! - Initialise tracing
//! - Construct the event bus and the state service
//! - Set up the Hue integration and start its poll loop
//! - Start the cloud relay when a user is logged in
//! - Run the `cloud` account commands
//! - Tear everything down on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod cli;
mod config;
mod smart_home;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use hublink_adapter_cloud::{CloudAuth, CloudConfig, CloudRelay, CognitoClient};
use hublink_adapter_hue::HueIntegration;
use hublink_app::event_bus::InProcessEventBus;
use hublink_app::ports::Integration;
use hublink_app::services::integration_context::ServiceContext;
use hublink_app::services::state_service::StateService;
use hublink_domain::event::EventType;
use tokio::sync::broadcast;

use crate::cli::{Cli, CloudCommand, Command};
use crate::config::Config;
use crate::smart_home::UnsupportedDirectives;

const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Cloud { command } => {
            let cloud = config
                .cloud
                .ok_or("the cloud commands need a [cloud] section in the configuration")?;
            run_cloud_command(cloud, command).await
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let event_bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));
    let state = Arc::new(StateService::new(Arc::clone(&event_bus)));
    let ctx = ServiceContext::new(state);
    let event_log = tokio::spawn(log_events(event_bus.subscribe()));

    let mut hue = None;
    if let Some(hue_config) = config.hue {
        let mut integration = HueIntegration::new(hue_config);
        integration.setup(&ctx).await?;
        integration.start_background(ctx.clone()).await?;
        hue = Some(integration);
    } else {
        tracing::info!("no [hue] section, Hue integration disabled");
    }

    let relay = config
        .cloud
        .map(|cloud| CloudRelay::new(cloud, UnsupportedDirectives));
    if let Some(relay) = &relay
        && let Err(err) = relay.start().await
    {
        tracing::warn!(error = %err, "cloud relay not connected");
    }

    tracing::info!(
        entities = ctx.state().list_entities().len(),
        "hublinkd running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    if let Some(relay) = &relay {
        relay.stop().await;
    }
    if let Some(mut integration) = hue {
        integration.teardown().await?;
    }
    event_log.abort();
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<hublink_domain::event::Event>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.event_type {
                EventType::StateChanged => tracing::debug!(data = %event.data, "state changed"),
                EventType::EntityCreated | EventType::DeviceRegistered => {
                    tracing::info!(event_type = ?event.event_type, data = %event.data, "registered");
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagging behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn run_cloud_command(config: CloudConfig, command: CloudCommand) -> Result<(), Box<dyn Error>> {
    let auth = CloudAuth::new(CognitoClient::new(&config), &config);
    match command {
        CloudCommand::Login { email, password } => {
            let user = auth.login(&email, &password).await?;
            println!("logged in as {} (thing {})", user.email, user.thing_name);
        }
        CloudCommand::Register { email, password } => {
            auth.register(&email, &password).await?;
            println!("account created, check {email} for the confirmation code");
        }
        CloudCommand::ConfirmRegister { email, code } => {
            auth.confirm_register(&email, &code).await?;
            println!("account {email} confirmed");
        }
        CloudCommand::ForgotPassword { email } => {
            auth.forgot_password(&email).await?;
            println!("reset code sent to {email}");
        }
        CloudCommand::ConfirmForgotPassword {
            email,
            code,
            new_password,
        } => {
            auth.confirm_forgot_password(&email, &code, &new_password)
                .await?;
            println!("password of {email} changed");
        }
        CloudCommand::Logout => {
            CloudRelay::new(config, UnsupportedDirectives).logout().await?;
            println!("logged out");
        }
    }
    Ok(())
}
