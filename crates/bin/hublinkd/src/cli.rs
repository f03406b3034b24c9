//! Command line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hublink daemon: Hue sensors and cloud relay
#[derive(Debug, Parser)]
#[command(name = "hublinkd", version, about)]
pub struct Cli {
    /// Path to the config file (defaults to `hublink.toml` when present)
    #[arg(short, long, global = true, env = "HUBLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the hub until interrupted (default)
    Run,

    /// Manage the cloud account
    Cloud {
        #[command(subcommand)]
        command: CloudCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CloudCommand {
    /// Log in and store the device certificate
    Login {
        email: String,
        #[arg(long, env = "HUBLINK_CLOUD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a cloud account
    Register {
        email: String,
        #[arg(long, env = "HUBLINK_CLOUD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Confirm an account with the emailed code
    ConfirmRegister { email: String, code: String },

    /// Request a password reset code
    ForgotPassword { email: String },

    /// Set a new password with the emailed reset code
    ConfirmForgotPassword {
        email: String,
        code: String,
        #[arg(long, env = "HUBLINK_CLOUD_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// Delete the stored credentials
    Logout,
}
