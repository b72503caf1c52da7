//! Command-line interface for Docuvault.
//!
//! Account provisioning deliberately lives here instead of the HTTP API:
//! the server exposes authentication only, and an operator manages
//! accounts from the box the data lives on.

use clap::{Parser, Subcommand};

/// Docuvault - document management backend
#[derive(Parser)]
#[command(name = "docuvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    #[command(alias = "-s", alias = "--serve")]
    Serve,

    /// Create an account
    CreateUser {
        username: String,

        /// One of: admin, editor, viewer
        role: String,

        password: String,
    },

    /// List accounts with their role and lock state
    ListUsers,

    /// Disable an account so it can no longer log in
    DisableUser {
        username: String,
    },

    /// Reactivate a locked or disabled account and zero its attempt counter
    UnlockUser {
        username: String,
    },
}
