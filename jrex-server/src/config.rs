//! Dispatcher configuration
//!
//! [`ServerConfig`] is an immutable snapshot. The dispatcher reads it once
//! per request, and a running server can swap it as a whole with
//! `JsonRpcServer::replace_config`.
//!
//! # Environment Variables
//!
//! [`ServerConfig::from_env`] starts from the defaults and applies:
//!
//! - `JREX_LEGACY_MODE`: accept requests without a `jsonrpc` member (default: true)
//! - `JREX_ALLOW_EXTRA_PARAMS`: accept more params than declared (default: false)
//! - `JREX_ALLOW_FEWER_PARAMS`: accept fewer params than declared (default: false)
//! - `JREX_RETHROW_FAILURES`: return invocation failures from `handle` (default: false)
//!
//! Each accepts `true`/`false`/`1`/`0`; anything else keeps the default and
//! logs a warning.

use std::env;

/// Dispatcher behaviour toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Accept requests without a `jsonrpc` member
    pub legacy_mode: bool,
    /// Let an operation match when more params are given than it declares
    pub allow_extra_params: bool,
    /// Let an operation match when fewer params are given than it declares
    pub allow_fewer_params: bool,
    /// Return invocation failures to the caller of `handle` after answering
    pub rethrow_failures: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            legacy_mode: true,
            allow_extra_params: false,
            allow_fewer_params: false,
            rethrow_failures: false,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `JREX_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            legacy_mode: env_flag("JREX_LEGACY_MODE", defaults.legacy_mode),
            allow_extra_params: env_flag("JREX_ALLOW_EXTRA_PARAMS", defaults.allow_extra_params),
            allow_fewer_params: env_flag("JREX_ALLOW_FEWER_PARAMS", defaults.allow_fewer_params),
            rethrow_failures: env_flag("JREX_RETHROW_FAILURES", defaults.rethrow_failures),
        }
    }

    /// Set legacy mode
    pub fn with_legacy_mode(mut self, enabled: bool) -> Self {
        self.legacy_mode = enabled;
        self
    }

    /// Allow extra params
    pub fn with_allow_extra_params(mut self, enabled: bool) -> Self {
        self.allow_extra_params = enabled;
        self
    }

    /// Allow fewer params
    pub fn with_allow_fewer_params(mut self, enabled: bool) -> Self {
        self.allow_fewer_params = enabled;
        self
    }

    /// Re-raise invocation failures
    pub fn with_rethrow_failures(mut self, enabled: bool) -> Self {
        self.rethrow_failures = enabled;
        self
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            tracing::warn!(variable = name, value = %value, "Ignoring unrecognised flag value");
            default
        }),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
