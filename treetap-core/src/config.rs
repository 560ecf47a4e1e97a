//! treetap-core/src/config.rs
//!
//! Runtime knobs for the services. Loaded from the environment (and `.env` if present).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use treetap_common::Error;

pub const DEFAULT_MAX_ASSIGN_ATTEMPTS: usize = 32;
pub const DEFAULT_NOTIFY_FROM: &str = "treetap.yyy@gmail.com";

/// What approving an already-approved advertisement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReapprovalPolicy {
    /// Refuse with `AlreadyApproved`; counters and NGO stay as they are.
    #[default]
    Reject,
    /// Legacy behavior: approve again, overwrite the NGO and reset `trees_planted` to 0
    /// even though coupons were already redeemed.
    ResetCounter,
}

impl FromStr for ReapprovalPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ReapprovalPolicy::Reject),
            "reset" | "reset_counter" => Ok(ReapprovalPolicy::ResetCounter),
            other => Err(Error::Config(format!(
                "unknown reapproval policy '{other}' (expected 'reject' or 'reset')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// The only identity allowed to run admin operations.
    pub admin_email: String,
    /// Upper bound on select-then-assign rounds for a single `plant_tree`.
    pub max_assign_attempts: usize,
    pub reapproval: ReapprovalPolicy,
    /// Sender address stamped on outgoing notifications.
    pub notify_from: String,
}

impl CoreConfig {
    pub fn new(admin_email: &str) -> Self {
        Self {
            admin_email: admin_email.to_string(),
            max_assign_attempts: DEFAULT_MAX_ASSIGN_ATTEMPTS,
            reapproval: ReapprovalPolicy::default(),
            notify_from: DEFAULT_NOTIFY_FROM.to_string(),
        }
    }

    pub fn with_reapproval(mut self, policy: ReapprovalPolicy) -> Self {
        self.reapproval = policy;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_assign_attempts(mut self, attempts: usize) -> Self {
        self.max_assign_attempts = attempts.max(1);
        self
    }

    /// Reads `ADMIN_EMAIL`, `TREETAP_MAX_ASSIGN_ATTEMPTS`, `TREETAP_REAPPROVAL` and
    /// `TREETAP_NOTIFY_FROM`, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_email = lookup("ADMIN_EMAIL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("ADMIN_EMAIL must be set".into()))?;

        let mut config = CoreConfig::new(&admin_email);

        if let Some(raw) = lookup("TREETAP_MAX_ASSIGN_ATTEMPTS") {
            let attempts: usize = raw.trim().parse().map_err(|_| {
                Error::Config(format!("TREETAP_MAX_ASSIGN_ATTEMPTS must be a positive integer, got '{raw}'"))
            })?;
            if attempts == 0 {
                return Err(Error::Config("TREETAP_MAX_ASSIGN_ATTEMPTS must be at least 1".into()));
            }
            config.max_assign_attempts = attempts;
        }

        if let Some(raw) = lookup("TREETAP_REAPPROVAL") {
            config.reapproval = raw.parse()?;
        }

        if let Some(from) = lookup("TREETAP_NOTIFY_FROM") {
            config.notify_from = from;
        }

        Ok(config)
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        identity == self.admin_email
    }
}
