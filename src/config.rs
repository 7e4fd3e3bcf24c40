//! Engine configuration: tier thresholds, proposal TTL and invoice format.
use std::env;

use anyhow::ensure;

/// Boundaries used by [`crate::tier::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    /// Totals strictly below this are recommended for auto-approval.
    pub auto_approve_below: u64,
    /// Totals strictly above this go to super-admin review.
    pub super_admin_above: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            auto_approve_below: 200,
            super_admin_above: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub tiers: TierThresholds,
    pub proposal_ttl_hours: i64,
    pub invoice_prefix: String,
    pub invoice_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: TierThresholds::default(),
            proposal_ttl_hours: 48,
            invoice_prefix: "INV-".into(),
            invoice_width: 6,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `REPAIR_*` environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with variables resolved by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let tiers = defaults.tiers;

        let config = Self {
            tiers: TierThresholds {
                auto_approve_below: parse_or(
                    &lookup,
                    "REPAIR_AUTO_APPROVE_BELOW",
                    tiers.auto_approve_below,
                )?,
                super_admin_above: parse_or(
                    &lookup,
                    "REPAIR_SUPER_ADMIN_ABOVE",
                    tiers.super_admin_above,
                )?,
            },
            proposal_ttl_hours: parse_or(
                &lookup,
                "REPAIR_PROPOSAL_TTL_HOURS",
                defaults.proposal_ttl_hours,
            )?,
            invoice_prefix: lookup("REPAIR_INVOICE_PREFIX").unwrap_or(defaults.invoice_prefix),
            invoice_width: parse_or(&lookup, "REPAIR_INVOICE_WIDTH", defaults.invoice_width)?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.tiers.auto_approve_below <= self.tiers.super_admin_above,
            "auto-approve threshold {} exceeds super-admin threshold {}",
            self.tiers.auto_approve_below,
            self.tiers.super_admin_above
        );
        ensure!(self.proposal_ttl_hours > 0, "proposal TTL must be positive");
        ensure!(self.invoice_width > 0, "invoice width must be positive");
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is not valid: {e}")),
        None => Ok(default),
    }
}
