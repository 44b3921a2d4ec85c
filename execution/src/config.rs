use marcador_types::{
    ReferralSchedule, Score, VipSchedule, BPS_SCALE, DEFAULT_CATALOG_MAX_GOALS,
    DEFAULT_MAX_COMMIT_RETRIES, DEFAULT_NOTIFICATION_BUFFER, DEFAULT_PROFIT_BPS,
    DEFAULT_SETTLEMENT_CONCURRENCY, DEFAULT_WITHDRAWAL_FEE_BPS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::Error;

/// Tunables of the ledger and settlement engine.
///
/// Tier tables and the score catalog are data so each environment can supply its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub vip: VipSchedule,
    pub referral: ReferralSchedule,
    /// Fee kept from each withdrawal, in bps of the gross amount.
    pub withdrawal_fee_bps: u16,
    /// Rate given to catalog options of events created without explicit options.
    pub default_profit_bps: u32,
    pub score_catalog: Vec<Score>,
    /// Bets paid or refunded concurrently within one event run.
    pub settlement_concurrency: usize,
    pub max_commit_retries: u32,
    pub notification_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vip: VipSchedule::default(),
            referral: ReferralSchedule::default(),
            withdrawal_fee_bps: DEFAULT_WITHDRAWAL_FEE_BPS,
            default_profit_bps: DEFAULT_PROFIT_BPS,
            score_catalog: Score::catalog(DEFAULT_CATALOG_MAX_GOALS),
            settlement_concurrency: DEFAULT_SETTLEMENT_CONCURRENCY,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.withdrawal_fee_bps as u64 >= BPS_SCALE {
            return Err(Error::Validation(format!(
                "withdrawal_fee_bps must be below {BPS_SCALE} (got {})",
                self.withdrawal_fee_bps
            )));
        }
        if self.default_profit_bps == 0 {
            return Err(Error::Validation(
                "default_profit_bps must be positive".to_string(),
            ));
        }
        let unique: BTreeSet<_> = self.score_catalog.iter().collect();
        if unique.len() != self.score_catalog.len() {
            return Err(Error::Validation(
                "score_catalog contains duplicate scores".to_string(),
            ));
        }
        if self.settlement_concurrency == 0 {
            return Err(Error::Validation(
                "settlement_concurrency must be positive".to_string(),
            ));
        }
        if self.notification_buffer == 0 {
            return Err(Error::Validation(
                "notification_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().expect("defaults should validate");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: EngineConfig = serde_yaml::from_str(
            "withdrawal_fee_bps: 150\nscore_catalog: [\"0-0\", \"1-0\", \"0-1\"]\n",
        )
        .unwrap();
        assert_eq!(config.withdrawal_fee_bps, 150);
        assert_eq!(config.score_catalog.len(), 3);
        assert_eq!(config.vip, VipSchedule::default());
        assert_eq!(config.settlement_concurrency, DEFAULT_SETTLEMENT_CONCURRENCY);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(serde_yaml::from_str::<EngineConfig>("withdrawal_fees: 1\n").is_err());

        let config = EngineConfig {
            score_catalog: vec![Score::new(1, 0), Score::new(1, 0)],
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        let config = EngineConfig {
            withdrawal_fee_bps: 10_000,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }
}
