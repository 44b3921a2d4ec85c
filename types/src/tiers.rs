//! VIP and referral tier calculators.
//!
//! Both are pure functions over ledger-derived aggregates. The schedules are
//! configuration data; a schedule value can only exist once it has been validated.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::{
    BPS_SCALE, DEFAULT_REFERRAL_BASE_NAME, DEFAULT_REFERRAL_TIERS, DEFAULT_VIP_TIERS,
    MAX_NAME_LENGTH,
};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule has no tiers")]
    Empty,
    #[error("first VIP tier must start at 0 deposits (got {0})")]
    FirstThresholdNotZero(u64),
    #[error("tier thresholds must be strictly increasing (tier {index})")]
    NotIncreasing { index: usize },
    #[error("tier rate out of range (tier {index}, bps={bps})")]
    RateOutOfRange { index: usize, bps: u16 },
    #[error("tier name invalid (tier {index})")]
    InvalidName { index: usize },
}

fn valid_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= MAX_NAME_LENGTH
}

fn apply_bps(amount: u64, bps: u16) -> u64 {
    ((amount as u128) * (bps as u128) / (BPS_SCALE as u128)) as u64
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipTier {
    pub name: String,
    /// Lifetime deposits needed to reach this tier.
    pub min_deposited: u64,
    /// Fraction of lifetime deposits that must stay in the wallet.
    pub min_balance_bps: u16,
}

/// Ordered VIP tiers keyed by lifetime deposits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VipTier>", into = "Vec<VipTier>")]
pub struct VipSchedule {
    tiers: Vec<VipTier>,
}

impl TryFrom<Vec<VipTier>> for VipSchedule {
    type Error = ScheduleError;

    fn try_from(tiers: Vec<VipTier>) -> Result<Self, Self::Error> {
        let first = tiers.first().ok_or(ScheduleError::Empty)?;
        if first.min_deposited != 0 {
            return Err(ScheduleError::FirstThresholdNotZero(first.min_deposited));
        }
        for (index, tier) in tiers.iter().enumerate() {
            if !valid_name(&tier.name) {
                return Err(ScheduleError::InvalidName { index });
            }
            if tier.min_balance_bps as u64 > BPS_SCALE {
                return Err(ScheduleError::RateOutOfRange {
                    index,
                    bps: tier.min_balance_bps,
                });
            }
            if index > 0 && tier.min_deposited <= tiers[index - 1].min_deposited {
                return Err(ScheduleError::NotIncreasing { index });
            }
        }
        Ok(Self { tiers })
    }
}

impl From<VipSchedule> for Vec<VipTier> {
    fn from(schedule: VipSchedule) -> Self {
        schedule.tiers
    }
}

impl Default for VipSchedule {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_VIP_TIERS
                .iter()
                .map(|(name, min_deposited, min_balance_bps)| VipTier {
                    name: name.to_string(),
                    min_deposited: *min_deposited,
                    min_balance_bps: *min_balance_bps,
                })
                .collect(),
        }
    }
}

/// VIP position of a wallet and the withdrawal floor it implies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VipStatus {
    pub level: usize,
    pub tier: VipTier,
    pub next_tier: Option<VipTier>,
    /// Linear progress from the current threshold to the next one (10_000 at max tier).
    pub progress_bps: u16,
    pub remaining_to_next: u64,
    pub min_balance_required: u64,
    pub max_withdrawal: u64,
}

impl VipSchedule {
    pub fn tiers(&self) -> &[VipTier] {
        &self.tiers
    }

    pub fn level(&self, total_deposited: u64) -> usize {
        self.tiers
            .iter()
            .rposition(|tier| tier.min_deposited <= total_deposited)
            .unwrap_or(0)
    }

    pub fn status(&self, total_deposited: u64, balance: u64) -> VipStatus {
        let level = self.level(total_deposited);
        let tier = &self.tiers[level];
        let next_tier = self.tiers.get(level + 1);

        let (progress_bps, remaining_to_next) = match next_tier {
            Some(next) => {
                let span = next.min_deposited - tier.min_deposited;
                let done = total_deposited - tier.min_deposited;
                let progress = (done as u128) * (BPS_SCALE as u128) / (span as u128);
                (progress as u16, next.min_deposited - total_deposited)
            }
            None => (BPS_SCALE as u16, 0),
        };

        let min_balance_required = if balance > 0 {
            apply_bps(total_deposited, tier.min_balance_bps).max(1)
        } else {
            0
        };

        VipStatus {
            level,
            tier: tier.clone(),
            next_tier: next_tier.cloned(),
            progress_bps,
            remaining_to_next,
            min_balance_required,
            max_withdrawal: balance.saturating_sub(min_balance_required),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralTier {
    pub name: String,
    pub min_referrals: u32,
    pub rate_bps: u16,
}

#[derive(Deserialize)]
struct RawReferralSchedule {
    base_name: String,
    tiers: Vec<ReferralTier>,
}

/// Commission tiers keyed by direct-referral count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReferralSchedule")]
pub struct ReferralSchedule {
    base_name: String,
    tiers: Vec<ReferralTier>,
}

impl ReferralSchedule {
    pub fn new(base_name: String, tiers: Vec<ReferralTier>) -> Result<Self, ScheduleError> {
        if tiers.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if !valid_name(&base_name) {
            return Err(ScheduleError::InvalidName { index: 0 });
        }
        let mut previous = 0;
        for (index, tier) in tiers.iter().enumerate() {
            if !valid_name(&tier.name) {
                return Err(ScheduleError::InvalidName { index });
            }
            if tier.rate_bps as u64 > BPS_SCALE {
                return Err(ScheduleError::RateOutOfRange {
                    index,
                    bps: tier.rate_bps,
                });
            }
            if tier.min_referrals <= previous {
                return Err(ScheduleError::NotIncreasing { index });
            }
            previous = tier.min_referrals;
        }
        Ok(Self { base_name, tiers })
    }

    pub fn tiers(&self) -> &[ReferralTier] {
        &self.tiers
    }

    pub fn status(&self, referrals: u32) -> ReferralStatus {
        let reached = self
            .tiers
            .iter()
            .rposition(|tier| tier.min_referrals <= referrals);
        let next_index = reached.map(|index| index + 1).unwrap_or(0);
        let next_tier = self.tiers.get(next_index).cloned();
        let remaining_for_next = next_tier
            .as_ref()
            .map(|next| next.min_referrals - referrals)
            .unwrap_or(0);

        match reached {
            Some(index) => {
                let tier = &self.tiers[index];
                ReferralStatus {
                    referrals,
                    level: index + 1,
                    tier_name: tier.name.clone(),
                    rate_bps: tier.rate_bps,
                    next_tier,
                    remaining_for_next,
                }
            }
            None => ReferralStatus {
                referrals,
                level: 0,
                tier_name: self.base_name.clone(),
                rate_bps: 0,
                next_tier,
                remaining_for_next,
            },
        }
    }
}

impl TryFrom<RawReferralSchedule> for ReferralSchedule {
    type Error = ScheduleError;

    fn try_from(raw: RawReferralSchedule) -> Result<Self, Self::Error> {
        Self::new(raw.base_name, raw.tiers)
    }
}

impl Default for ReferralSchedule {
    fn default() -> Self {
        Self {
            base_name: DEFAULT_REFERRAL_BASE_NAME.to_string(),
            tiers: DEFAULT_REFERRAL_TIERS
                .iter()
                .map(|(name, min_referrals, rate_bps)| ReferralTier {
                    name: name.to_string(),
                    min_referrals: *min_referrals,
                    rate_bps: *rate_bps,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferralStatus {
    pub referrals: u32,
    /// 0 while below the first tier.
    pub level: usize,
    pub tier_name: String,
    pub rate_bps: u16,
    pub next_tier: Option<ReferralTier>,
    pub remaining_for_next: u32,
}

impl ReferralStatus {
    /// Commission owed on `amount` at the current rate.
    pub fn commission_on(&self, amount: u64) -> u64 {
        apply_bps(amount, self.rate_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vip_floor_for_first_tier_boundary() {
        let schedule = VipSchedule::default();
        let status = schedule.status(15_000, 10_000);
        assert_eq!(status.tier.name, "VIP 1");
        assert_eq!(status.tier.min_balance_bps, 3_200);
        assert_eq!(status.min_balance_required, 4_800);
        assert_eq!(status.max_withdrawal, 5_200);
        assert_eq!(status.next_tier.as_ref().map(|t| t.name.as_str()), Some("VIP 2"));
        assert_eq!(status.remaining_to_next, 20_000);
        assert_eq!(status.progress_bps, 0);
    }

    #[test]
    fn vip_minimum_is_at_least_one_unit_when_funded() {
        let schedule = VipSchedule::default();
        let status = schedule.status(0, 50);
        assert_eq!(status.min_balance_required, 1);
        assert_eq!(status.max_withdrawal, 49);

        let empty = schedule.status(10_000, 0);
        assert_eq!(empty.min_balance_required, 0);
        assert_eq!(empty.max_withdrawal, 0);
    }

    #[test]
    fn vip_progress_is_linear_and_saturates_at_max_tier() {
        let schedule = VipSchedule::default();
        let halfway = schedule.status(25_000, 0);
        assert_eq!(halfway.level, 1);
        assert_eq!(halfway.progress_bps, 5_000);

        let top = schedule.status(250_000, 100_000);
        assert_eq!(top.tier.name, "VIP 4");
        assert!(top.next_tier.is_none());
        assert_eq!(top.progress_bps, 10_000);
        assert_eq!(top.min_balance_required, 37_500);
        assert_eq!(top.max_withdrawal, 62_500);
    }

    #[test]
    fn vip_retained_fraction_decreases_with_tier() {
        let schedule = VipSchedule::default();
        let rates: Vec<u16> = schedule.tiers().iter().map(|t| t.min_balance_bps).collect();
        assert_eq!(rates.first(), Some(&3_800));
        assert_eq!(rates.last(), Some(&1_500));
        assert!(rates.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn vip_schedule_rejects_bad_tables() {
        assert_eq!(VipSchedule::try_from(vec![]), Err(ScheduleError::Empty));
        let tier = |min_deposited, min_balance_bps| VipTier {
            name: "t".to_string(),
            min_deposited,
            min_balance_bps,
        };
        assert_eq!(
            VipSchedule::try_from(vec![tier(5, 100)]),
            Err(ScheduleError::FirstThresholdNotZero(5))
        );
        assert_eq!(
            VipSchedule::try_from(vec![tier(0, 100), tier(0, 50)]),
            Err(ScheduleError::NotIncreasing { index: 1 })
        );
        assert_eq!(
            VipSchedule::try_from(vec![tier(0, 10_001)]),
            Err(ScheduleError::RateOutOfRange { index: 0, bps: 10_001 })
        );
    }

    #[test]
    fn referral_tier_boundaries() {
        let schedule = ReferralSchedule::default();

        let nine = schedule.status(9);
        assert_eq!(nine.tier_name, "Sin Nivel");
        assert_eq!(nine.rate_bps, 0);
        assert_eq!(nine.remaining_for_next, 1);

        let ten = schedule.status(10);
        assert_eq!(ten.tier_name, "Nivel 1");
        assert_eq!(ten.rate_bps, 200);
        assert_eq!(ten.remaining_for_next, 10);

        let nineteen = schedule.status(19);
        assert_eq!(nineteen.rate_bps, 200);

        let twenty = schedule.status(20);
        assert_eq!(twenty.tier_name, "Nivel 2");
        assert_eq!(twenty.rate_bps, 300);

        let top = schedule.status(45);
        assert_eq!(top.tier_name, "Nivel 3");
        assert_eq!(top.rate_bps, 500);
        assert!(top.next_tier.is_none());
        assert_eq!(top.remaining_for_next, 0);
    }

    #[test]
    fn referral_commission_uses_current_rate() {
        let schedule = ReferralSchedule::default();
        assert_eq!(schedule.status(3).commission_on(1_000), 0);
        assert_eq!(schedule.status(12).commission_on(1_000), 20);
        assert_eq!(schedule.status(30).commission_on(1_000), 50);
    }

    #[test]
    fn schedules_load_from_yaml() {
        let vip: VipSchedule = serde_yaml::from_str(
            "- { name: Base, min_deposited: 0, min_balance_bps: 5000 }\n\
             - { name: Gold, min_deposited: 1000, min_balance_bps: 1000 }\n",
        )
        .unwrap();
        assert_eq!(vip.status(1_000, 400).min_balance_required, 100);

        let invalid = serde_yaml::from_str::<VipSchedule>(
            "- { name: Base, min_deposited: 10, min_balance_bps: 5000 }\n",
        );
        assert!(invalid.is_err());

        let referral: ReferralSchedule = serde_yaml::from_str(
            "base_name: Ninguno\ntiers:\n  - { name: Uno, min_referrals: 2, rate_bps: 100 }\n",
        )
        .unwrap();
        assert_eq!(referral.status(1).tier_name, "Ninguno");
        assert_eq!(referral.status(2).rate_bps, 100);
    }
}
