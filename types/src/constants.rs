/// Basis-point denominator (10_000 bps = 100%).
pub const BPS_SCALE: u64 = 10_000;

/// Maximum phone length accepted at registration.
pub const MAX_PHONE_LENGTH: usize = 32;

/// Maximum participant / tier name length.
pub const MAX_NAME_LENGTH: usize = 64;

/// Maximum invitation code length.
pub const MAX_CODE_LENGTH: usize = 16;

/// Maximum length of descriptions, references, notes and payout fields.
pub const MAX_TEXT_LENGTH: usize = 512;

/// Maximum number of ids decoded from a single id list value.
pub const MAX_INDEX_LENGTH: usize = 1 << 20;

/// Invitation codes are base-36 renderings of the user id offset by this value,
/// so the shortest code is still six characters.
pub const INVITATION_CODE_OFFSET: u64 = 36u64.pow(5);

/// Default VIP schedule: (name, lifetime deposits threshold, minimum retained balance bps).
///
/// Retained fraction decreases as the tier increases.
pub const DEFAULT_VIP_TIERS: [(&str, u64, u16); 5] = [
    ("Estándar", 0, 3_800),
    ("VIP 1", 15_000, 3_200),
    ("VIP 2", 35_000, 2_600),
    ("VIP 3", 60_000, 2_000),
    ("VIP 4", 100_000, 1_500),
];

/// Name reported while a user has not reached the first referral tier.
pub const DEFAULT_REFERRAL_BASE_NAME: &str = "Sin Nivel";

/// Default referral schedule: (name, direct referrals required, commission bps).
pub const DEFAULT_REFERRAL_TIERS: [(&str, u32, u16); 3] = [
    ("Nivel 1", 10, 200),
    ("Nivel 2", 20, 300),
    ("Nivel 3", 30, 500),
];

/// Profit rate given to catalog options when an event is created without explicit options.
pub const DEFAULT_PROFIT_BPS: u32 = 1_000;

/// Highest goal count per side in the default score catalog.
pub const DEFAULT_CATALOG_MAX_GOALS: u8 = 3;

/// Withdrawal fee (bps of the gross amount).
pub const DEFAULT_WITHDRAWAL_FEE_BPS: u16 = 0;

/// Number of bets settled or refunded concurrently within one event run.
pub const DEFAULT_SETTLEMENT_CONCURRENCY: usize = 8;

/// Re-executions allowed when an optimistic commit loses a race.
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 16;

/// Capacity of the change notification channel.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1_024;
