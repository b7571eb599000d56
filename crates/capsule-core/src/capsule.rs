//! Capsule data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::crypto::SealedPayload;
use crate::error::{CapsuleError, Result};
use crate::identity::BtcAddress;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Longest custom delay accepted (100 years).
pub const MAX_CUSTOM_DELAY_SECS: u64 = 36_500 * DAY;

/// Position of a capsule in its owner's list.
///
/// Indices are 0-based, dense per owner, and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleId(u32);

impl CapsuleId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for CapsuleId {
    type Err = CapsuleError;

    /// Accepts `3` or `#3`.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .map(CapsuleId)
            .map_err(|_| CapsuleError::InvalidInput(format!("Invalid capsule index: {}", value)))
    }
}

/// How long a capsule stays sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockDelay {
    OneDay,
    SevenDays,
    ThirtyDays,
    /// Any positive duration; only accepted when the vault allows custom delays.
    Custom { secs: u64 },
}

impl UnlockDelay {
    /// Map a stored delay back to its variant.
    pub fn from_secs(secs: u64) -> Result<Self> {
        match secs {
            0 => Err(CapsuleError::InvalidInput(
                "Unlock delay must be positive".to_string(),
            )),
            s if s == DAY => Ok(UnlockDelay::OneDay),
            s if s == 7 * DAY => Ok(UnlockDelay::SevenDays),
            s if s == 30 * DAY => Ok(UnlockDelay::ThirtyDays),
            s if s > MAX_CUSTOM_DELAY_SECS => Err(CapsuleError::InvalidInput(format!(
                "Unlock delay too long (max {} days)",
                MAX_CUSTOM_DELAY_SECS / DAY
            ))),
            s => Ok(UnlockDelay::Custom { secs: s }),
        }
    }

    pub fn as_secs(self) -> u64 {
        match self {
            UnlockDelay::OneDay => DAY,
            UnlockDelay::SevenDays => 7 * DAY,
            UnlockDelay::ThirtyDays => 30 * DAY,
            UnlockDelay::Custom { secs } => secs,
        }
    }

    pub fn duration(self) -> Duration {
        // Bounded by MAX_CUSTOM_DELAY_SECS, far below chrono's limit.
        Duration::seconds(self.as_secs().min(MAX_CUSTOM_DELAY_SECS) as i64)
    }

    pub fn is_preset(self) -> bool {
        !matches!(self, UnlockDelay::Custom { .. })
    }

    /// Human-readable form used in confirmations, e.g. "7 days".
    pub fn describe(self) -> String {
        let (amount, unit) = largest_unit(self.as_secs());
        let noun = match unit {
            'd' => "day",
            'h' => "hour",
            'm' => "minute",
            _ => "second",
        };
        if amount == 1 {
            format!("1 {}", noun)
        } else {
            format!("{} {}s", amount, noun)
        }
    }
}

fn largest_unit(secs: u64) -> (u64, char) {
    if secs % DAY == 0 {
        (secs / DAY, 'd')
    } else if secs % HOUR == 0 {
        (secs / HOUR, 'h')
    } else if secs % MINUTE == 0 {
        (secs / MINUTE, 'm')
    } else {
        (secs, 's')
    }
}

impl fmt::Display for UnlockDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (amount, unit) = largest_unit(self.as_secs());
        write!(f, "{}{}", amount, unit)
    }
}

impl FromStr for UnlockDelay {
    type Err = CapsuleError;

    /// Parse `1d`, `7d`, `30d`, or any `<number><unit>` with unit d/h/m/s.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim().to_ascii_lowercase();
        if trimmed.len() < 2 {
            return Err(CapsuleError::InvalidInput(format!(
                "Invalid delay: {} (expected <number><unit>, e.g. 7d)",
                value
            )));
        }

        let (num_str, unit) = trimmed.split_at(trimmed.len() - 1);
        let amount: u64 = num_str
            .parse()
            .map_err(|_| CapsuleError::InvalidInput(format!("Invalid delay number: {}", value)))?;

        let scale = match unit {
            "d" => DAY,
            "h" => HOUR,
            "m" => MINUTE,
            "s" => 1,
            _ => {
                return Err(CapsuleError::InvalidInput(format!(
                    "Invalid delay unit: {} (use d/h/m/s)",
                    unit
                )))
            }
        };

        let secs = amount
            .checked_mul(scale)
            .ok_or_else(|| CapsuleError::InvalidInput(format!("Delay too long: {}", value)))?;
        UnlockDelay::from_secs(secs)
    }
}

impl Serialize for UnlockDelay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle state of a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleStatus {
    Locked,
    Unlocked,
}

impl CapsuleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CapsuleStatus::Locked => "locked",
            CapsuleStatus::Unlocked => "unlocked",
        }
    }
}

/// Which policy authorized an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    TimeLock,
    GuardianQuorum,
    Forced,
}

impl UnlockMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            UnlockMethod::TimeLock => "time_lock",
            UnlockMethod::GuardianQuorum => "guardian_quorum",
            UnlockMethod::Forced => "forced",
        }
    }

    pub(crate) fn parse(value: &str) -> Result<Self> {
        match value {
            "time_lock" => Ok(UnlockMethod::TimeLock),
            "guardian_quorum" => Ok(UnlockMethod::GuardianQuorum),
            "forced" => Ok(UnlockMethod::Forced),
            other => Err(CapsuleError::Storage(format!(
                "Unknown unlock method: {}",
                other
            ))),
        }
    }
}

/// The `Locked -> Unlocked` transition, recorded once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockRecord {
    pub unlocked_at: DateTime<Utc>,
    pub method: UnlockMethod,
    /// Distinct guardians whose attestations met quorum; empty otherwise.
    pub attestations: Vec<BtcAddress>,
}

/// A stored capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    pub owner: BtcAddress,
    pub id: CapsuleId,
    pub sealed: SealedPayload,
    pub created_at: DateTime<Utc>,
    pub unlock_delay: UnlockDelay,
    /// Fixed at creation: `created_at + unlock_delay`.
    pub unlock_time: DateTime<Utc>,
    pub unlocked: Option<UnlockRecord>,
}

impl Capsule {
    pub fn status(&self) -> CapsuleStatus {
        if self.unlocked.is_some() {
            CapsuleStatus::Unlocked
        } else {
            CapsuleStatus::Locked
        }
    }

    pub fn is_time_unlockable(&self, now: DateTime<Utc>) -> bool {
        now >= self.unlock_time
    }

    pub fn summary(&self) -> CapsuleSummary {
        CapsuleSummary {
            index: self.id,
            created_at: self.created_at,
            unlock_delay: self.unlock_delay,
            unlock_time: self.unlock_time,
            status: self.status(),
            unlocked: self.unlocked.clone(),
        }
    }
}

/// What `list_capsules` shows: everything except the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapsuleSummary {
    pub index: CapsuleId,
    pub created_at: DateTime<Utc>,
    pub unlock_delay: UnlockDelay,
    pub unlock_time: DateTime<Utc>,
    pub status: CapsuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<UnlockRecord>,
}

/// Result of a successful `create_capsule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapsuleReceipt {
    pub index: CapsuleId,
    pub unlock_time: DateTime<Utc>,
    pub confirmation: String,
}

impl CapsuleReceipt {
    pub(crate) fn new(capsule: &Capsule) -> Self {
        let confirmation = format!(
            "Time capsule {} sealed; unlocks in {} at {}",
            capsule.id,
            capsule.unlock_delay.describe(),
            capsule.unlock_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Self {
            index: capsule.id,
            unlock_time: capsule.unlock_time,
            confirmation,
        }
    }
}

/// Reject empty or oversized messages.
pub fn validate_message(message: &[u8], max_bytes: usize) -> Result<()> {
    if message.is_empty() {
        return Err(CapsuleError::InvalidInput(
            "Capsule message cannot be empty".to_string(),
        ));
    }
    if message.len() > max_bytes {
        return Err(CapsuleError::InvalidInput(format!(
            "Capsule message too large ({} bytes, max {})",
            message.len(),
            max_bytes
        )));
    }
    Ok(())
}

/// Reject custom delays unless the vault allows them.
pub fn validate_delay(delay: UnlockDelay, allow_custom: bool) -> Result<()> {
    if !delay.is_preset() && !allow_custom {
        return Err(CapsuleError::InvalidInput(format!(
            "Unlock delay {} is not allowed (choose 1d, 7d or 30d)",
            delay
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_id_parse_and_display() {
        assert_eq!("3".parse::<CapsuleId>().unwrap(), CapsuleId::new(3));
        assert_eq!("#12".parse::<CapsuleId>().unwrap(), CapsuleId::new(12));
        assert_eq!(CapsuleId::new(0).to_string(), "#0");
        assert!("-1".parse::<CapsuleId>().is_err());
        assert!("first".parse::<CapsuleId>().is_err());
    }

    #[test]
    fn test_delay_presets() {
        assert_eq!("1d".parse::<UnlockDelay>().unwrap(), UnlockDelay::OneDay);
        assert_eq!("7d".parse::<UnlockDelay>().unwrap(), UnlockDelay::SevenDays);
        assert_eq!("30D".parse::<UnlockDelay>().unwrap(), UnlockDelay::ThirtyDays);
        assert_eq!("24h".parse::<UnlockDelay>().unwrap(), UnlockDelay::OneDay);
    }

    #[test]
    fn test_delay_custom() {
        let delay: UnlockDelay = "90m".parse().unwrap();
        assert_eq!(delay, UnlockDelay::Custom { secs: 5400 });
        assert!(!delay.is_preset());
        assert_eq!(delay.to_string(), "90m");
        assert_eq!(delay.describe(), "90 minutes");
    }

    #[test]
    fn test_delay_rejects_bad_input() {
        assert!("0d".parse::<UnlockDelay>().is_err());
        assert!("d".parse::<UnlockDelay>().is_err());
        assert!("7w".parse::<UnlockDelay>().is_err());
        assert!("-5s".parse::<UnlockDelay>().is_err());
        assert!("99999999999999999d".parse::<UnlockDelay>().is_err());
    }

    #[test]
    fn test_delay_describe() {
        assert_eq!(UnlockDelay::OneDay.describe(), "1 day");
        assert_eq!(UnlockDelay::ThirtyDays.describe(), "30 days");
        assert_eq!(UnlockDelay::Custom { secs: 1 }.describe(), "1 second");
    }

    #[test]
    fn test_validate_delay_policy() {
        assert!(validate_delay(UnlockDelay::SevenDays, false).is_ok());
        assert!(validate_delay(UnlockDelay::Custom { secs: 60 }, false).is_err());
        assert!(validate_delay(UnlockDelay::Custom { secs: 60 }, true).is_ok());
    }

    #[test]
    fn test_validate_message_bounds() {
        assert!(validate_message(b"", 10).is_err());
        assert!(validate_message(b"hello", 5).is_ok());
        assert!(validate_message(b"hello!", 5).is_err());
    }

    #[test]
    fn test_unlock_method_round_trip() {
        for method in [
            UnlockMethod::TimeLock,
            UnlockMethod::GuardianQuorum,
            UnlockMethod::Forced,
        ] {
            assert_eq!(UnlockMethod::parse(method.as_str()).unwrap(), method);
        }
        assert!(UnlockMethod::parse("magic").is_err());
    }
}
