use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{VoucherError, VoucherResult};

/// Block time of the target chain, used to convert requested voucher
/// lifetimes into block counts.
pub const SECONDS_PER_BLOCK: u32 = 3;

/// Smallest on-chain balance units per whole token.
pub const UNITS_PER_VARA: u128 = 1_000_000_000_000;

/// Budget allocated to a voucher when the request does not specify one.
pub const DEFAULT_VOUCHER_AMOUNT: u128 = 10_000_000_000_000;

/// Lifetime assigned to a voucher when the request does not specify one,
/// and reported for vouchers whose issuing intent is no longer known.
pub const DEFAULT_VOUCHER_DURATION_SECS: u32 = 3600;

fn decode_hex32(value: &str) -> VoucherResult<[u8; 32]> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped)
        .map_err(|err| VoucherError::Validation(format!("invalid hex identifier: {err}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        VoucherError::Validation(format!(
            "identifier must encode exactly 32 bytes, got {}",
            bytes.len()
        ))
    })
}

macro_rules! hex32_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = VoucherError;

            fn from_str(value: &str) -> VoucherResult<Self> {
                decode_hex32(value).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = VoucherError;

            fn try_from(value: String) -> VoucherResult<Self> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }
    };
}

hex32_newtype!(
    VoucherId,
    "Opaque on-chain voucher identifier, assigned by the node at issuance."
);
hex32_newtype!(AccountId, "Chain account address (32-byte public key).");
hex32_newtype!(ProgramId, "On-chain program a voucher is scoped to.");

impl VoucherId {
    /// Vouchers are keyless accounts on chain; the identifier doubles as
    /// the address holding the voucher balance.
    pub fn as_address(&self) -> AccountId {
        AccountId(self.0)
    }
}

impl AccountId {
    /// Parses an externally supplied account string. Unlike [`FromStr`],
    /// the `0x` prefix is mandatory and the total length must be exactly
    /// 66 characters; anything else is rejected before any chain call.
    pub fn parse_strict(value: &str) -> VoucherResult<Self> {
        if !value.starts_with("0x") || value.len() != 66 {
            return Err(VoucherError::Validation(format!(
                "account must be a 0x-prefixed 66-character hex string, got {} characters",
                value.len()
            )));
        }
        value.parse()
    }
}

/// The application-level intent behind an issued voucher. Not recoverable
/// from chain state, so it is cached in the metadata store at issuance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherIntent {
    #[serde(rename = "durationInSec")]
    pub duration_secs: u32,
    pub amount: u128,
}

/// Observed state of a voucher, inferred from a balance lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherStatus {
    pub exists: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_balance: Option<String>,
}

impl VoucherStatus {
    pub fn active(raw_balance: u128) -> Self {
        Self {
            exists: true,
            enabled: true,
            raw_balance: Some(format_balance(raw_balance)),
        }
    }

    pub fn missing() -> Self {
        Self {
            exists: false,
            enabled: false,
            raw_balance: None,
        }
    }
}

/// Summary of the voucher backing an `(account, program)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherDetails {
    pub voucher_id: VoucherId,
    pub vara_to_issue: u128,
    pub duration: u32,
}

/// Converts a requested lifetime in seconds to the nearest block count.
/// Widened to `u64` so rounding cannot overflow near `u32::MAX`.
pub fn duration_to_blocks(duration_secs: u32) -> u32 {
    let rounded = (u64::from(duration_secs) + u64::from(SECONDS_PER_BLOCK / 2))
        / u64::from(SECONDS_PER_BLOCK);
    rounded as u32
}

/// Whole tokens held by a raw on-chain balance, truncating dust.
pub fn normalize_balance(raw: u128) -> u128 {
    raw / UNITS_PER_VARA
}

/// Renders a raw balance with thousands separators, matching the wire
/// format the status endpoint has always produced.
pub fn format_balance(raw: u128) -> String {
    let digits = raw.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
