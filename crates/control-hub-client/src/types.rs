use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_SYNTHETIC_RATE: u32 = 10;

/// Converts a major-unit amount to integer minor units (cents). Amounts
/// crossing the API boundary are always integral; fractional minor units
/// are never sent.
#[must_use]
pub fn minor_units(major: f64) -> i64 {
    (major * 100.0).round() as i64
}

/// Feature-flag singleton as returned by `GET /api/admin/toggles`. Missing
/// fields take the backend's documented defaults; `SYNTHETIC_RATE` arrives
/// as either a string or an integer and is coerced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toggles {
    #[serde(rename = "LOOP_ENABLED", default)]
    pub loop_enabled: bool,
    #[serde(rename = "SANDBOX_MODE", default)]
    pub sandbox_mode: bool,
    #[serde(rename = "SYNTHETIC_AGENTS", default)]
    pub synthetic_agents: bool,
    #[serde(
        rename = "SYNTHETIC_RATE",
        default = "default_synthetic_rate",
        deserialize_with = "coerce_synthetic_rate"
    )]
    pub synthetic_rate: u32,
    #[serde(rename = "PAYMENTS_DRY_RUN", default = "default_true")]
    pub payments_dry_run: bool,
    #[serde(rename = "X402_LIVE", default)]
    pub x402_live: bool,
    #[serde(rename = "VISA_AI_LIVE", default)]
    pub visa_ai_live: bool,
}

impl Toggles {
    /// Replacement payload carrying the writable fields at their current
    /// values, ready for selective mutation before resubmission.
    #[must_use]
    pub fn to_update(&self) -> TogglesUpdate {
        TogglesUpdate {
            loop_enabled: self.loop_enabled,
            sandbox_mode: self.sandbox_mode,
            synthetic_agents: self.synthetic_agents,
            synthetic_rate: self.synthetic_rate,
        }
    }
}

/// Body for `PUT /api/admin/toggles`. Full-replace semantics: every field
/// the client knows about is sent on each write. The rate travels as a
/// string, matching what the backend stores.
#[derive(Debug, Clone, Serialize)]
pub struct TogglesUpdate {
    #[serde(rename = "LOOP_ENABLED")]
    pub loop_enabled: bool,
    #[serde(rename = "SANDBOX_MODE")]
    pub sandbox_mode: bool,
    #[serde(rename = "SYNTHETIC_AGENTS")]
    pub synthetic_agents: bool,
    #[serde(rename = "SYNTHETIC_RATE", serialize_with = "rate_as_string")]
    pub synthetic_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MandateScope {
    Tip,
    Purchase,
    Subscription,
}

impl MandateScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tip => "TIP",
            Self::Purchase => "PURCHASE",
            Self::Subscription => "SUBSCRIPTION",
        }
    }
}

impl std::str::FromStr for MandateScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_uppercase().as_str() {
            "TIP" => Ok(Self::Tip),
            "PURCHASE" => Ok(Self::Purchase),
            "SUBSCRIPTION" => Ok(Self::Subscription),
            other => Err(format!("unknown mandate scope '{other}'")),
        }
    }
}

/// Mandate as submitted to `POST /api/mandates` and inside an execute call.
/// The write side of the API speaks camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateDraft {
    #[serde(rename = "issuerDID")]
    pub issuer_did: String,
    #[serde(rename = "subjectDID")]
    pub subject_did: String,
    pub scope: MandateScope,
    /// Integer minor currency units.
    #[serde(rename = "maxAmountMinor")]
    pub max_amount_minor: i64,
    pub currency: String,
    /// Epoch milliseconds.
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Stored mandate row as listed by `GET /api/mandates`. The read side of
/// the API speaks snake_case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateRecord {
    pub id: i64,
    pub issuer_did: String,
    pub subject_did: String,
    pub scope: MandateScope,
    pub max_amount_minor: i64,
    pub currency: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentRail {
    X402,
    Card,
}

impl PaymentRail {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X402 => "X402",
            Self::Card => "CARD",
        }
    }
}

impl std::str::FromStr for PaymentRail {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_uppercase().as_str() {
            "X402" => Ok(Self::X402),
            "CARD" => Ok(Self::Card),
            other => Err(format!("unknown payment rail '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Integer minor currency units; see [`minor_units`].
    pub amount_minor: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub counterparty: String,
    pub rail: PaymentRail,
}

/// Combined body for `POST /api/execute`. Mandate and intent travel in a
/// single call so no client-side transaction spans two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub mandate: MandateDraft,
    pub intent: PaymentIntent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub rail: String,
    pub status: String,
    /// Epoch milliseconds.
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    #[serde(default)]
    pub payload: Value,
}

impl Receipt {
    #[must_use]
    pub fn memo(&self) -> Option<&str> {
        self.payload.get("memo").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub window_minutes: u32,
    pub total: u64,
    pub per_min: f64,
    pub success_rate: f64,
    #[serde(default)]
    pub by_rail: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_status: BTreeMap<String, u64>,
    pub since: i64,
    pub now: i64,
}

/// Wrapper around `GET /api/webhooks/inbound`, which nests the log under
/// an `events` key.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InboundEvents {
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Coinbase x402 facilitator settings as read back from the backend. Key
/// material comes back redacted, so both key fields are optional here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402FacilitatorConfig {
    pub facilitator_url: String,
    pub wallet_address: String,
    #[serde(default)]
    pub api_key_id: Option<String>,
    #[serde(default)]
    pub api_key_secret: Option<String>,
}

/// Full facilitator settings for `POST /api/admin/x402-config`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct X402FacilitatorConfigUpdate {
    pub facilitator_url: String,
    pub wallet_address: String,
    pub api_key_id: String,
    pub api_key_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct X402ConfigEnvelope {
    #[serde(default)]
    pub config: Option<X402FacilitatorConfig>,
}

fn default_synthetic_rate() -> u32 {
    DEFAULT_SYNTHETIC_RATE
}

fn default_true() -> bool {
    true
}

fn coerce_synthetic_rate<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or(DEFAULT_SYNTHETIC_RATE),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|wide| u32::try_from(wide).ok())
            .unwrap_or(DEFAULT_SYNTHETIC_RATE),
        _ => DEFAULT_SYNTHETIC_RATE,
    })
}

fn rate_as_string<S>(rate: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&rate.to_string())
}
