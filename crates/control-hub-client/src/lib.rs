//! Client facade for the control API behind the Control Hub dashboard.
//!
//! The dashboard itself is thin presentation; everything it depends on is
//! the contract implemented here: base-URL resolution from the
//! environment, bounded-timeout JSON requests, a short-TTL read cache
//! with coarse invalidation on every successful write, and non-fatal
//! failure surfacing. Reads collapse to `None` and writes to `false` on
//! any failure — the process stays interactive no matter what the
//! backend does.

mod cache;
mod client;
mod config;
mod types;

pub use client::{ControlApiError, ControlHubClient};
pub use config::{
    ControlHubConfig, DEFAULT_BASE_URL, DEFAULT_CACHE_TTL_MS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_WRITE_TIMEOUT_MS, resolve_base_url,
};
pub use types::{
    AnalyticsSnapshot, DEFAULT_SYNTHETIC_RATE, MandateDraft, MandateRecord, MandateScope,
    PaymentIntent, PaymentPlan, PaymentRail, Receipt, Toggles, TogglesUpdate,
    X402FacilitatorConfig, X402FacilitatorConfigUpdate, minor_units,
};
