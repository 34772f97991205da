pub mod black_scholes;

use crate::errors::{IpvError, IpvResult};
use std::str::FromStr;

/// All pricing models implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync required for sharing across axum handlers.
pub trait PricingModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Price a European option and its Greeks. Fails without a partial result.
    fn price(&self, req: &PricingRequest) -> IpvResult<PricingResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl FromStr for OptionType {
    type Err = IpvError;

    /// Case-insensitive; anything other than "call" or "put" is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            _ => Err(IpvError::InvalidOptionType(s.to_string())),
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// One pricing request. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricingRequest {
    pub spot: f64,
    pub strike: f64,
    /// Time to maturity in years
    pub time: f64,
    /// Risk-free rate as a decimal (0.05 = 5%)
    pub rate: f64,
    /// Volatility as a decimal (0.5 = 50%)
    pub volatility: f64,
    pub option_type: OptionType,
}

impl PricingRequest {
    /// Reject inputs for which the closed form is undefined
    /// (log of a non-positive ratio, division by zero).
    pub fn validate(&self) -> IpvResult<()> {
        check_positive("spot", self.spot)?;
        check_positive("strike", self.strike)?;
        check_positive("time", self.time)?;
        check_positive("volatility", self.volatility)?;
        if !self.rate.is_finite() {
            return Err(IpvError::Domain(format!("rate must be finite, got {}", self.rate)));
        }
        Ok(())
    }
}

fn check_positive(field: &str, value: f64) -> IpvResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(IpvError::Domain(format!("{field} must be a positive finite number, got {value}")))
    }
}

/// Model output, always in (price, delta, gamma, vega) order.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
}

impl PricingResult {
    #[inline]
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.price, self.delta, self.gamma, self.vega)
    }
}

// ── Precomputed model parameters (stack, no alloc) ──

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ModelParams {
    pub spot: f64,
    pub strike: f64,
    pub ttl_years: f64,
    pub rate: f64,
    // Precomputed
    pub ln_s_k: f64,
    pub sqrt_t: f64,
    pub sigma_sqrt_t: f64,
    pub half_sigma_sq: f64,
    pub discount: f64,
}

impl ModelParams {
    #[inline]
    pub fn new(req: &PricingRequest) -> Self {
        let sqrt_t = req.time.sqrt();
        Self {
            spot: req.spot,
            strike: req.strike,
            ttl_years: req.time,
            rate: req.rate,
            ln_s_k: (req.spot / req.strike).ln(),
            sqrt_t,
            sigma_sqrt_t: req.volatility * sqrt_t,
            half_sigma_sq: 0.5 * req.volatility * req.volatility,
            discount: (-req.rate * req.time).exp(),
        }
    }
}
