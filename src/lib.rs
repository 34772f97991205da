//! Black-Scholes-Merton pricer with an independent price verification (IPV)
//! layer: single-option pricing and Greeks, plus batch comparison of trader
//! prices against the model.

pub mod config;
pub mod db;
pub mod errors;
pub mod feeds;
pub mod ipv;
pub mod models;
pub mod server;
pub mod state;

pub use errors::{IpvError, IpvResult};
pub use models::black_scholes::{price_option, BlackScholes};
pub use models::{OptionType, PricingModel, PricingRequest, PricingResult};
