use crate::errors::IpvResult;
use crate::models::{ModelParams, OptionType, PricingModel, PricingRequest, PricingResult};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Black-Scholes-Merton pricing for European calls and puts.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// Call: S*N(d1) - K*e^(-rT)*N(d2), delta = N(d1)
/// Put:  K*e^(-rT)*N(-d2) - S*N(-d1), delta = N(d1) - 1
///
/// gamma = N'(d1) / (S * sigma * sqrt(T)), vega = S * N'(d1) * sqrt(T)
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingModel for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes-Merton"
    }

    fn price(&self, req: &PricingRequest) -> IpvResult<PricingResult> {
        req.validate()?;
        let p = ModelParams::new(req);

        let d1 = (p.ln_s_k + (p.rate + p.half_sigma_sq) * p.ttl_years) / p.sigma_sqrt_t;
        let d2 = d1 - p.sigma_sqrt_t;

        let (price, delta) = match req.option_type {
            OptionType::Call => (
                p.spot * self.normal.cdf(d1) - p.strike * p.discount * self.normal.cdf(d2),
                self.normal.cdf(d1),
            ),
            OptionType::Put => (
                p.strike * p.discount * self.normal.cdf(-d2) - p.spot * self.normal.cdf(-d1),
                self.normal.cdf(d1) - 1.0,
            ),
        };

        let pdf_d1 = self.normal.pdf(d1);

        Ok(PricingResult {
            price,
            delta,
            gamma: pdf_d1 / (p.spot * p.sigma_sqrt_t),
            vega: p.spot * pdf_d1 * p.sqrt_t,
        })
    }
}

/// Scalar entry point taking the option type as a raw string.
/// The string is parsed case-insensitively before anything is computed.
pub fn price_option(
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    volatility: f64,
    option_type: &str,
) -> IpvResult<PricingResult> {
    let req = PricingRequest {
        spot,
        strike,
        time,
        rate,
        volatility,
        option_type: option_type.parse()?,
    };
    BlackScholes::new().price(&req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IpvError;

    const TOL: f64 = 1e-6;

    fn req(spot: f64, strike: f64, time: f64, rate: f64, vol: f64, ty: OptionType) -> PricingRequest {
        PricingRequest { spot, strike, time, rate, volatility: vol, option_type: ty }
    }

    /// Representative grid of valid inputs (ITM/ATM/OTM, short/long dated, low/high vol)
    fn grid() -> Vec<(f64, f64, f64, f64, f64)> {
        let mut out = Vec::new();
        for &s in &[50.0, 100.0, 180.0] {
            for &k in &[60.0, 100.0, 150.0] {
                for &t in &[0.01, 0.5, 3.0] {
                    for &r in &[-0.01, 0.0, 0.05] {
                        for &v in &[0.05, 0.3, 1.2] {
                            out.push((s, k, t, r, v));
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_known_value_call() {
        let r = price_option(100.0, 95.0, 2.0, 0.05, 0.5, "call").unwrap();
        assert!((r.price - 33.273512).abs() < TOL, "price={}", r.price);
        assert!((r.delta - 0.714818).abs() < TOL, "delta={}", r.delta);
        assert!((r.gamma - 0.00480273).abs() < 1e-8, "gamma={}", r.gamma);
        assert!((r.vega - 48.027268).abs() < TOL, "vega={}", r.vega);
    }

    #[test]
    fn test_known_value_put() {
        let r = price_option(100.0, 95.0, 2.0, 0.05, 0.5, "put").unwrap();
        assert!((r.price - 19.233066).abs() < TOL, "price={}", r.price);
        assert!((r.delta + 0.285182).abs() < TOL, "delta={}", r.delta);
    }

    #[test]
    fn test_textbook_atm() {
        // S=K=100, T=1, r=5%, vol=20%: call 10.4506, put 5.5735
        let c = price_option(100.0, 100.0, 1.0, 0.05, 0.2, "call").unwrap();
        let p = price_option(100.0, 100.0, 1.0, 0.05, 0.2, "put").unwrap();
        assert!((c.price - 10.450584).abs() < TOL, "call={}", c.price);
        assert!((p.price - 5.573526).abs() < TOL, "put={}", p.price);
        assert!((c.gamma - 0.018762).abs() < TOL);
        assert!((c.vega - 37.524035).abs() < TOL);
    }

    #[test]
    fn test_put_call_parity() {
        let model = BlackScholes::new();
        for (s, k, t, r, v) in grid() {
            let c = model.price(&req(s, k, t, r, v, OptionType::Call)).unwrap();
            let p = model.price(&req(s, k, t, r, v, OptionType::Put)).unwrap();
            let parity = s - k * (-r * t).exp();
            assert!(
                (c.price - p.price - parity).abs() < TOL,
                "parity broken at S={s} K={k} T={t} r={r} v={v}: {} vs {parity}",
                c.price - p.price
            );
        }
    }

    #[test]
    fn test_delta_bounds_and_symmetry() {
        let model = BlackScholes::new();
        for (s, k, t, r, v) in grid() {
            let c = model.price(&req(s, k, t, r, v, OptionType::Call)).unwrap();
            let p = model.price(&req(s, k, t, r, v, OptionType::Put)).unwrap();
            assert!((0.0..=1.0).contains(&c.delta), "call delta={}", c.delta);
            assert!((-1.0..=0.0).contains(&p.delta), "put delta={}", p.delta);
            assert!((c.delta - p.delta - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gamma_vega_non_negative_and_shared() {
        let model = BlackScholes::new();
        for (s, k, t, r, v) in grid() {
            let c = model.price(&req(s, k, t, r, v, OptionType::Call)).unwrap();
            let p = model.price(&req(s, k, t, r, v, OptionType::Put)).unwrap();
            assert!(c.gamma >= 0.0 && c.vega >= 0.0);
            assert_eq!(c.gamma, p.gamma);
            assert_eq!(c.vega, p.vega);
        }
    }

    #[test]
    fn test_invalid_type_rejected() {
        let err = price_option(100.0, 95.0, 2.0, 0.05, 0.5, "straddle").unwrap_err();
        assert!(matches!(err, IpvError::InvalidOptionType(_)), "got {err}");
    }

    #[test]
    fn test_case_insensitive_type() {
        let upper = price_option(100.0, 95.0, 2.0, 0.05, 0.5, "CALL").unwrap();
        let lower = price_option(100.0, 95.0, 2.0, 0.05, 0.5, "call").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_deterministic() {
        let a = price_option(123.4, 110.0, 0.75, 0.03, 0.27, "put").unwrap();
        let b = price_option(123.4, 110.0, 0.75, 0.03, 0.27, "put").unwrap();
        assert_eq!(a.as_tuple(), b.as_tuple());
    }

    #[test]
    fn test_non_positive_inputs_fail_fast() {
        assert!(matches!(price_option(0.0, 95.0, 2.0, 0.05, 0.5, "call"), Err(IpvError::Domain(_))));
        assert!(matches!(price_option(100.0, 0.0, 2.0, 0.05, 0.5, "call"), Err(IpvError::Domain(_))));
        assert!(matches!(price_option(100.0, 95.0, -1.0, 0.05, 0.5, "put"), Err(IpvError::Domain(_))));
        assert!(matches!(price_option(100.0, 95.0, 2.0, 0.05, 0.0, "put"), Err(IpvError::Domain(_))));
        assert!(matches!(price_option(100.0, 95.0, 2.0, f64::INFINITY, 0.5, "put"), Err(IpvError::Domain(_))));
    }

    #[test]
    fn test_deep_itm_call_approaches_forward_intrinsic() {
        let r = price_option(200.0, 50.0, 0.25, 0.05, 0.2, "call").unwrap();
        let intrinsic = 200.0 - 50.0 * (-0.05_f64 * 0.25).exp();
        assert!((r.price - intrinsic).abs() < 1e-6);
        assert!(r.delta > 0.999);
    }

    #[test]
    fn test_deep_otm_put_near_zero() {
        let r = price_option(200.0, 50.0, 0.25, 0.05, 0.2, "put").unwrap();
        assert!(r.price.abs() < 1e-6, "price={}", r.price);
        assert!(r.delta > -1e-6);
    }
}
