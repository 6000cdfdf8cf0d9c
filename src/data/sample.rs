//! Synthetic motor portfolio generation.
//!
//! Policies get a driver age, car age, engine power, fuel type, and area.
//! Claim counts follow a Poisson model with a log-linear rate times exposure.
//! The severity companion keeps only policies with claims: the response is the
//! average claim amount and the exposure column carries the claim count.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Gamma, Poisson};

use crate::domain::{ColumnKind, ColumnSpec, Covariate, Dataset, Family, Observation, SimConfig};
use crate::error::AppError;

/// Portfolio-wide base claim rate per policy-year.
const BASE_FREQUENCY: f64 = 0.08;

/// Mean claim amount at the reference risk.
const BASE_SEVERITY: f64 = 1_500.0;

/// Gamma shape of a single claim amount (coefficient of variation `1/sqrt(2)`).
const CLAIM_SHAPE: f64 = 2.0;

const AREAS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];
const FUELS: [&str; 2] = ["Diesel", "Regular"];

/// Column schema of a simulated portfolio.
pub fn portfolio_columns() -> Vec<ColumnSpec> {
    let col = |name: &str, kind| ColumnSpec {
        name: name.to_string(),
        kind,
    };
    vec![
        col("driver_age", ColumnKind::Continuous),
        col("car_age", ColumnKind::Continuous),
        col("power", ColumnKind::Continuous),
        col("fuel", ColumnKind::Categorical),
        col("area", ColumnKind::Categorical),
    ]
}

#[derive(Debug, Clone)]
struct Policy {
    driver_age: f64,
    car_age: f64,
    power: f64,
    fuel: usize,
    area: usize,
    exposure: f64,
}

impl Policy {
    fn draw(rng: &mut StdRng) -> Self {
        // Roughly a third of the book is on short-period cover.
        let exposure = if rng.gen_bool(0.65) {
            1.0
        } else {
            rng.gen_range(0.05..1.0)
        };
        Self {
            driver_age: rng.gen_range(18..=85) as f64,
            car_age: rng.gen_range(0..=20) as f64,
            power: rng.gen_range(4..=12) as f64,
            fuel: usize::from(rng.gen_bool(0.5)),
            area: rng.gen_range(0..AREAS.len()),
            exposure,
        }
    }

    /// Expected claims per policy-year.
    fn frequency(&self) -> f64 {
        let age = if self.driver_age < 25.0 {
            0.55
        } else if self.driver_age > 70.0 {
            0.25
        } else {
            -0.01 * (self.driver_age - 25.0)
        };
        let eta = BASE_FREQUENCY.ln()
            + age
            - 0.03 * self.car_age
            + 0.06 * (self.power - 6.0)
            + if self.fuel == 0 { 0.15 } else { 0.0 }
            + 0.12 * self.area as f64;
        eta.exp()
    }

    /// Expected amount of one claim.
    fn severity(&self) -> f64 {
        let eta = BASE_SEVERITY.ln() + 0.08 * (self.power - 6.0) - 0.01 * self.car_age
            + if self.driver_age < 25.0 { 0.2 } else { 0.0 };
        eta.exp()
    }

    fn covariates(&self) -> Vec<Covariate> {
        vec![
            Covariate::Continuous(self.driver_age),
            Covariate::Continuous(self.car_age),
            Covariate::Continuous(self.power),
            Covariate::Categorical(FUELS[self.fuel].to_string()),
            Covariate::Categorical(AREAS[self.area].to_string()),
        ]
    }
}

/// Simulate a portfolio for `config.family`.
///
/// The same seed always yields the same policies; the Gamma portfolio is the
/// claims-only subset of the Poisson one.
pub fn simulate_portfolio(config: &SimConfig) -> Result<Dataset, AppError> {
    if config.n_policies == 0 {
        return Err(AppError::new(2, "Number of simulated policies must be > 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let claim_amount = Gamma::new(CLAIM_SHAPE, 1.0 / CLAIM_SHAPE)
        .map_err(|e| AppError::new(4, format!("Severity distribution error: {e}")))?;

    let mut observations = Vec::with_capacity(config.n_policies);
    for i in 0..config.n_policies {
        let policy = Policy::draw(&mut rng);
        let mean_claims = policy.frequency() * policy.exposure;
        let claims = Poisson::new(mean_claims)
            .map_err(|e| AppError::new(4, format!("Claim count distribution error: {e}")))?
            .sample(&mut rng);

        // Amounts are drawn for every policy so that both portfolios consume
        // the generator identically.
        let n_claims = claims as usize;
        let total: f64 = (0..n_claims)
            .map(|_| claim_amount.sample(&mut rng) * policy.severity())
            .sum();

        let id = format!("POL{:06}", i + 1);
        match config.family {
            Family::Poisson => observations.push(Observation {
                id,
                response: claims,
                exposure: policy.exposure,
                covariates: policy.covariates(),
            }),
            Family::Gamma if n_claims > 0 => observations.push(Observation {
                id,
                response: total / claims,
                exposure: claims,
                covariates: policy.covariates(),
            }),
            Family::Gamma => {}
        }
    }

    if observations.is_empty() {
        return Err(AppError::new(
            3,
            "Simulated portfolio has no claims; increase the number of policies.",
        ));
    }

    let data = Dataset::new(portfolio_columns(), observations)?;
    let stats = data.stats();
    tracing::info!(
        family = config.family.display_name(),
        policies = config.n_policies,
        rows = stats.n_rows,
        total_exposure = stats.total_exposure,
        seed = config.seed,
        "simulated portfolio"
    );
    Ok(data)
}
