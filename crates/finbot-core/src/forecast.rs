//! Monte Carlo cash-flow forecasting
//!
//! Monthly income and expense distributions are fitted from the team's
//! transaction history, then projected forward with optional growth,
//! one-off events, and a fixed seed for reproducible runs. Percentile
//! bands come from the simulated balance paths.

use finbot_store::models::MonthlyFlow;
use finbot_store::Database;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// A one-off cash event applied in a given future month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneOff {
    /// Month offset from the forecast start, 1-based
    pub month: u32,
    /// Signed amount: positive inflow, negative outflow
    pub amount: f64,
    #[serde(default)]
    pub label: String,
}

/// Scenario knobs layered over the historical baseline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Annual income growth percentage, compounded monthly
    #[serde(default)]
    pub income_growth_pct: f64,
    /// Annual expense growth percentage, compounded monthly
    #[serde(default)]
    pub expense_growth_pct: f64,
    #[serde(default)]
    pub one_offs: Vec<OneOff>,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastParams {
    pub horizon_months: u32,
    pub iterations: u32,
    #[serde(default)]
    pub scenario: Scenario,
}

/// Percentile band for one projected month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Month offset from the forecast start, 1-based
    pub month: u32,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub starting_balance: f64,
    pub history_months: usize,
    pub points: Vec<ForecastPoint>,
}

// ==================== Statistics ====================

/// Sample mean and standard deviation. Fewer than two samples give a
/// zero deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Linear-interpolated percentile over a sorted slice, p in [0, 100]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// One standard normal draw via the Box-Muller transform
fn normal_draw(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Convert an annual growth percentage to a monthly factor
fn monthly_factor(annual_pct: f64) -> f64 {
    (1.0 + annual_pct / 100.0).max(0.0).powf(1.0 / 12.0)
}

// ==================== Simulation ====================

/// Run the Monte Carlo simulation over historical monthly flows
pub fn simulate(
    history: &[MonthlyFlow],
    starting_balance: f64,
    params: &ForecastParams,
) -> CoreResult<ForecastResult> {
    if params.horizon_months == 0 {
        return Err(CoreError::Validation(
            "Horizon must be at least one month".to_string(),
        ));
    }
    if params.iterations == 0 {
        return Err(CoreError::Validation(
            "Iterations must be at least 1".to_string(),
        ));
    }

    let incomes: Vec<f64> = history
        .iter()
        .map(|f| f.income.to_f64().unwrap_or(0.0))
        .collect();
    let expenses: Vec<f64> = history
        .iter()
        .map(|f| f.expense.to_f64().unwrap_or(0.0))
        .collect();
    let (income_mean, income_std) = mean_std(&incomes);
    let (expense_mean, expense_std) = mean_std(&expenses);

    let income_factor = monthly_factor(params.scenario.income_growth_pct);
    let expense_factor = monthly_factor(params.scenario.expense_growth_pct);

    let mut rng = match params.scenario.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let horizon = params.horizon_months as usize;
    let mut one_offs = vec![0.0; horizon + 1];
    for event in &params.scenario.one_offs {
        let month = event.month as usize;
        if month == 0 || month > horizon {
            return Err(CoreError::Validation(format!(
                "One-off month {} is outside the horizon",
                event.month
            )));
        }
        one_offs[month] += event.amount;
    }

    // balances[m] holds every iteration's balance at month m+1
    let mut balances = vec![Vec::with_capacity(params.iterations as usize); horizon];
    for _ in 0..params.iterations {
        let mut balance = starting_balance;
        let mut income_scale = 1.0;
        let mut expense_scale = 1.0;
        for (m, bucket) in balances.iter_mut().enumerate() {
            income_scale *= income_factor;
            expense_scale *= expense_factor;
            let income =
                (income_mean * income_scale + income_std * normal_draw(&mut rng)).max(0.0);
            let expense =
                (expense_mean * expense_scale + expense_std * normal_draw(&mut rng)).max(0.0);
            balance += income - expense + one_offs[m + 1];
            bucket.push(balance);
        }
    }

    let points = balances
        .into_iter()
        .enumerate()
        .map(|(m, mut bucket)| {
            bucket.sort_by(|a, b| a.total_cmp(b));
            let mean = bucket.iter().sum::<f64>() / bucket.len() as f64;
            ForecastPoint {
                month: m as u32 + 1,
                p10: percentile(&bucket, 10.0),
                p50: percentile(&bucket, 50.0),
                p90: percentile(&bucket, 90.0),
                mean,
            }
        })
        .collect();

    debug!(
        "Simulated {} paths over {} months from {} history months",
        params.iterations,
        horizon,
        history.len()
    );
    Ok(ForecastResult {
        starting_balance,
        history_months: history.len(),
        points,
    })
}

// ==================== Service ====================

/// Runs forecasts against live team data and persists the results
#[derive(Clone)]
pub struct ForecastService {
    db: Database,
}

impl ForecastService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Current total balance across the team's active accounts
    fn starting_balance(&self, team_id: Uuid) -> CoreResult<f64> {
        let mut total = 0.0;
        for account in self.db.list_accounts(team_id, false)? {
            let balance = self.db.account_balance(team_id, account.id)?;
            total += balance.to_f64().unwrap_or(0.0);
        }
        Ok(total)
    }

    /// Run a forecast and persist it under the given name
    pub fn run(
        &self,
        team_id: Uuid,
        name: &str,
        params: &ForecastParams,
    ) -> CoreResult<(finbot_store::models::Forecast, ForecastResult)> {
        let history = self.db.monthly_net_flows(team_id)?;
        let starting = self.starting_balance(team_id)?;
        let result = simulate(&history, starting, params)?;

        let params_json = serde_json::to_value(params)
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        let result_json = serde_json::to_value(&result)
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        let saved = self.db.save_forecast(
            team_id,
            name,
            params.horizon_months,
            params.iterations,
            &params_json,
            &result_json,
        )?;
        Ok((saved, result))
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn flows(pairs: &[(i64, i64)]) -> Vec<MonthlyFlow> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (income, expense))| MonthlyFlow {
                month: format!("2025-{:02}", i + 1),
                income: Decimal::new(*income, 0),
                expense: Decimal::new(*expense, 0),
            })
            .collect()
    }

    fn params(seed: u64) -> ForecastParams {
        ForecastParams {
            horizon_months: 6,
            iterations: 500,
            scenario: Scenario {
                seed: Some(seed),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((std - 2.138089935).abs() < 1e-6);

        assert_eq!(mean_std(&[]), (0.0, 0.0));
        assert_eq!(mean_std(&[3.0]), (3.0, 0.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert!((percentile(&sorted, 25.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let history = flows(&[(1000, 600), (1200, 700), (900, 650), (1100, 640)]);
        let a = simulate(&history, 5000.0, &params(42)).unwrap();
        let b = simulate(&history, 5000.0, &params(42)).unwrap();
        for (pa, pb) in a.points.iter().zip(&b.points) {
            assert_eq!(pa.p50, pb.p50);
            assert_eq!(pa.mean, pb.mean);
        }

        let c = simulate(&history, 5000.0, &params(43)).unwrap();
        assert!(a.points[0].p50 != c.points[0].p50);
    }

    #[test]
    fn test_percentile_bands_are_ordered() {
        let history = flows(&[(1000, 600), (1200, 700), (900, 650), (1100, 640)]);
        let result = simulate(&history, 0.0, &params(7)).unwrap();
        assert_eq!(result.points.len(), 6);
        for point in &result.points {
            assert!(point.p10 <= point.p50);
            assert!(point.p50 <= point.p90);
        }
    }

    #[test]
    fn test_zero_variance_history_is_deterministic() {
        let history = flows(&[(1000, 400), (1000, 400), (1000, 400)]);
        let result = simulate(&history, 100.0, &params(1)).unwrap();
        // net +600 every month, no noise
        for (i, point) in result.points.iter().enumerate() {
            let expected = 100.0 + 600.0 * (i as f64 + 1.0);
            assert!((point.p50 - expected).abs() < 1e-6);
            assert!((point.p10 - expected).abs() < 1e-6);
            assert!((point.p90 - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_one_offs_shift_the_path() {
        let history = flows(&[(1000, 400), (1000, 400), (1000, 400)]);
        let mut p = params(1);
        p.scenario.one_offs.push(OneOff {
            month: 2,
            amount: -5000.0,
            label: "tax bill".to_string(),
        });
        let result = simulate(&history, 0.0, &p).unwrap();
        assert!((result.points[0].p50 - 600.0).abs() < 1e-6);
        assert!((result.points[1].p50 - (1200.0 - 5000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_growth_compounds_monthly() {
        let history = flows(&[(1200, 0), (1200, 0)]);
        let mut p = params(1);
        p.horizon_months = 12;
        p.scenario.income_growth_pct = 12.0;
        let result = simulate(&history, 0.0, &p).unwrap();

        // after 12 months of compounding the monthly income reaches 1200 * 1.12
        let last_month_income = result.points[11].p50 - result.points[10].p50;
        assert!((last_month_income - 1200.0 * 1.12).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let history = flows(&[(100, 50)]);
        let mut p = params(1);
        p.horizon_months = 0;
        assert!(matches!(
            simulate(&history, 0.0, &p),
            Err(CoreError::Validation(_))
        ));

        let mut p = params(1);
        p.scenario.one_offs.push(OneOff {
            month: 99,
            amount: 1.0,
            label: String::new(),
        });
        assert!(matches!(
            simulate(&history, 0.0, &p),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_history_stays_flat() {
        let result = simulate(&[], 250.0, &params(1)).unwrap();
        for point in &result.points {
            assert!((point.p50 - 250.0).abs() < 1e-9);
        }
    }
}
