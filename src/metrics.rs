//! Trial metric calculation
//!
//! Stateless reductions over a trial series and its sample interval `dt`:
//! - average velocity
//! - total mileage (left-Riemann integral of |v|)
//! - brake and gas pedal integrals
//!
//! `dt` is taken as given. Callers are responsible for rejecting zero or
//! negative intervals. An empty series has an average velocity of NaN and
//! integrals of 0.

use crate::series::TrialSeries;
use serde::{Deserialize, Serialize};

/// Summed pedal command integrals over a whole trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedalIntegrals {
    pub brake_out_sum: f64,
    pub gas_out_sum: f64,
}

/// Metric calculator shared by every trial of a run
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricCalculator;

impl MetricCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Rows with `start <= time <= end`
    pub fn filter_time_range(&self, series: &TrialSeries, start: f64, end: f64) -> TrialSeries {
        series.select(|i| series.time[i] >= start && series.time[i] <= end)
    }

    /// Arithmetic mean of velocity; NaN for an empty series
    pub fn average_velocity(&self, series: &TrialSeries) -> f64 {
        if series.is_empty() {
            return f64::NAN;
        }
        sum(&series.ego_v) / series.len() as f64
    }

    /// Add `Velocity_times_dt = |v| * dt` to the series
    pub fn add_mileage_column(&self, dt: f64, series: &mut TrialSeries) {
        let steps = series.ego_v.iter().map(|v| (v * dt).abs()).collect();
        series.velocity_times_dt = Some(steps);
    }

    /// Distance driven, regardless of direction
    pub fn total_mileage(&self, dt: f64, series: &mut TrialSeries) -> f64 {
        self.add_mileage_column(dt, series);
        series.velocity_times_dt.as_deref().map(sum).unwrap_or(0.0)
    }

    /// Integrate brake and gas commands as-is (no clipping or sign change)
    pub fn sum_brake_and_gas(&self, dt: f64, series: &mut TrialSeries) -> PedalIntegrals {
        let brake: Vec<f64> = series.brake_out.iter().map(|b| b * dt).collect();
        let gas: Vec<f64> = series.gas_out.iter().map(|g| g * dt).collect();

        let integrals = PedalIntegrals {
            brake_out_sum: sum(&brake),
            gas_out_sum: sum(&gas),
        };

        series.brake_out_times_dt = Some(brake);
        series.gas_out_times_dt = Some(gas);

        integrals
    }
}

// Explicit fold so an empty column sums to +0.0
fn sum(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc + v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sample;

    fn constant_series(n: usize, dt: f64, v: f64) -> TrialSeries {
        let samples: Vec<Sample> = (0..n)
            .map(|i| Sample {
                time: i as f64 * dt,
                ego_v: v,
                ..Default::default()
            })
            .collect();
        TrialSeries::from_samples(&samples)
    }

    #[test]
    fn test_average_velocity() {
        let mut series = constant_series(4, 0.1, 0.0);
        series.ego_v = vec![1.0, 2.0, 3.0, 6.0];
        assert!((MetricCalculator.average_velocity(&series) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_velocity_mileage() {
        // n samples of v at spacing dt integrate to n * v * dt
        for (n, dt, v) in [(2, 0.1, 10.0), (100, 0.01, 16.6), (7, 0.5, 3.0)] {
            let mut series = constant_series(n, dt, v);
            let mileage = MetricCalculator.total_mileage(dt, &mut series);
            assert!((mileage - n as f64 * v * dt).abs() < 1e-9, "n={n} dt={dt} v={v}");
        }
    }

    #[test]
    fn test_mileage_ignores_direction() {
        let mut series = constant_series(3, 0.1, 0.0);
        series.ego_v = vec![5.0, -5.0, 5.0];
        let mileage = MetricCalculator.total_mileage(0.1, &mut series);
        assert!((mileage - 1.5).abs() < 1e-12);
        assert_eq!(series.velocity_times_dt.as_ref().map(|c| c.len()), Some(3));
    }

    #[test]
    fn test_pedal_integrals() {
        let mut series = constant_series(3, 0.1, 10.0);
        series.brake_out = vec![0.0, 0.5, 1.0];
        series.gas_out = vec![1.0, -0.5, 0.0];

        let integrals = MetricCalculator.sum_brake_and_gas(0.1, &mut series);
        assert!((integrals.brake_out_sum - 0.15).abs() < 1e-12);
        // negative commands are integrated as-is
        assert!((integrals.gas_out_sum - 0.05).abs() < 1e-12);
        assert!(series.brake_out_times_dt.is_some());
        assert!(series.gas_out_times_dt.is_some());
    }

    #[test]
    fn test_pedal_integrals_are_linear() {
        let mut base = constant_series(5, 0.2, 10.0);
        base.brake_out = vec![0.1, 0.3, 0.0, 0.7, 0.2];
        base.gas_out = vec![0.9, 0.4, 0.6, 0.0, 0.3];
        let k = 2.5;
        let mut scaled = base.clone();
        scaled.brake_out.iter_mut().for_each(|b| *b *= k);
        scaled.gas_out.iter_mut().for_each(|g| *g *= k);

        let a = MetricCalculator.sum_brake_and_gas(0.2, &mut base);
        let b = MetricCalculator.sum_brake_and_gas(0.2, &mut scaled);
        assert!((b.brake_out_sum - k * a.brake_out_sum).abs() < 1e-12);
        assert!((b.gas_out_sum - k * a.gas_out_sum).abs() < 1e-12);
    }

    #[test]
    fn test_empty_series() {
        let mut series = TrialSeries::default();
        let calc = MetricCalculator::new();

        assert!(calc.average_velocity(&series).is_nan());
        let mileage = calc.total_mileage(0.1, &mut series);
        assert_eq!(mileage, 0.0);
        assert!(mileage.is_sign_positive());

        let integrals = calc.sum_brake_and_gas(0.1, &mut series);
        assert_eq!(integrals.brake_out_sum, 0.0);
        assert_eq!(integrals.gas_out_sum, 0.0);
    }

    #[test]
    fn test_filter_time_range_is_closed() {
        let series = constant_series(10, 0.5, 1.0);
        let filtered = MetricCalculator.filter_time_range(&series, 1.0, 2.5);
        assert_eq!(filtered.time, vec![1.0, 1.5, 2.0, 2.5]);
        assert_eq!(filtered.ego_v.len(), 4);

        let none = MetricCalculator.filter_time_range(&series, 100.0, 200.0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_filter_keeps_derived_columns_aligned() {
        let mut series = constant_series(4, 1.0, 2.0);
        MetricCalculator.add_mileage_column(1.0, &mut series);
        let filtered = MetricCalculator.filter_time_range(&series, 1.0, 2.0);
        assert_eq!(filtered.velocity_times_dt, Some(vec![2.0, 2.0]));
    }
}
