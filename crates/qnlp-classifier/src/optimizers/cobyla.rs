//! COBYLA-style derivative-free optimizer.
//!
//! A simplex search whose reflections are bounded by a shrinking trust
//! radius `rho`. Gradients of a circuit objective are expensive, so this is
//! the default optimizer. The simplex is kept between steps and rebuilt
//! only when the caller resumes from a point other than its best vertex.

use rand::RngCore;

use super::{Objective, Optimizer};
use crate::error::QnlpResult;

/// Simplex iterations allowed per vertex within one step.
const INNER_ITERATIONS_PER_VERTEX: usize = 2;

/// COBYLA optimizer configuration.
#[derive(Debug, Clone)]
pub struct Cobyla {
    /// Convergence tolerance on the simplex spread.
    pub tol: f64,
    /// Initial trust region radius.
    pub rhobeg: f64,
    /// Final trust region radius.
    pub rhoend: f64,
    simplex: Option<Simplex>,
}

impl Default for Cobyla {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            rhobeg: 0.5,
            rhoend: 1e-4,
            simplex: None,
        }
    }
}

impl Cobyla {
    /// Create a new COBYLA optimizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set trust region parameters.
    pub fn with_trust_region(mut self, rhobeg: f64, rhoend: f64) -> Self {
        self.rhobeg = rhobeg;
        self.rhoend = rhoend;
        self
    }

    /// Current trust radius, if a simplex is live.
    pub fn trust_radius(&self) -> Option<f64> {
        self.simplex.as_ref().map(|s| s.rho)
    }

    /// One simplex move. Returns `false` once the trust region is exhausted.
    fn iterate(&self, simplex: &mut Simplex, objective: &mut Objective<'_>) -> QnlpResult<bool> {
        let n = simplex.dimension();

        if simplex.spread() < self.tol {
            if simplex.rho <= self.rhoend {
                return Ok(false);
            }
            let rho = (simplex.rho * 0.5).max(self.rhoend);
            let best = simplex.points[0].clone();
            *simplex = Simplex::around(&best, Some(simplex.values[0]), rho, objective)?;
            return Ok(true);
        }

        // Centroid of every vertex but the worst
        let mut centroid = vec![0.0; n];
        for point in &simplex.points[..n] {
            for (c, x) in centroid.iter_mut().zip(point) {
                *c += x;
            }
        }
        for c in &mut centroid {
            *c /= n as f64;
        }

        let worst = simplex.points[n].clone();
        let mut reflected: Vec<f64> = centroid
            .iter()
            .zip(&worst)
            .map(|(c, w)| 2.0 * c - w)
            .collect();
        for (r, c) in reflected.iter_mut().zip(&centroid) {
            let diff = *r - c;
            if diff.abs() > simplex.rho {
                *r = c + simplex.rho * diff.signum();
            }
        }
        let f_reflected = objective(&reflected)?;

        if f_reflected < simplex.values[0] {
            let expanded: Vec<f64> = centroid
                .iter()
                .zip(&reflected)
                .map(|(c, r)| c + 2.0 * (r - c))
                .collect();
            let f_expanded = objective(&expanded)?;
            if f_expanded < f_reflected {
                simplex.replace_worst(expanded, f_expanded);
            } else {
                simplex.replace_worst(reflected, f_reflected);
            }
        } else if f_reflected < simplex.values[n - 1] {
            simplex.replace_worst(reflected, f_reflected);
        } else {
            let contracted: Vec<f64> = centroid
                .iter()
                .zip(&worst)
                .map(|(c, w)| 0.5 * (c + w))
                .collect();
            let f_contracted = objective(&contracted)?;
            if f_contracted < simplex.values[n] {
                simplex.replace_worst(contracted, f_contracted);
            } else {
                simplex.shrink(objective)?;
            }
        }

        simplex.sort();
        Ok(true)
    }
}

impl Optimizer for Cobyla {
    fn name(&self) -> &'static str {
        "cobyla"
    }

    fn step(
        &mut self,
        objective: &mut Objective<'_>,
        params: &[f64],
        _rng: &mut dyn RngCore,
    ) -> QnlpResult<Vec<f64>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }

        let mut simplex = match self.simplex.take() {
            Some(s) if s.points[0] == params => s,
            _ => Simplex::around(params, None, self.rhobeg, objective)?,
        };

        // advance until the best vertex moves or the budget runs out
        let start = simplex.values[0];
        for _ in 0..INNER_ITERATIONS_PER_VERTEX * (params.len() + 1) {
            if !self.iterate(&mut simplex, objective)? || simplex.values[0] < start {
                break;
            }
        }

        let best = simplex.points[0].clone();
        self.simplex = Some(simplex);
        Ok(best)
    }

    fn reset(&mut self) {
        self.simplex = None;
    }

    fn objective_changed(&mut self) {
        self.simplex = None;
    }
}

/// Vertices sorted by objective value, best first.
#[derive(Debug, Clone)]
struct Simplex {
    points: Vec<Vec<f64>>,
    values: Vec<f64>,
    rho: f64,
}

impl Simplex {
    fn around(
        center: &[f64],
        center_value: Option<f64>,
        rho: f64,
        objective: &mut Objective<'_>,
    ) -> QnlpResult<Self> {
        let value = match center_value {
            Some(v) => v,
            None => objective(center)?,
        };
        let mut points = vec![center.to_vec()];
        let mut values = vec![value];
        for i in 0..center.len() {
            let mut point = center.to_vec();
            point[i] += rho;
            values.push(objective(&point)?);
            points.push(point);
        }

        let mut simplex = Self { points, values, rho };
        simplex.sort();
        Ok(simplex)
    }

    fn dimension(&self) -> usize {
        self.points.len() - 1
    }

    fn spread(&self) -> f64 {
        self.values[self.dimension()] - self.values[0]
    }

    fn replace_worst(&mut self, point: Vec<f64>, value: f64) {
        let n = self.dimension();
        self.points[n] = point;
        self.values[n] = value;
    }

    /// Pull every vertex halfway towards the best one.
    fn shrink(&mut self, objective: &mut Objective<'_>) -> QnlpResult<()> {
        let best = self.points[0].clone();
        for i in 1..self.points.len() {
            for (x, b) in self.points[i].iter_mut().zip(&best) {
                *x = 0.5 * (b + *x);
            }
            self.values[i] = objective(&self.points[i])?;
        }
        Ok(())
    }

    fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| self.values[a].total_cmp(&self.values[b]));
        self.points = order.iter().map(|&i| self.points[i].clone()).collect();
        self.values = order.iter().map(|&i| self.values[i]).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::Cell;

    #[test]
    fn test_cobyla_simple() {
        let mut cobyla = Cobyla::new();
        let mut rng = StdRng::seed_from_u64(0);

        // Minimize (x-1)^2 + (y-2)^2
        let mut objective = |params: &[f64]| -> QnlpResult<f64> {
            Ok((params[0] - 1.0).powi(2) + (params[1] - 2.0).powi(2))
        };
        let result = cobyla
            .minimize(&mut objective, vec![0.0, 0.0], 200, 0.0, &mut rng)
            .unwrap();

        assert!(result.optimal_value < 0.01);
        assert!((result.optimal_params[0] - 1.0).abs() < 0.1);
        assert!((result.optimal_params[1] - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_cobyla_rosenbrock() {
        let mut cobyla = Cobyla::new();
        let mut rng = StdRng::seed_from_u64(0);

        // Rosenbrock function (minimum at (1, 1))
        let mut objective = |params: &[f64]| -> QnlpResult<f64> {
            let (x, y) = (params[0], params[1]);
            Ok((1.0 - x).powi(2) + 100.0 * (y - x.powi(2)).powi(2))
        };
        let result = cobyla
            .minimize(&mut objective, vec![0.0, 0.0], 500, 0.0, &mut rng)
            .unwrap();

        // Rosenbrock is hard, just check we improved
        assert!(result.optimal_value < 1.0);
    }

    #[test]
    fn test_step_never_worsens_best() {
        let mut cobyla = Cobyla::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mut objective =
            |p: &[f64]| -> QnlpResult<f64> { Ok(p.iter().map(|x| (x - 0.3).powi(2)).sum()) };

        let mut params = vec![1.0, -1.0, 0.5];
        let mut value = objective(&params).unwrap();
        for _ in 0..20 {
            params = cobyla.step(&mut objective, &params, &mut rng).unwrap();
            let next = objective(&params).unwrap();
            assert!(next <= value);
            value = next;
        }
    }

    #[test]
    fn test_simplex_is_kept_between_steps() {
        let mut cobyla = Cobyla::new();
        let mut rng = StdRng::seed_from_u64(0);
        let evaluations = Cell::new(0usize);
        let mut objective = |p: &[f64]| -> QnlpResult<f64> {
            evaluations.set(evaluations.get() + 1);
            Ok(p[0].powi(2) + p[1].powi(2))
        };

        let first = cobyla.step(&mut objective, &[1.0, 1.0], &mut rng).unwrap();
        let second = cobyla.step(&mut objective, &first, &mut rng).unwrap();
        let resumed = evaluations.get();

        cobyla.reset();
        assert!(cobyla.trust_radius().is_none());
        let _ = cobyla.step(&mut objective, &second, &mut rng).unwrap();
        // a rebuild evaluates every vertex again
        assert!(evaluations.get() - resumed >= 3);
    }

    #[test]
    fn test_empty_parameters() {
        let mut cobyla = Cobyla::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mut objective = |_: &[f64]| -> QnlpResult<f64> { Ok(0.0) };
        assert!(cobyla.step(&mut objective, &[], &mut rng).unwrap().is_empty());
    }
}
