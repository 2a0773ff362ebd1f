//! Least-squares and logistic models.

use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use super::Estimator;
use crate::error::{Error, Result};

/// Solve the symmetric positive-definite system `a x = b` by Cholesky
/// factorisation. Returns `None` when `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 1e-12 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting. Singular columns get a
/// zero coefficient, which matches a minimum-norm fit for collinear inputs.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    let mut pivot_cols = vec![false; n];
    let mut row = 0;
    for col in 0..n {
        if row >= n {
            break;
        }
        let mut max_row = row;
        for r in row + 1..n {
            if aug[[r, col]].abs() > aug[[max_row, col]].abs() {
                max_row = r;
            }
        }
        if aug[[max_row, col]].abs() < 1e-10 {
            continue;
        }
        if max_row != row {
            for j in 0..=n {
                aug.swap([row, j], [max_row, j]);
            }
        }

        let pivot = aug[[row, col]];
        for j in 0..=n {
            aug[[row, j]] /= pivot;
        }
        for r in 0..n {
            if r != row {
                let factor = aug[[r, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[r, j]] -= factor * aug[[row, j]];
                    }
                }
            }
        }
        pivot_cols[col] = true;
        row += 1;
    }

    let mut x = Array1::<f64>::zeros(n);
    let mut r = 0;
    for (col, &is_pivot) in pivot_cols.iter().enumerate() {
        if is_pivot {
            x[col] = aug[[r, n]];
            r += 1;
        }
    }
    x
}

fn solve_normal_equations(xtx: &Array2<f64>, xty: &Array1<f64>) -> Array1<f64> {
    cholesky_solve(xtx, xty).unwrap_or_else(|| {
        tracing::debug!("normal equations are not positive definite, using elimination");
        gauss_jordan_solve(xtx, xty)
    })
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::Model(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(Error::Model("no training rows".to_string()));
    }
    Ok(())
}

/// Ordinary least squares with an intercept; `alpha > 0` gives ridge.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    pub alpha: f64,
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ridge(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }
}

impl Estimator for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Model("no training rows".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = solve_normal_equations(&xtx, &xty);
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::Model("least squares solution is not finite".to_string()));
        }

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| Error::Model("model is not fitted".to_string()))?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Per-feature standardisation fitted on training data.
#[derive(Debug, Clone)]
struct Scaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Scaler {
    fn fit(x: &Array2<f64>) -> Self {
        let n_features = x.ncols();
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        Self { mean, scale }
    }

    fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean.view().insert_axis(Axis(0))) / &self.scale.view().insert_axis(Axis(0))
    }
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// One-vs-rest logistic regression trained by batch gradient descent.
/// Labels are class indices `0..n_classes` stored as `f64`.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub alpha: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tol: f64,
    scaler: Option<Scaler>,
    /// One (weights, bias) pair per class.
    classes: Vec<(Array1<f64>, f64)>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
            scaler: None,
            classes: Vec::new(),
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let predictions = sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = x.t().dot(&errors) / n_samples + self.alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        (weights, bias)
    }

    fn scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| Error::Model("model is not fitted".to_string()))?;
        let xs = scaler.transform(x);

        let mut out = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (c, (weights, bias)) in self.classes.iter().enumerate() {
            out.column_mut(c).assign(&sigmoid(&(xs.dot(weights) + *bias)));
        }
        Ok(out)
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        let n_classes = y.iter().fold(0usize, |m, &v| m.max(v as usize + 1));
        let scaler = Scaler::fit(x);
        let xs = scaler.transform(x);

        self.classes = (0..n_classes)
            .map(|c| {
                let target = y.mapv(|v| if v as usize == c { 1.0 } else { 0.0 });
                self.fit_binary(&xs, &target)
            })
            .collect();
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.scores(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                // first maximum wins so ties go to the lowest class
                let mut best = 0;
                for (c, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = c;
                    }
                }
                best as f64
            })
            .collect())
    }
}

/// Classical OLS fit report on the full data.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OlsSummary {
    pub intercept: f64,
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    /// Undefined when there are not more observations than parameters.
    pub adj_r_squared: Option<f64>,
    /// Overall F test of the regression. Undefined like `adj_r_squared`,
    /// and also for a perfect fit.
    pub f_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Coefficient {
    pub feature: String,
    pub value: f64,
}

pub fn ols_summary(x: &Array2<f64>, y: &Array1<f64>, features: &[String]) -> Result<OlsSummary> {
    let mut model = LinearRegression::new();
    model.fit(x, y)?;
    let predicted = model.predict(x)?;
    let r_squared = super::metrics::r2_score(y, &predicted);

    let n = x.nrows() as f64;
    let p = x.ncols() as f64;
    let df_resid = n - p - 1.0;
    let adj_r_squared = if df_resid > 0.0 {
        Some(1.0 - (1.0 - r_squared) * (n - 1.0) / df_resid)
    } else {
        None
    };
    let (f_statistic, p_value) = f_test(r_squared, p, df_resid);

    let coefficients = match &model.coefficients {
        Some(c) => features
            .iter()
            .zip(c.iter())
            .map(|(feature, &value)| Coefficient {
                feature: feature.clone(),
                value,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(OlsSummary {
        intercept: model.intercept,
        coefficients,
        r_squared,
        adj_r_squared,
        f_statistic,
        p_value,
        observations: x.nrows(),
    })
}

fn f_test(r_squared: f64, df_model: f64, df_resid: f64) -> (Option<f64>, Option<f64>) {
    if df_model <= 0.0 || df_resid <= 0.0 || r_squared >= 1.0 || r_squared.is_nan() {
        return (None, None);
    }
    let f = (r_squared / df_model) / ((1.0 - r_squared) / df_resid);
    if !f.is_finite() {
        return (None, None);
    }
    let p = FisherSnedecor::new(df_model, df_resid)
        .ok()
        .map(|dist| dist.sf(f.max(0.0)));
    (Some(f), p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_recovers_plane() {
        // y = 2a - 3b + 5
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 5.0], [4.0, 2.0], [0.0, 3.0], [7.0, 1.0]];
        let y = x.map_axis(Axis(1), |r| 2.0 * r[0] - 3.0 * r[1] + 5.0);

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] + 3.0).abs() < 1e-9);
        assert!((model.intercept - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];

        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();
        let mut ridge = LinearRegression::ridge(1.0);
        ridge.fit(&x, &y).unwrap();

        let ols_coef = ols.coefficients.as_ref().unwrap()[0];
        let ridge_coef = ridge.coefficients.as_ref().unwrap()[0];
        assert!((ols_coef - 2.0).abs() < 1e-9);
        // sum of squared deviations is 10, so the slope becomes 20 / 11
        assert!((ridge_coef - 20.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_features_still_fit() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let predicted = model.predict(&x).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = LinearRegression::new();
        assert!(model.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_logistic_separates_three_classes() {
        let x = array![
            [0.0, 0.0],
            [0.5, 0.2],
            [0.2, 0.4],
            [5.0, 5.0],
            [5.5, 4.8],
            [4.8, 5.3],
            [10.0, 0.0],
            [10.4, 0.3],
            [9.7, 0.2]
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_ols_summary() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];

        let summary = ols_summary(&x, &y, &["x".to_string()]).unwrap();
        assert!((summary.intercept - 1.0).abs() < 1e-9);
        assert_eq!(summary.coefficients[0].feature, "x");
        assert!((summary.coefficients[0].value - 2.0).abs() < 1e-9);
        assert!((summary.r_squared - 1.0).abs() < 1e-9);
        assert!((summary.adj_r_squared.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(summary.observations, 5);
    }

    #[test]
    fn test_ols_summary_f_test() {
        use statrs::distribution::StudentsT;

        // slope 0.6, intercept 2.2, residual SS 2.4 of total 6
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 5.0, 4.0, 5.0];

        let summary = ols_summary(&x, &y, &["x".to_string()]).unwrap();
        assert!((summary.r_squared - 0.6).abs() < 1e-9);
        let f = summary.f_statistic.unwrap();
        assert!((f - 4.5).abs() < 1e-9);

        // with one regressor the F test matches the two-sided t test
        let t = StudentsT::new(0.0, 1.0, 3.0).unwrap();
        let expected = 2.0 * t.sf(f.sqrt());
        let p = summary.p_value.unwrap();
        assert!((p - expected).abs() < 1e-9);
        assert!(p > 0.1 && p < 0.2);
    }

    #[test]
    fn test_ols_summary_without_spare_observations() {
        let x = array![[1.0, 0.0], [0.0, 1.0]];
        let y = array![1.0, 2.0];
        let summary = ols_summary(&x, &y, &["a".to_string(), "b".to_string()]).unwrap();
        assert!(summary.adj_r_squared.is_none());
        assert!(summary.f_statistic.is_none());
        assert!(summary.p_value.is_none());
    }
}
