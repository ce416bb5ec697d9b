use candle_util::candle_model_selection::ValidationScoreT;

/// Error metrics between observed and predicted values
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegressionMetrics {
    pub mse: f32,
    pub mae: f32,
    pub rmse: f32,
    pub mape: f32,
    pub r2: f32,
}

impl RegressionMetrics {
    pub const NAMES: [&'static str; 5] = ["mse", "mae", "rmse", "mape", "r2"];

    pub fn to_vec(&self) -> Vec<f32> {
        vec![self.mse, self.mae, self.rmse, self.mape, self.r2]
    }
}

/// Models are selected by the mean squared error
impl ValidationScoreT for RegressionMetrics {
    fn selection_score(&self) -> f32 {
        self.mse
    }
}

fn check_lengths(truth: &[f32], pred: &[f32]) -> anyhow::Result<()> {
    if truth.len() != pred.len() {
        anyhow::bail!("length mismatch: {} vs. {}", truth.len(), pred.len());
    }
    if truth.is_empty() {
        anyhow::bail!("no values to compare");
    }
    Ok(())
}

/// mean of (y - yhat)^2, summed in order so repeated calls agree bit
/// for bit
pub fn mean_squared_error(truth: &[f32], pred: &[f32]) -> anyhow::Result<f32> {
    check_lengths(truth, pred)?;
    let sse: f64 = truth
        .iter()
        .zip(pred.iter())
        .map(|(&y, &yhat)| (y as f64 - yhat as f64).powi(2))
        .sum();
    Ok((sse / truth.len() as f64) as f32)
}

/// mean of |y - yhat|
pub fn mean_absolute_error(truth: &[f32], pred: &[f32]) -> anyhow::Result<f32> {
    check_lengths(truth, pred)?;
    let sae: f64 = truth
        .iter()
        .zip(pred.iter())
        .map(|(&y, &yhat)| (y as f64 - yhat as f64).abs())
        .sum();
    Ok((sae / truth.len() as f64) as f32)
}

/// mean of |y - yhat| / |y| over the entries with y != 0
pub fn mean_absolute_percentage_error(truth: &[f32], pred: &[f32]) -> anyhow::Result<f32> {
    check_lengths(truth, pred)?;
    let (tot, n) = truth
        .iter()
        .zip(pred.iter())
        .filter(|(y, _)| **y != 0.)
        .fold((0f64, 0usize), |(tot, n), (&y, &yhat)| {
            (tot + ((y as f64 - yhat as f64) / y as f64).abs(), n + 1)
        });
    if n == 0 {
        return Ok(0.);
    }
    Ok((tot / n as f64) as f32)
}

/// 1 - SS_res / SS_tot; a constant truth gives 1 on a perfect fit and
/// 0 otherwise
pub fn r_squared(truth: &[f32], pred: &[f32]) -> anyhow::Result<f32> {
    check_lengths(truth, pred)?;
    let n = truth.len() as f64;
    let mean = truth.iter().map(|&y| y as f64).sum::<f64>() / n;

    let ss_res: f64 = truth
        .iter()
        .zip(pred.iter())
        .map(|(&y, &yhat)| (y as f64 - yhat as f64).powi(2))
        .sum();
    let ss_tot: f64 = truth.iter().map(|&y| (y as f64 - mean).powi(2)).sum();

    if ss_tot == 0. {
        return Ok(if ss_res == 0. { 1. } else { 0. });
    }
    Ok((1. - ss_res / ss_tot) as f32)
}

/// All five metrics at once
pub fn regression_metrics(truth: &[f32], pred: &[f32]) -> anyhow::Result<RegressionMetrics> {
    let mse = mean_squared_error(truth, pred)?;
    Ok(RegressionMetrics {
        mse,
        mae: mean_absolute_error(truth, pred)?,
        rmse: mse.sqrt(),
        mape: mean_absolute_percentage_error(truth, pred)?,
        r2: r_squared(truth, pred)?,
    })
}
