/// Simple moving average of the last `period` values, aligned by index.
/// The first `period - 1` entries are `None`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    assert!(period >= 1, "SMA period must be >= 1");
    let mut out = vec![None; values.len().min(period - 1)];
    out.extend(
        values
            .windows(period)
            .map(|w| Some(w.iter().sum::<f64>() / period as f64)),
    );
    out
}
