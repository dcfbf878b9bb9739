use std::collections::BTreeMap;

pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 2.5;

/// Indices of samples whose z-score magnitude exceeds `threshold`.
///
/// Uses the sample standard deviation. Fewer than two samples, or a flat
/// series, yields no anomalies.
pub fn detect_anomalies(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < 2 || values.iter().any(|value| !value.is_finite()) {
        return Vec::new();
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (count - 1.0);
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, value)| ((*value - mean) / stdev).abs() > threshold)
        .map(|(index, _)| index)
        .collect()
}

pub fn analyze_server_metrics(
    metrics: &BTreeMap<String, Vec<f64>>,
) -> BTreeMap<String, Vec<usize>> {
    metrics
        .iter()
        .map(|(name, values)| {
            (
                name.clone(),
                detect_anomalies(values, DEFAULT_Z_SCORE_THRESHOLD),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_single_outlier_is_flagged() {
        let mut values = vec![1.0; 10];
        values.push(50.0);
        assert_eq!(detect_anomalies(&values, DEFAULT_Z_SCORE_THRESHOLD), vec![10]);
    }

    #[test]
    fn unit_short_or_flat_series_has_no_anomalies() {
        assert!(detect_anomalies(&[], DEFAULT_Z_SCORE_THRESHOLD).is_empty());
        assert!(detect_anomalies(&[42.0], DEFAULT_Z_SCORE_THRESHOLD).is_empty());
        assert!(detect_anomalies(&[3.0, 3.0, 3.0], DEFAULT_Z_SCORE_THRESHOLD).is_empty());
    }

    #[test]
    fn functional_metrics_are_analyzed_per_series() {
        let mut cpu = vec![10.0; 12];
        cpu.push(99.0);
        let metrics = BTreeMap::from([
            ("cpu".to_string(), cpu),
            ("mem".to_string(), vec![40.0, 41.0, 39.0, 40.5]),
        ]);
        let report = analyze_server_metrics(&metrics);
        assert_eq!(report["cpu"], vec![12]);
        assert!(report["mem"].is_empty());
    }
}
