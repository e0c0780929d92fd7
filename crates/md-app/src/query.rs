//! Query helpers for recorded output.

use md_results::OutputStore;
use md_sim::{ExtractOptions, ScalarSaver};

use crate::error::{AppError, AppResult};

/// Per-particle energy statistics of a scalar table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergySummary {
    pub rows: usize,
    pub mean_u: f64,
    pub mean_k: f64,
    /// `(E_last - E_first) / |E_first|` for `E = U + K`; absolute when `E_first` is zero.
    pub relative_drift: f64,
}

pub fn energy_summary(store: &dyn OutputStore) -> AppResult<EnergySummary> {
    let series = ScalarSaver::extract(store, &["U", "K"], ExtractOptions::default())?;
    let [u, k] = series.as_slice() else {
        return Err(AppError::InvalidInput("expected U and K columns".to_string()));
    };
    let rows = u.len();
    if rows == 0 {
        return Err(AppError::InvalidInput("No scalar rows recorded".to_string()));
    }
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let e_first = u[0] + k[0];
    let e_last = u[rows - 1] + k[rows - 1];
    let relative_drift = if e_first == 0.0 {
        e_last - e_first
    } else {
        (e_last - e_first) / e_first.abs()
    };
    Ok(EnergySummary {
        rows,
        mean_u: mean(u),
        mean_k: mean(k),
        relative_drift,
    })
}

/// Times and values of one scalar column.
pub fn scalar_series(
    store: &dyn OutputStore,
    column: &str,
    options: ExtractOptions,
) -> AppResult<(Vec<f64>, Vec<f64>)> {
    let mut values = ScalarSaver::extract(store, &[column], options)?;
    let values = values.pop().unwrap_or_default();
    let times = ScalarSaver::times(store, options)?;
    if times.len() != values.len() {
        return Err(AppError::Results(format!(
            "{} times for {} values of {column}",
            times.len(),
            values.len()
        )));
    }
    Ok((times, values))
}

/// Scalar columns as CSV, one row per save, with a leading time column.
pub fn scalars_csv<S: AsRef<str>>(
    store: &dyn OutputStore,
    columns: &[S],
    options: ExtractOptions,
) -> AppResult<String> {
    let series = ScalarSaver::extract(store, columns, options)?;
    let rows = series.first().map_or(0, Vec::len);
    // Legacy energy files carry no dt; fall back to the row index.
    let times = ScalarSaver::times(store, options)
        .unwrap_or_else(|_| (0..rows).map(|r| r as f64).collect());
    let mut out = String::from("time");
    for c in columns {
        out.push(',');
        out.push_str(c.as_ref());
    }
    out.push('\n');
    for (row, t) in times.iter().enumerate() {
        out.push_str(&t.to_string());
        for col in &series {
            out.push(',');
            if let Some(v) = col.get(row) {
                out.push_str(&v.to_string());
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Groups, attributes and shapes, plus the scalar table summary when present.
pub fn describe_output(store: &dyn OutputStore) -> String {
    let mut out = md_results::describe(store);
    if let Ok(info) = ScalarSaver::info(store) {
        out.push_str(&info);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use md_results::{AttrValue, Dataset, MemoryStore};

    fn store_with_scalars(rows: &[[f64; 2]]) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set_root_attr("N", AttrValue::Int(10)).unwrap();
        store.set_root_attr("dt", AttrValue::Float(0.01)).unwrap();
        store
            .set_root_attr("steps_per_timeblock", AttrValue::Int(4 * rows.len() as i64))
            .unwrap();
        store.create_group("scalar_saver").unwrap();
        store
            .set_group_attr(
                "scalar_saver",
                "scalar_names",
                AttrValue::TextList(vec!["U".to_string(), "K".to_string()]),
            )
            .unwrap();
        store
            .set_group_attr("scalar_saver", "steps_between_output", AttrValue::Int(4))
            .unwrap();
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        store
            .create_dataset(
                "scalar_saver",
                "scalars",
                Dataset::new(vec![1, rows.len(), 2], data).unwrap(),
            )
            .unwrap();
        store
    }

    #[test]
    fn energy_summary_per_particle() {
        let store = store_with_scalars(&[[-50.0, 10.0], [-45.0, 5.0], [-41.0, 1.0]]);
        let summary = energy_summary(&store).unwrap();
        assert_eq!(summary.rows, 3);
        assert_relative_eq!(summary.mean_u, -13.6 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.mean_k, 1.6 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.relative_drift, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn series_times_follow_cadence() {
        let store = store_with_scalars(&[[-50.0, 10.0], [-45.0, 5.0]]);
        let (times, u) = scalar_series(&store, "U", ExtractOptions::default()).unwrap();
        assert_eq!(times.len(), 2);
        assert_relative_eq!(times[1], 0.04, epsilon = 1e-12);
        assert_relative_eq!(u[1], -4.5, epsilon = 1e-12);
    }

    #[test]
    fn csv_has_header_and_rows() {
        let store = store_with_scalars(&[[-50.0, 10.0], [-45.0, 5.0]]);
        let options = ExtractOptions {
            per_particle: false,
            ..ExtractOptions::default()
        };
        let csv = scalars_csv(&store, &["K", "U"], options).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "time,K,U");
        assert_eq!(lines[2], "0.04,5,-45");
    }

    #[test]
    fn missing_column_is_an_error() {
        let store = store_with_scalars(&[[-50.0, 10.0]]);
        assert!(scalar_series(&store, "Fsq", ExtractOptions::default()).is_err());
    }
}
