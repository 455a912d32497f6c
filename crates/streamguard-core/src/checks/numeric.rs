use arrow::array::Array;
use tracing::debug;

use crate::{
    checks::{CheckParams, Evaluator, Evidence, Verdict},
    errors::{CheckError, SamplingError},
    results::FailureSample,
    sampling::Reservoir,
    stats::{interquartile_fences, IqrFences, StreamingMoments},
    types::ChunkView,
    utils::columns::{display_value, float_column},
};

/// Values must lie within `[min, max]`. Either bound may be omitted.
///
/// Values that cannot be read as numbers fail the check.
pub struct RangeCheck {
    column: String,
    min: Option<f64>,
    max: Option<f64>,
    total: u64,
    failed: u64,
    evidence: Evidence,
}

impl RangeCheck {
    pub const KIND: &'static str = "range";

    pub fn new(
        column: String,
        min: Option<f64>,
        max: Option<f64>,
        evidence: Evidence,
    ) -> Result<Self, CheckError> {
        match (min, max) {
            (None, None) => {
                return Err(CheckError::Configuration(
                    "'range' check requires 'min' or 'max'".to_string(),
                ))
            }
            (Some(lo), Some(hi)) if lo > hi => {
                return Err(CheckError::Configuration(format!(
                    "'range' check has min {lo} greater than max {hi}"
                )))
            }
            _ => {}
        }
        Ok(Self {
            column,
            min,
            max,
            total: 0,
            failed: 0,
            evidence,
        })
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        Self::new(
            params.require_column(Self::KIND)?,
            params.min,
            params.max,
            params.evidence(),
        )
    }

    fn violation(&self, x: f64) -> Option<String> {
        if x.is_nan() {
            return Some("not a number".to_string());
        }
        if let Some(min) = self.min {
            if x < min {
                return Some(format!("below minimum {min}"));
            }
        }
        if let Some(max) = self.max {
            if x > max {
                return Some(format!("above maximum {max}"));
            }
        }
        None
    }
}

impl Evaluator for RangeCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn observe(&mut self, _pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let column = float_column(view.batch, &self.column)?;
        self.total += (column.source.len() - column.source.null_count()) as u64;

        for &i in &column.unparsable {
            self.failed += 1;
            self.evidence.record(|| {
                FailureSample::with_detail(
                    view.row_id(i),
                    display_value(column.source.as_ref(), i),
                    "not numeric".to_string(),
                )
            });
        }
        for (i, value) in column.values.iter().enumerate() {
            let Some(x) = value else { continue };
            if let Some(detail) = self.violation(x) {
                self.failed += 1;
                self.evidence.record(|| {
                    FailureSample::with_detail(
                        view.row_id(i),
                        display_value(column.source.as_ref(), i),
                        detail,
                    )
                });
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        Ok(Verdict {
            failed_count: self.failed,
            total_count: self.total,
            failures: self.evidence.to_vec(),
            ..Verdict::default()
        })
    }
}

/// Flags values whose distance to the mean exceeds `threshold` standard
/// deviations.
///
/// The first pass accumulates mean and variance, the second scores each
/// value against those final statistics. Scores are never computed from a
/// running mean. With fewer than two values or a zero standard deviation no
/// value can be an outlier and the second pass is skipped.
///
/// NaN and infinite values have no z-score. They fail on the first pass and
/// stay out of the mean and variance.
pub struct ZScoreCheck {
    column: String,
    threshold: f64,
    moments: StreamingMoments,
    non_numeric: u64,
    non_finite: u64,
    outliers: u64,
    evidence: Evidence,
}

impl ZScoreCheck {
    pub const KIND: &'static str = "zscore";
    pub const DEFAULT_THRESHOLD: f64 = 3.0;

    pub fn new(column: String, threshold: f64, evidence: Evidence) -> Result<Self, CheckError> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(CheckError::Configuration(format!(
                "'zscore' threshold must be a positive number, got {threshold}"
            )));
        }
        Ok(Self {
            column,
            threshold,
            moments: StreamingMoments::new(),
            non_numeric: 0,
            non_finite: 0,
            outliers: 0,
            evidence,
        })
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        Self::new(
            params.require_column(Self::KIND)?,
            params.threshold.unwrap_or(Self::DEFAULT_THRESHOLD),
            params.evidence(),
        )
    }

    /// Mean and population standard deviation, when scoring is meaningful.
    fn scoring_basis(&self) -> Option<(f64, f64)> {
        let mean = self.moments.mean()?;
        let std = self.moments.std_dev()?;
        (std > 0.0 && std.is_finite() && mean.is_finite()).then_some((mean, std))
    }
}

impl Evaluator for ZScoreCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn passes(&self) -> u8 {
        if self.scoring_basis().is_some() {
            2
        } else {
            1
        }
    }

    fn observe(&mut self, pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let column = float_column(view.batch, &self.column)?;
        if pass == 1 {
            self.non_numeric += column.unparsable.len() as u64;
            for (i, value) in column.values.iter().enumerate() {
                let Some(x) = value else { continue };
                if x.is_finite() {
                    self.moments.update(x);
                } else {
                    self.non_finite += 1;
                    self.evidence.record(|| {
                        FailureSample::with_detail(
                            view.row_id(i),
                            display_value(column.source.as_ref(), i),
                            "not a finite number".to_string(),
                        )
                    });
                }
            }
            return Ok(());
        }

        let Some((mean, std)) = self.scoring_basis() else {
            return Ok(());
        };
        for (i, value) in column.values.iter().enumerate() {
            let Some(x) = value.filter(|x| x.is_finite()) else { continue };
            let z = (x - mean).abs() / std;
            if z > self.threshold {
                self.outliers += 1;
                self.evidence.record(|| {
                    FailureSample::with_detail(
                        view.row_id(i),
                        display_value(column.source.as_ref(), i),
                        format!("z-score {z:.2}"),
                    )
                });
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        let count = self.moments.count();
        let mut verdict = Verdict {
            failed_count: self.outliers + self.non_finite,
            total_count: count + self.non_finite,
            failures: self.evidence.to_vec(),
            ..Verdict::default()
        };
        if count < 2 {
            verdict.note = Some(format!(
                "insufficient data: {count} finite numeric value(s), at least 2 required"
            ));
        } else if self.scoring_basis().is_none() {
            verdict.note = Some(match self.moments.std_dev() {
                Some(std) if std == 0.0 => {
                    "standard deviation is zero; no outliers possible".to_string()
                }
                _ => "standard deviation overflowed; values were not scored".to_string(),
            });
        }

        let metrics = &mut verdict.metrics;
        metrics.insert("count".to_string(), count as f64);
        metrics.insert("non_numeric".to_string(), self.non_numeric as f64);
        metrics.insert("non_finite".to_string(), self.non_finite as f64);
        metrics.insert("threshold".to_string(), self.threshold);
        if let Some(mean) = self.moments.mean() {
            metrics.insert("mean".to_string(), mean);
        }
        if let Some(std) = self.moments.std_dev() {
            metrics.insert("std_dev".to_string(), std);
        }
        if let (Some(min), Some(max)) = (self.moments.min(), self.moments.max()) {
            metrics.insert("min".to_string(), min);
            metrics.insert("max".to_string(), max);
        }
        Ok(verdict)
    }
}

/// Flags values outside the Tukey fences `[q1 - k*iqr, q3 + k*iqr]`.
///
/// Values are retained in a reservoir of at most `max_values`. While every
/// value fits, quartiles are exact and outliers are found without reading
/// the data again. Past that bound the quartiles are estimated from the
/// reservoir and a second pass scores every value against them.
pub struct IqrCheck {
    column: String,
    multiplier: f64,
    values: Reservoir<(u64, f64)>,
    fences: Option<IqrFences>,
    non_finite: u64,
    outliers: u64,
    evidence: Evidence,
}

impl IqrCheck {
    pub const KIND: &'static str = "iqr";
    pub const DEFAULT_MULTIPLIER: f64 = 1.5;
    pub const DEFAULT_MAX_VALUES: usize = 100_000;

    pub fn new(
        column: String,
        multiplier: f64,
        max_values: usize,
        seed: Option<u64>,
        evidence: Evidence,
    ) -> Result<Self, CheckError> {
        if !(multiplier.is_finite() && multiplier >= 0.0) {
            return Err(CheckError::Configuration(format!(
                "'iqr' multiplier must be a non-negative number, got {multiplier}"
            )));
        }
        let values = Reservoir::new(max_values, seed).map_err(|e| match e {
            SamplingError::ZeroCapacity => CheckError::Configuration(
                "'iqr' max_values must be greater than zero".to_string(),
            ),
            other => other.into(),
        })?;
        Ok(Self {
            column,
            multiplier,
            values,
            fences: None,
            non_finite: 0,
            outliers: 0,
            evidence,
        })
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        Self::new(
            params.require_column(Self::KIND)?,
            params.multiplier.unwrap_or(Self::DEFAULT_MULTIPLIER),
            params.max_values.unwrap_or(Self::DEFAULT_MAX_VALUES),
            params.seed,
            params.evidence(),
        )
    }

    fn compute_fences(&self) -> Option<IqrFences> {
        let mut retained: Vec<f64> = self.values.values().map(|(_, x)| *x).collect();
        interquartile_fences(&mut retained, self.multiplier)
    }

    fn is_exact(&self) -> bool {
        !self.values.is_saturated()
    }
}

impl Evaluator for IqrCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn passes(&self) -> u8 {
        if self.is_exact() {
            1
        } else {
            2
        }
    }

    fn observe(&mut self, pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let column = float_column(view.batch, &self.column)?;
        if pass == 1 {
            for (i, value) in column.values.iter().enumerate() {
                let Some(x) = value else { continue };
                if x.is_finite() {
                    self.values.offer((view.row_id(i), x));
                } else {
                    self.non_finite += 1;
                    self.evidence.record(|| {
                        FailureSample::with_detail(
                            view.row_id(i),
                            display_value(column.source.as_ref(), i),
                            "not a finite number".to_string(),
                        )
                    });
                }
            }
            return Ok(());
        }

        if self.fences.is_none() {
            self.fences = self.compute_fences();
            debug!(column = %self.column, fences = ?self.fences, "estimated iqr fences");
        }
        let Some(fences) = self.fences else {
            return Ok(());
        };
        for (i, value) in column.values.iter().enumerate() {
            let Some(x) = value.filter(|x| x.is_finite()) else { continue };
            if !fences.contains(x) {
                self.outliers += 1;
                self.evidence.record(|| {
                    FailureSample::with_detail(
                        view.row_id(i),
                        display_value(column.source.as_ref(), i),
                        format!("outside [{}, {}]", fences.lower, fences.upper),
                    )
                });
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        let count = self.values.items_seen();
        let mut verdict = Verdict {
            failed_count: self.non_finite,
            total_count: count + self.non_finite,
            ..Verdict::default()
        };

        let fences = if self.is_exact() {
            let fences = self.compute_fences();
            if let Some(fences) = fences {
                let mut evidence = self.evidence.clone();
                for &(row, x) in self.values.values() {
                    if !fences.contains(x) {
                        verdict.failed_count += 1;
                        evidence.record(|| {
                            FailureSample::with_detail(
                                row,
                                x.to_string(),
                                format!("outside [{}, {}]", fences.lower, fences.upper),
                            )
                        });
                    }
                }
                verdict.failures = evidence.to_vec();
            }
            fences
        } else {
            verdict.failed_count += self.outliers;
            verdict.failures = self.evidence.to_vec();
            verdict.note = Some(format!(
                "quartiles estimated from {} of {count} values",
                self.values.len()
            ));
            self.fences
        };

        if count == 0 {
            verdict.note = Some("no finite numeric values".to_string());
        }
        verdict
            .metrics
            .insert("non_finite".to_string(), self.non_finite as f64);
        if let Some(fences) = fences {
            let metrics = &mut verdict.metrics;
            metrics.insert("q1".to_string(), fences.q1);
            metrics.insert("q3".to_string(), fences.q3);
            metrics.insert("iqr".to_string(), fences.iqr());
            metrics.insert("lower_fence".to_string(), fences.lower);
            metrics.insert("upper_fence".to_string(), fences.upper);
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowIds;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn floats(values: Vec<Option<f64>>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("x", DataType::Float64, true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Float64Array::from(values))]).unwrap()
    }

    /// Run every pass the evaluator asks for over `batches`.
    fn run(check: &mut dyn Evaluator, batches: &[RecordBatch]) -> Verdict {
        let mut pass = 1;
        loop {
            let mut offset = 0;
            for batch in batches {
                check
                    .observe(pass, ChunkView::new(batch, RowIds::Contiguous(offset)))
                    .unwrap();
                offset += batch.num_rows() as u64;
            }
            if check.passes() > pass {
                pass += 1;
            } else {
                break;
            }
        }
        check.verdict().unwrap()
    }

    #[test]
    fn test_range_bounds() {
        let params = CheckParams {
            min: Some(0.0),
            max: Some(10.0),
            ..CheckParams::for_column("x")
        };
        let mut check = RangeCheck::from_params(&params).unwrap();
        let verdict = run(
            &mut check,
            &[floats(vec![Some(-1.0), Some(0.0), None, Some(10.0), Some(10.5)])],
        );
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.total_count, 4);
        assert_eq!(
            verdict.failures[0].detail.as_deref(),
            Some("below minimum 0")
        );
        assert_eq!(verdict.failures[1].row, 4);
    }

    #[test]
    fn test_range_text_values() {
        let schema = Schema::new(vec![Field::new("x", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec![Some("5"), Some("abc"), Some("50")]))],
        )
        .unwrap();
        let mut check = RangeCheck::new("x".to_string(), None, Some(10.0), Evidence::new(10)).unwrap();
        let verdict = run(&mut check, &[batch]);
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.failures[0].value, "abc");
        assert_eq!(verdict.failures[0].detail.as_deref(), Some("not numeric"));
    }

    #[test]
    fn test_range_requires_a_bound() {
        let result = RangeCheck::from_params(&CheckParams::for_column("x"));
        assert!(matches!(result, Err(CheckError::Configuration(_))));
        let inverted = RangeCheck::new("x".to_string(), Some(2.0), Some(1.0), Evidence::new(1));
        assert!(matches!(inverted, Err(CheckError::Configuration(_))));
    }

    #[test]
    fn test_zscore_uses_final_statistics() {
        // The outlier comes first: a running mean would not flag it.
        let mut values = vec![Some(1000.0)];
        values.extend((0..99).map(|i| Some((i % 10) as f64)));
        let mut check = ZScoreCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(values)]);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.failures[0].row, 0);
        assert_eq!(verdict.total_count, 100);
        assert!(verdict.note.is_none());
    }

    #[test]
    fn test_zscore_zero_variance() {
        let mut check = ZScoreCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(vec![Some(4.0); 5])]);
        assert_eq!(check.passes(), 1);
        assert_eq!(verdict.failed_count, 0);
        assert_eq!(
            verdict.note.as_deref(),
            Some("standard deviation is zero; no outliers possible")
        );
    }

    #[test]
    fn test_zscore_infinity_fails_without_hiding_variance() {
        let mut values: Vec<Option<f64>> = (0..99).map(|i| Some((i % 10) as f64)).collect();
        values.push(Some(f64::INFINITY));
        let mut check = ZScoreCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(values)]);
        assert_eq!(check.passes(), 2);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.total_count, 100);
        assert_eq!(verdict.failures[0].row, 99);
        assert_eq!(
            verdict.failures[0].detail.as_deref(),
            Some("not a finite number")
        );
        assert!(verdict.note.is_none());
        assert_eq!(verdict.metrics["non_finite"], 1.0);
        assert!(verdict.metrics["mean"].is_finite());
        assert!(verdict.metrics["std_dev"] > 0.0);
        assert_eq!(verdict.metrics["max"], 9.0);
    }

    #[test]
    fn test_zscore_text_infinity() {
        let schema = Schema::new(vec![Field::new("x", DataType::Utf8, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec!["1", "2", "inf", "3"]))],
        )
        .unwrap();
        let mut check = ZScoreCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[batch]);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.failures[0].value, "inf");
        assert_ne!(
            verdict.note.as_deref(),
            Some("standard deviation is zero; no outliers possible")
        );
    }

    #[test]
    fn test_zscore_insufficient_data() {
        let mut check = ZScoreCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(vec![Some(4.0), None])]);
        assert_eq!(verdict.failed_count, 0);
        assert!(verdict.note.unwrap().starts_with("insufficient data"));
    }

    #[test]
    fn test_zscore_invalid_threshold() {
        for threshold in [0.0, -1.0, f64::INFINITY] {
            let result = ZScoreCheck::new("x".to_string(), threshold, Evidence::new(1));
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_iqr_exact() {
        let mut values: Vec<Option<f64>> = (1..=20).map(|i| Some(i as f64)).collect();
        values.push(Some(100.0));
        let mut check = IqrCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(values)]);
        assert_eq!(check.passes(), 1);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.failures[0].row, 20);
        assert_eq!(verdict.total_count, 21);
        assert_eq!(verdict.metrics["q1"], 6.0);
        assert!(verdict.note.is_none());
    }

    #[test]
    fn test_iqr_bounded_uses_second_pass() {
        let mut values: Vec<Option<f64>> = (0..1_000).map(|i| Some((i % 100) as f64)).collect();
        values[500] = Some(10_000.0);
        let params = CheckParams {
            max_values: Some(200),
            seed: Some(7),
            ..CheckParams::for_column("x")
        };
        let mut check = IqrCheck::from_params(&params).unwrap();
        let verdict = run(&mut check, &[floats(values)]);
        assert_eq!(check.passes(), 2);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.failures[0].row, 500);
        assert!(verdict.note.unwrap().contains("200 of 1000"));
    }

    #[test]
    fn test_iqr_infinity_kept_out_of_quartiles() {
        let mut values: Vec<Option<f64>> = (1..=20).map(|i| Some(i as f64)).collect();
        values.push(Some(f64::NEG_INFINITY));
        let mut check = IqrCheck::from_params(&CheckParams::for_column("x")).unwrap();
        let verdict = run(&mut check, &[floats(values)]);
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.total_count, 21);
        assert_eq!(verdict.failures[0].row, 20);
        assert_eq!(verdict.metrics["q1"], 5.75);
        assert_eq!(verdict.metrics["non_finite"], 1.0);
    }

    #[test]
    fn test_iqr_zero_max_values() {
        let params = CheckParams {
            max_values: Some(0),
            ..CheckParams::for_column("x")
        };
        assert!(matches!(
            IqrCheck::from_params(&params),
            Err(CheckError::Configuration(_))
        ));
    }
}
