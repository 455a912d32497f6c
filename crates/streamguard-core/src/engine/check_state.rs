use tracing::{debug, warn};

use crate::{
    checks::{CheckParams, CheckRegistry, Evaluator, Verdict},
    errors::{CheckError, EngineError},
    results::{CheckResult, SamplingInfo},
    sampling::ReservoirSampler,
    types::{Chunk, ChunkView, RowIds},
};

/// How a check sees the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Every row, every pass the check needs
    #[default]
    FullScan,
    /// A uniform sample of at most `sample_size` rows drawn on the first pass
    Sampled {
        sample_size: usize,
        seed: Option<u64>,
    },
}

/// A check to run: identity, mode, tolerance and its evaluator.
///
/// A configuration error is carried instead of an evaluator so the check
/// reports it as its own failed result without affecting the others.
pub struct CheckConfig {
    pub check_id: String,
    pub kind: String,
    pub mode: ExecutionMode,
    /// Largest failure ratio that still passes
    pub tolerance: f64,
    evaluator: Result<Box<dyn Evaluator>, CheckError>,
}

impl std::fmt::Debug for CheckConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckConfig")
            .field("check_id", &self.check_id)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("tolerance", &self.tolerance)
            .field("is_valid", &self.is_valid())
            .finish()
    }
}

impl CheckConfig {
    pub fn new(check_id: impl Into<String>, evaluator: Box<dyn Evaluator>) -> Self {
        Self {
            check_id: check_id.into(),
            kind: evaluator.kind().to_string(),
            mode: ExecutionMode::FullScan,
            tolerance: 0.0,
            evaluator: Ok(evaluator),
        }
    }

    /// Build the evaluator of `kind` from `params`, keeping any error.
    pub fn from_registry(
        registry: &CheckRegistry,
        check_id: impl Into<String>,
        kind: &str,
        params: &CheckParams,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            kind: kind.to_string(),
            mode: ExecutionMode::FullScan,
            tolerance: 0.0,
            evaluator: registry.build(kind, params),
        }
    }

    /// A check known to be misconfigured.
    pub fn invalid(check_id: impl Into<String>, kind: impl Into<String>, error: CheckError) -> Self {
        Self {
            check_id: check_id.into(),
            kind: kind.into(),
            mode: ExecutionMode::FullScan,
            tolerance: 0.0,
            evaluator: Err(error),
        }
    }

    pub fn with_mode(self, mode: ExecutionMode) -> Self {
        Self { mode, ..self }
    }

    pub fn sampled(self, sample_size: usize, seed: Option<u64>) -> Self {
        self.with_mode(ExecutionMode::Sampled { sample_size, seed })
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn is_valid(&self) -> bool {
        self.evaluator.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Accumulating,
    Finalized,
}

enum Accumulator {
    FullScan(Box<dyn Evaluator>),
    Sampled {
        sampler: ReservoirSampler,
        evaluator: Box<dyn Evaluator>,
    },
    /// No evaluator: construction failed or resources were released
    Empty,
}

/// Lifecycle of one check within a run.
///
/// `Created -> Accumulating -> Finalized`. Chunks go in through
/// [`process_chunk`](Self::process_chunk), the result comes out of
/// [`finalize`](Self::finalize), which is idempotent and releases the
/// check's resources on its first call. A check error is kept and turned
/// into a failed result; later chunks are ignored for that check only.
pub struct CheckState {
    check_id: String,
    kind: String,
    mode: ExecutionMode,
    tolerance: f64,
    phase: Phase,
    accumulator: Accumulator,
    pass: u8,
    rows_seen: u64,
    pass_offset: u64,
    error: Option<CheckError>,
    result: Option<CheckResult>,
}

impl CheckState {
    pub fn new(config: CheckConfig) -> Self {
        let CheckConfig {
            check_id,
            kind,
            mode,
            tolerance,
            evaluator,
        } = config;

        let built = evaluator.and_then(|evaluator| {
            if !(tolerance.is_finite() && (0.0..=1.0).contains(&tolerance)) {
                return Err(CheckError::Configuration(format!(
                    "tolerance must be within [0, 1], got {tolerance}"
                )));
            }
            match mode {
                ExecutionMode::FullScan => Ok(Accumulator::FullScan(evaluator)),
                ExecutionMode::Sampled { sample_size, seed } => Ok(Accumulator::Sampled {
                    sampler: ReservoirSampler::new(sample_size, seed)?,
                    evaluator,
                }),
            }
        });
        let (accumulator, error) = match built {
            Ok(accumulator) => (accumulator, None),
            Err(e) => {
                warn!(check_id = %check_id, error = %e, "check is misconfigured");
                (Accumulator::Empty, Some(e))
            }
        };

        Self {
            check_id,
            kind,
            mode,
            tolerance,
            phase: Phase::Created,
            accumulator,
            pass: 1,
            rows_seen: 0,
            pass_offset: 0,
            error,
            result: None,
        }
    }

    pub fn check_id(&self) -> &str {
        &self.check_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Rows offered on the first pass.
    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this check takes part in pass `pass` (starting at 2) over the source.
    pub fn wants_pass(&self, pass: u8) -> bool {
        if pass < 2 || self.phase == Phase::Finalized || self.error.is_some() {
            return false;
        }
        match &self.accumulator {
            Accumulator::FullScan(evaluator) => evaluator.passes() >= pass,
            _ => false,
        }
    }

    /// Start pass `pass`. Row ids restart from zero.
    pub fn begin_pass(&mut self, pass: u8) -> Result<(), EngineError> {
        if !self.wants_pass(pass) {
            return Err(EngineError::InvalidPass {
                check_id: self.check_id.clone(),
                pass,
            });
        }
        debug!(check_id = %self.check_id, pass, "beginning pass");
        self.pass = pass;
        self.pass_offset = 0;
        Ok(())
    }

    /// Feed one chunk of the current pass.
    pub fn process_chunk(&mut self, chunk: &Chunk, chunk_index: usize) -> Result<(), EngineError> {
        if self.phase == Phase::Finalized {
            return Err(EngineError::AlreadyFinalized(self.check_id.clone()));
        }
        self.phase = Phase::Accumulating;

        let rows = chunk.num_rows() as u64;
        let offset = self.pass_offset;
        self.pass_offset += rows;
        if self.pass == 1 {
            self.rows_seen += rows;
        }
        if self.error.is_some() {
            return Ok(());
        }

        let outcome = match &mut self.accumulator {
            Accumulator::FullScan(evaluator) => {
                evaluator.observe(self.pass, ChunkView::new(chunk, RowIds::Contiguous(offset)))
            }
            Accumulator::Sampled { sampler, .. } => sampler.add_chunk(chunk).map_err(Into::into),
            Accumulator::Empty => Ok(()),
        };
        if let Err(e) = outcome {
            warn!(
                check_id = %self.check_id,
                pass = self.pass,
                chunk_index,
                error = %e,
                "check failed; ignoring its remaining chunks"
            );
            self.error = Some(e);
        }
        Ok(())
    }

    /// Produce the result. Later calls return the same result.
    pub fn finalize(&mut self) -> CheckResult {
        if let Some(result) = &self.result {
            return result.clone();
        }

        let mut result = CheckResult::new(self.check_id.clone(), self.kind.clone());
        let computed = match self.error.take() {
            Some(e) => Err(e),
            None => self.compute(&mut result),
        };
        match computed {
            Ok(verdict) => self.apply(&mut result, verdict),
            Err(e) => result.set_failed(e.to_string()),
        }
        self.release();

        debug!(
            check_id = %self.check_id,
            passed = result.passed,
            failed = result.failed_count,
            total = result.total_count,
            "check finalized"
        );
        self.phase = Phase::Finalized;
        self.result = Some(result.clone());
        result
    }

    /// Release resources after a run was aborted. The check keeps a failed result.
    pub fn abort(&mut self, reason: &str) {
        if self.result.is_some() {
            return;
        }
        self.release();
        self.phase = Phase::Finalized;
        self.result = Some(CheckResult::errored(
            self.check_id.clone(),
            self.kind.clone(),
            format!("run aborted: {reason}"),
        ));
    }

    fn compute(&mut self, result: &mut CheckResult) -> Result<Verdict, CheckError> {
        match &mut self.accumulator {
            Accumulator::FullScan(evaluator) => evaluator.verdict(),
            Accumulator::Sampled { sampler, evaluator } => {
                let sample = sampler.get_sample()?;
                result.is_sampled = true;
                result.sample_size = Some(sample.len());
                result.population_size = Some(sample.population_size);
                if sample.is_empty() {
                    return Ok(Verdict {
                        note: Some("no rows to sample".to_string()),
                        ..Verdict::default()
                    });
                }

                let view = ChunkView::new(&sample.batch, RowIds::Explicit(&sample.origin_indices));
                let mut pass = 1;
                loop {
                    evaluator.observe(pass, view)?;
                    if evaluator.passes() > pass {
                        pass += 1;
                    } else {
                        break;
                    }
                }
                let verdict = evaluator.verdict()?;
                result.sampling = Some(SamplingInfo::estimate(
                    sample.len(),
                    sample.population_size,
                    verdict.failed_count,
                    verdict.total_count,
                ));
                Ok(verdict)
            }
            Accumulator::Empty => Err(CheckError::Configuration(
                "check has no evaluator".to_string(),
            )),
        }
    }

    fn apply(&self, result: &mut CheckResult, verdict: Verdict) {
        result.failed_count = verdict.failed_count;
        result.total_count = verdict.total_count;
        result.sample_failures = verdict.failures;
        result.note = verdict.note;
        result.metrics = verdict.metrics;
        result.passed = result.failure_ratio() <= self.tolerance;
    }

    fn release(&mut self) {
        let accumulator = std::mem::replace(&mut self.accumulator, Accumulator::Empty);
        let released = match accumulator {
            Accumulator::FullScan(mut evaluator) => evaluator.release(),
            Accumulator::Sampled { mut evaluator, .. } => evaluator.release(),
            Accumulator::Empty => Ok(()),
        };
        if let Err(e) = released {
            warn!(check_id = %self.check_id, error = %e, "failed to release check resources");
        }
    }
}

impl Drop for CheckState {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{NotNullCheck, UniqueCheck};
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn ids(values: Vec<Option<i64>>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    fn not_null() -> CheckConfig {
        CheckConfig::new(
            "id_not_null",
            Box::new(NotNullCheck::from_params(&CheckParams::for_column("id")).unwrap()),
        )
    }

    #[test]
    fn test_lifecycle() {
        let mut state = CheckState::new(not_null());
        assert_eq!(state.phase(), Phase::Created);
        state.process_chunk(&ids(vec![Some(1), None]), 0).unwrap();
        assert_eq!(state.phase(), Phase::Accumulating);
        let result = state.finalize();
        assert_eq!(state.phase(), Phase::Finalized);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.sample_failures[0].row, 1);
        assert!(!result.passed);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut state = CheckState::new(not_null());
        state.process_chunk(&ids(vec![None, None, Some(3)]), 0).unwrap();
        let first = state.finalize();
        let second = state.finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn test_process_after_finalize_fails() {
        let mut state = CheckState::new(not_null());
        state.finalize();
        let err = state.process_chunk(&ids(vec![Some(1)]), 0).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyFinalized(id) if id == "id_not_null"));
    }

    #[test]
    fn test_tolerance() {
        let mut state = CheckState::new(not_null().with_tolerance(0.5));
        state
            .process_chunk(&ids(vec![None, Some(1), Some(2), Some(3)]), 0)
            .unwrap();
        assert!(state.finalize().passed);
    }

    #[test]
    fn test_invalid_tolerance_is_a_check_error() {
        let mut state = CheckState::new(not_null().with_tolerance(1.5));
        assert!(state.has_error());
        let result = state.finalize();
        assert!(!result.passed);
        assert!(result.error.unwrap().contains("tolerance"));
    }

    #[test]
    fn test_check_error_is_captured() {
        let config = CheckConfig::new(
            "missing",
            Box::new(NotNullCheck::from_params(&CheckParams::for_column("nope")).unwrap()),
        );
        let mut state = CheckState::new(config);
        state.process_chunk(&ids(vec![Some(1)]), 0).unwrap();
        state.process_chunk(&ids(vec![Some(2)]), 1).unwrap();
        assert_eq!(state.rows_seen(), 2);
        let result = state.finalize();
        assert!(!result.passed);
        assert!(result.error.unwrap().contains("nope"));
    }

    #[test]
    fn test_sampled_mode() {
        let mut state = CheckState::new(not_null().sampled(3, Some(42)));
        for chunk_index in 0..10 {
            let values = (0..10).map(|i| Some(chunk_index * 10 + i)).collect();
            state.process_chunk(&ids(values), chunk_index as usize).unwrap();
        }
        let result = state.finalize();
        assert!(result.is_sampled);
        assert_eq!(result.sample_size, Some(3));
        assert_eq!(result.population_size, Some(100));
        assert_eq!(result.total_count, 3);
        assert!(result.passed);
        assert!(result.sampling.is_some());
    }

    #[test]
    fn test_sampled_zero_size_is_configuration_error() {
        let mut state = CheckState::new(not_null().sampled(0, None));
        let result = state.finalize();
        assert!(!result.passed);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_full_scan_does_not_want_second_pass() {
        let state = CheckState::new(not_null());
        assert!(!state.wants_pass(2));
        let mut state = state;
        assert!(matches!(
            state.begin_pass(2),
            Err(EngineError::InvalidPass { pass: 2, .. })
        ));
    }

    #[test]
    fn test_finalize_releases_spill_file() {
        let dir = tempfile::tempdir().unwrap();
        let params = CheckParams {
            memory_limit: Some(0),
            spill_dir: Some(dir.path().to_path_buf()),
            ..CheckParams::for_column("id")
        };
        let config = CheckConfig::new("u", Box::new(UniqueCheck::from_params(&params).unwrap()));
        let mut state = CheckState::new(config);
        state
            .process_chunk(&ids(vec![Some(1), Some(1)]), 0)
            .unwrap();
        let result = state.finalize();
        assert_eq!(result.failed_count, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_abort_releases_and_fails() {
        let mut state = CheckState::new(not_null());
        state.process_chunk(&ids(vec![Some(1)]), 0).unwrap();
        state.abort("source failed");
        let result = state.finalize();
        assert!(!result.passed);
        assert_eq!(result.error.as_deref(), Some("run aborted: source failed"));
    }
}
