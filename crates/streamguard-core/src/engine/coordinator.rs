use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::{
    engine::{
        check_state::{CheckConfig, CheckState},
        source::SourceFactory,
    },
    errors::{CheckError, EngineError},
    results::{CheckResult, RunReport},
};

/// Upper bound on passes over the source, the first one included.
pub const MAX_PASSES: u8 = 3;

/// Runs many checks over one chunk source.
///
/// The first pass reads the source once and feeds every chunk to every
/// check in registration order. Checks that need another pass (full-scan
/// statistics such as z-scores) trigger a re-read through the factory, and
/// only those checks see it. A failing source aborts the whole run: every
/// check is torn down and no partial result is returned.
#[derive(Debug, Default)]
pub struct SinglePassCoordinator {
    passes_run: u8,
    rows_read: u64,
}

impl SinglePassCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes over the source made by the last run.
    pub fn passes_run(&self) -> u8 {
        self.passes_run
    }

    /// Rows read on the first pass of the last run.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Run `checks` and return one result per check, in the order given.
    #[instrument(skip_all, fields(checks = checks.len()))]
    pub fn run<F: SourceFactory>(
        &mut self,
        checks: Vec<CheckConfig>,
        mut factory: F,
    ) -> Result<Vec<CheckResult>, EngineError> {
        self.passes_run = 0;
        self.rows_read = 0;
        if checks.is_empty() {
            debug!("no checks registered, source not opened");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut states = Self::register(checks);

        let mut pass = 1;
        let mut active: Vec<usize> = (0..states.len()).collect();
        loop {
            self.run_pass(pass, &mut states, &active, &mut factory)?;
            self.passes_run = pass;
            if pass == MAX_PASSES {
                break;
            }
            pass += 1;
            active = (0..states.len())
                .filter(|&i| states[i].wants_pass(pass))
                .collect();
            if active.is_empty() {
                break;
            }
            for &i in &active {
                states[i].begin_pass(pass)?;
            }
        }

        let results: Vec<CheckResult> = states.iter_mut().map(CheckState::finalize).collect();
        let failed = results.iter().filter(|r| !r.passed).count();
        info!(
            rows = self.rows_read,
            passes = self.passes_run,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run completed"
        );
        Ok(results)
    }

    /// Like [`run`](Self::run), wrapping the results in a named report.
    pub fn run_report<F: SourceFactory>(
        &mut self,
        name: impl Into<String>,
        checks: Vec<CheckConfig>,
        factory: F,
    ) -> Result<RunReport, EngineError> {
        let results = self.run(checks, factory)?;
        Ok(RunReport::new(
            name.into(),
            self.rows_read,
            self.passes_run,
            results,
        ))
    }

    /// Create one state per check. Repeated identifiers fail the later checks.
    fn register(checks: Vec<CheckConfig>) -> Vec<CheckState> {
        let mut seen = HashSet::new();
        checks
            .into_iter()
            .map(|config| {
                if seen.insert(config.check_id.clone()) {
                    CheckState::new(config)
                } else {
                    warn!(check_id = %config.check_id, "duplicate check identifier");
                    let error = CheckError::Configuration(format!(
                        "duplicate check identifier '{}'",
                        config.check_id
                    ));
                    CheckState::new(CheckConfig::invalid(config.check_id, config.kind, error))
                }
            })
            .collect()
    }

    fn run_pass<F: SourceFactory>(
        &mut self,
        pass: u8,
        states: &mut [CheckState],
        active: &[usize],
        factory: &mut F,
    ) -> Result<(), EngineError> {
        debug!(pass, checks = active.len(), "opening source");
        let source = match factory.open() {
            Ok(source) => source,
            Err(e) => {
                Self::teardown(states, &e);
                return Err(e);
            }
        };

        for (chunk_index, chunk) in source.enumerate() {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    let error = EngineError::DataAccess {
                        pass,
                        chunk_index,
                        source,
                    };
                    Self::teardown(states, &error);
                    return Err(error);
                }
            };
            if pass == 1 {
                self.rows_read += chunk.num_rows() as u64;
            }
            for &i in active {
                if let Err(e) = states[i].process_chunk(&chunk, chunk_index) {
                    Self::teardown(states, &e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn teardown(states: &mut [CheckState], error: &EngineError) {
        warn!(error = %error, "aborting run");
        let reason = error.to_string();
        for state in states {
            state.abort(&reason);
        }
    }
}
