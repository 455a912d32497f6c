//! Built-in checks and the registry that builds them by kind.
//!
//! A check is split in two: an [`Evaluator`] that knows how to judge rows,
//! and a `CheckState` (in the engine) that feeds it chunks and owns its
//! lifecycle. Evaluators never see sampling; in sampled mode the state hands
//! them the sample as a single chunk whose row ids are origin indices.
pub mod generic;
pub mod numeric;
pub mod string;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::CheckError;
use crate::keyset::{KeySetConfig, PrefilterConfig};
use crate::results::FailureSample;
use crate::types::ChunkView;

pub use generic::{NotNullCheck, UniqueCheck};
pub use numeric::{IqrCheck, RangeCheck, ZScoreCheck};
pub use string::{AllowedValuesCheck, PatternCheck};

/// Failing rows kept per check unless configured otherwise.
pub const DEFAULT_MAX_FAILURE_SAMPLES: usize = 10;

/// Judges rows of a dataset, one chunk at a time.
pub trait Evaluator: Send {
    /// Kind name, as registered in [`CheckRegistry`].
    fn kind(&self) -> &'static str;

    /// Passes over the data this evaluator needs.
    ///
    /// Read again after every completed pass, so an evaluator may ask for a
    /// second pass only once it knows it needs one.
    fn passes(&self) -> u8 {
        1
    }

    /// Consume one chunk of pass `pass` (starting at 1).
    fn observe(&mut self, pass: u8, view: ChunkView<'_>) -> Result<(), CheckError>;

    /// Counts and evidence gathered so far.
    fn verdict(&self) -> Result<Verdict, CheckError>;

    /// Release external resources. Called exactly once, after `verdict`.
    fn release(&mut self) -> Result<(), CheckError> {
        Ok(())
    }
}

/// What an evaluator found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub failed_count: u64,
    /// Rows the check applied to
    pub total_count: u64,
    pub failures: Vec<FailureSample>,
    pub note: Option<String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Bounded list of failing rows.
#[derive(Debug, Clone)]
pub struct Evidence {
    max: usize,
    samples: Vec<FailureSample>,
}

impl Evidence {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            samples: Vec::with_capacity(max.min(64)),
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max
    }

    /// Record a failure built lazily, only while there is room left.
    #[inline]
    pub fn record(&mut self, make: impl FnOnce() -> FailureSample) {
        if !self.is_full() {
            self.samples.push(make());
        }
    }

    pub fn samples(&self) -> &[FailureSample] {
        &self.samples
    }

    pub fn to_vec(&self) -> Vec<FailureSample> {
        self.samples.clone()
    }
}

/// Parameters of a check, as read from configuration.
///
/// Every kind reads the fields it understands and rejects missing required ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckParams {
    pub column: Option<String>,
    pub columns: Option<Vec<String>>,
    pub pattern: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub values: Option<Vec<String>>,
    pub threshold: Option<f64>,
    pub multiplier: Option<f64>,
    pub max_values: Option<usize>,
    pub memory_limit: Option<usize>,
    pub prefilter: Option<bool>,
    pub expected_keys: Option<usize>,
    pub false_positive_rate: Option<f64>,
    pub spill_dir: Option<PathBuf>,
    pub max_failure_samples: Option<usize>,
    pub seed: Option<u64>,
}

impl CheckParams {
    pub fn for_column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::default()
        }
    }

    pub(crate) fn require_column(&self, kind: &str) -> Result<String, CheckError> {
        self.column.clone().ok_or_else(|| {
            CheckError::Configuration(format!("'{kind}' check requires a 'column'"))
        })
    }

    /// Key columns: `columns` when set, else the single `column`.
    pub(crate) fn key_columns(&self, kind: &str) -> Result<Vec<String>, CheckError> {
        match (&self.columns, &self.column) {
            (Some(columns), _) if !columns.is_empty() => Ok(columns.clone()),
            (Some(_), _) => Err(CheckError::Configuration(format!(
                "'{kind}' check requires at least one key column"
            ))),
            (None, Some(column)) => Ok(vec![column.clone()]),
            (None, None) => Err(CheckError::Configuration(format!(
                "'{kind}' check requires 'column' or 'columns'"
            ))),
        }
    }

    pub(crate) fn evidence(&self) -> Evidence {
        Evidence::new(
            self.max_failure_samples
                .unwrap_or(DEFAULT_MAX_FAILURE_SAMPLES),
        )
    }

    pub(crate) fn keyset_config(&self) -> KeySetConfig {
        let defaults = KeySetConfig::default();
        let prefilter = match self.prefilter {
            Some(true) => {
                let base = PrefilterConfig::default();
                Some(PrefilterConfig {
                    expected_items: self.expected_keys.unwrap_or(base.expected_items),
                    false_positive_rate: self
                        .false_positive_rate
                        .unwrap_or(base.false_positive_rate),
                })
            }
            _ => None,
        };
        KeySetConfig {
            memory_limit: self.memory_limit.unwrap_or(defaults.memory_limit),
            prefilter,
            spill_dir: self.spill_dir.clone(),
        }
    }
}

pub type EvaluatorConstructor =
    Box<dyn Fn(&CheckParams) -> Result<Box<dyn Evaluator>, CheckError> + Send + Sync>;

/// Maps check kinds to constructors.
pub struct CheckRegistry {
    constructors: HashMap<String, EvaluatorConstructor>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl CheckRegistry {
    /// A registry with no kinds.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with every built-in kind.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(NotNullCheck::KIND, |p| {
            Ok(Box::new(NotNullCheck::from_params(p)?))
        });
        registry.register(UniqueCheck::KIND, |p| {
            Ok(Box::new(UniqueCheck::from_params(p)?))
        });
        registry.register(PatternCheck::KIND, |p| {
            Ok(Box::new(PatternCheck::from_params(p)?))
        });
        registry.register(AllowedValuesCheck::KIND, |p| {
            Ok(Box::new(AllowedValuesCheck::from_params(p)?))
        });
        registry.register(RangeCheck::KIND, |p| {
            Ok(Box::new(RangeCheck::from_params(p)?))
        });
        registry.register(ZScoreCheck::KIND, |p| {
            Ok(Box::new(ZScoreCheck::from_params(p)?))
        });
        registry.register(IqrCheck::KIND, |p| Ok(Box::new(IqrCheck::from_params(p)?)));
        registry
    }

    /// Register `kind`, replacing any previous constructor for it.
    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&CheckParams) -> Result<Box<dyn Evaluator>, CheckError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
    }

    pub fn build(&self, kind: &str, params: &CheckParams) -> Result<Box<dyn Evaluator>, CheckError> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| CheckError::Configuration(format!("Unknown check kind '{kind}'")))?;
        constructor(params)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
