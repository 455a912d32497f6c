use std::collections::HashSet;

use arrow::array::Array;
use regex::Regex;

use crate::{
    checks::{CheckParams, Evaluator, Evidence, Verdict},
    errors::CheckError,
    results::FailureSample,
    types::ChunkView,
    utils::{columns::utf8_column, hasher::Xxh3Builder},
};

/// Every non-null value must match a regular expression in full.
pub struct PatternCheck {
    column: String,
    regex: Regex,
    total: u64,
    failed: u64,
    evidence: Evidence,
}

impl PatternCheck {
    pub const KIND: &'static str = "pattern";

    pub fn new(column: String, pattern: &str, evidence: Evidence) -> Result<Self, CheckError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| CheckError::Configuration(format!("Invalid pattern '{pattern}': {e}")))?;
        Ok(Self {
            column,
            regex,
            total: 0,
            failed: 0,
            evidence,
        })
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        let column = params.require_column(Self::KIND)?;
        let pattern = params.pattern.as_deref().ok_or_else(|| {
            CheckError::Configuration("'pattern' check requires a 'pattern'".to_string())
        })?;
        Self::new(column, pattern, params.evidence())
    }
}

impl Evaluator for PatternCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn observe(&mut self, _pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let array = utf8_column(view.batch, &self.column)?;
        self.total += (array.len() - array.null_count()) as u64;
        for (i, value) in array.iter().enumerate() {
            let Some(value) = value else { continue };
            if !self.regex.is_match(value) {
                self.failed += 1;
                self.evidence
                    .record(|| FailureSample::new(view.row_id(i), value.to_string()));
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

/// Every non-null value must belong to a fixed reference set.
pub struct AllowedValuesCheck {
    column: String,
    members: HashSet<String, Xxh3Builder>,
    total: u64,
    failed: u64,
    evidence: Evidence,
}

impl AllowedValuesCheck {
    pub const KIND: &'static str = "allowed_values";

    pub fn new(column: String, allowed: Vec<String>, evidence: Evidence) -> Self {
        let mut members = HashSet::with_hasher(Xxh3Builder);
        members.extend(allowed);
        Self {
            column,
            members,
            total: 0,
            failed: 0,
            evidence,
        }
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        let column = params.require_column(Self::KIND)?;
        let values = params.values.clone().ok_or_else(|| {
            CheckError::Configuration("'allowed_values' check requires 'values'".to_string())
        })?;
        Ok(Self::new(column, values, params.evidence()))
    }

    #[inline]
    fn is_allowed(&self, value: &str) -> bool {
        self.members.contains(value)
    }
}

impl Evaluator for AllowedValuesCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn observe(&mut self, _pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let array = utf8_column(view.batch, &self.column)?;
        self.total += (array.len() - array.null_count()) as u64;
        for (i, value) in array.iter().enumerate() {
            let Some(value) = value else { continue };
            if !self.is_allowed(value) {
                self.failed += 1;
                self.evidence
                    .record(|| FailureSample::new(view.row_id(i), value.to_string()));
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        let mut verdict = Verdict {
            failed_count: self.failed,
            total_count: self.total,
            failures: self.evidence.to_vec(),
            ..Verdict::default()
        };
        verdict
            .metrics
            .insert("allowed_values".to_string(), self.members.len() as f64);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowIds;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn codes(values: Vec<Option<&str>>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("code", DataType::Utf8, true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(StringArray::from(values))]).unwrap()
    }

    #[test]
    fn test_pattern_full_match() {
        let mut check = PatternCheck::new("code".to_string(), r"\d{3}", Evidence::new(10)).unwrap();
        let batch = codes(vec![Some("123"), Some("1234"), Some("a123"), None, Some("999")]);
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(10)))
            .unwrap();
        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.total_count, 4);
        assert_eq!(verdict.failures[0].row, 11);
        assert_eq!(verdict.failures[1].value, "a123");
    }

    #[test]
    fn test_pattern_alternation_is_anchored() {
        let mut check = PatternCheck::new("code".to_string(), "a|b", Evidence::new(10)).unwrap();
        let batch = codes(vec![Some("a"), Some("ab"), Some("xb")]);
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap();
        assert_eq!(check.verdict().unwrap().failed_count, 2);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternCheck::new("code".to_string(), "(", Evidence::new(10));
        assert!(matches!(result, Err(CheckError::Configuration(_))));
    }

    #[test]
    fn test_allowed_values() {
        let params = CheckParams {
            values: Some(vec!["FR".to_string(), "DE".to_string()]),
            ..CheckParams::for_column("code")
        };
        let mut check = AllowedValuesCheck::from_params(&params).unwrap();
        let batch = codes(vec![Some("FR"), Some("US"), None, Some("DE"), Some("fr")]);
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap();
        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.total_count, 4);
        let values: Vec<&str> = verdict.failures.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["US", "fr"]);
    }

    #[test]
    fn test_allowed_values_requires_values() {
        let result = AllowedValuesCheck::from_params(&CheckParams::for_column("code"));
        assert!(matches!(result, Err(CheckError::Configuration(_))));
    }
}
