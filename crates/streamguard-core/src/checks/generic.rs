use arrow::{
    array::{Array, ArrayRef},
    datatypes::DataType,
    row::{RowConverter, SortField},
};
use tracing::debug;

use crate::{
    checks::{CheckParams, Evaluator, Evidence, Verdict},
    errors::CheckError,
    keyset::{Insertion, MemoryBoundedKeySet},
    results::FailureSample,
    types::ChunkView,
    utils::columns::{column_by_name, display_value},
};

/// Fails every null slot of a column.
pub struct NotNullCheck {
    column: String,
    total: u64,
    nulls: u64,
    evidence: Evidence,
}

impl NotNullCheck {
    pub const KIND: &'static str = "not_null";

    pub fn new(column: String, evidence: Evidence) -> Self {
        Self {
            column,
            total: 0,
            nulls: 0,
            evidence,
        }
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        Ok(Self::new(params.require_column(Self::KIND)?, params.evidence()))
    }
}

impl Evaluator for NotNullCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn observe(&mut self, _pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let array = column_by_name(view.batch, &self.column)?;
        self.total += array.len() as u64;
        let nulls = array.null_count();
        if nulls == 0 {
            return Ok(());
        }
        self.nulls += nulls as u64;
        if !self.evidence.is_full() {
            for i in (0..array.len()).filter(|&i| array.is_null(i)) {
                self.evidence
                    .record(|| FailureSample::new(view.row_id(i), "null".to_string()));
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        Ok(Verdict {
            failed_count: self.nulls,
            total_count: self.total,
            failures: self.evidence.to_vec(),
            ..Verdict::default()
        })
    }
}

/// Exact duplicate detection over one or more key columns.
///
/// Keys are encoded with the Arrow row format so that composite keys of any
/// column types compare exactly. Rows with a null in any key column are not
/// keys and are skipped. Every later occurrence of a key is a failure, and
/// its evidence names the row where the key was first seen.
pub struct UniqueCheck {
    columns: Vec<String>,
    converter: Option<(RowConverter, Vec<DataType>)>,
    keys: MemoryBoundedKeySet,
    null_keys: u64,
    checked: u64,
    duplicates: u64,
    evidence: Evidence,
}

impl UniqueCheck {
    pub const KIND: &'static str = "unique";

    pub fn new(
        columns: Vec<String>,
        keys: MemoryBoundedKeySet,
        evidence: Evidence,
    ) -> Self {
        Self {
            columns,
            converter: None,
            keys,
            null_keys: 0,
            checked: 0,
            duplicates: 0,
            evidence,
        }
    }

    pub fn from_params(params: &CheckParams) -> Result<Self, CheckError> {
        let columns = params.key_columns(Self::KIND)?;
        let keys = MemoryBoundedKeySet::new(params.keyset_config())?;
        Ok(Self::new(columns, keys, params.evidence()))
    }

    /// Converter for the key columns, created from the first chunk's types.
    fn converter_for(&mut self, arrays: &[ArrayRef]) -> Result<&RowConverter, CheckError> {
        let types: Vec<DataType> = arrays.iter().map(|a| a.data_type().clone()).collect();
        if let Some((_, known)) = &self.converter {
            if *known != types {
                let column = self
                    .columns
                    .iter()
                    .zip(known.iter().zip(&types))
                    .find(|(_, (a, b))| a != b)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default();
                return Err(CheckError::TypeCastError(
                    column,
                    "type changed between chunks".to_string(),
                ));
            }
        } else {
            let fields = types.iter().cloned().map(SortField::new).collect();
            self.converter = Some((RowConverter::new(fields)?, types));
        }
        match &self.converter {
            Some((converter, _)) => Ok(converter),
            None => Err(CheckError::Configuration(
                "key converter missing".to_string(),
            )),
        }
    }

    fn render_key(arrays: &[ArrayRef], i: usize) -> String {
        match arrays {
            [single] => display_value(single.as_ref(), i),
            many => {
                let parts: Vec<String> = many
                    .iter()
                    .map(|a| display_value(a.as_ref(), i))
                    .collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl Evaluator for UniqueCheck {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn observe(&mut self, _pass: u8, view: ChunkView<'_>) -> Result<(), CheckError> {
        let arrays = self
            .columns
            .iter()
            .map(|name| column_by_name(view.batch, name).cloned())
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let rows = self.converter_for(&arrays)?.convert_columns(&arrays)?;
        let has_nulls = arrays.iter().any(|a| a.null_count() > 0);

        for i in 0..view.num_rows() {
            if has_nulls && arrays.iter().any(|a| a.is_null(i)) {
                self.null_keys += 1;
                continue;
            }
            self.checked += 1;
            let row_id = view.row_id(i);
            if let Insertion::Duplicate { first_seen } = self.keys.add_at(&rows.row(i), row_id)? {
                self.duplicates += 1;
                self.evidence.record(|| {
                    FailureSample::with_detail(
                        row_id,
                        Self::render_key(&arrays, i),
                        format!("first seen at row {first_seen}"),
                    )
                });
            }
        }
        Ok(())
    }

    fn verdict(&self) -> Result<Verdict, CheckError> {
        let stats = self.keys.statistics();
        let mut verdict = Verdict {
            failed_count: self.duplicates,
            total_count: self.checked,
            failures: self.evidence.to_vec(),
            ..Verdict::default()
        };
        verdict
            .metrics
            .insert("unique_keys".to_string(), stats.unique_keys as f64);
        verdict
            .metrics
            .insert("null_keys".to_string(), self.null_keys as f64);
        verdict.metrics.insert(
            "spilled".to_string(),
            if stats.is_spilled { 1.0 } else { 0.0 },
        );
        verdict
            .metrics
            .insert("spilled_keys".to_string(), stats.spilled_keys as f64);
        verdict
            .metrics
            .insert("prefilter_skips".to_string(), stats.prefilter_skips as f64);
        Ok(verdict)
    }

    fn release(&mut self) -> Result<(), CheckError> {
        debug!(columns = ?self.columns, "releasing unique key set");
        self.keys.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowIds;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn ids(values: Vec<Option<i64>>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    fn unique(memory_limit: usize) -> UniqueCheck {
        let params = CheckParams {
            memory_limit: Some(memory_limit),
            ..CheckParams::for_column("id")
        };
        UniqueCheck::from_params(&params).unwrap()
    }

    #[test]
    fn test_not_null_counts_and_rows() {
        let mut check = NotNullCheck::from_params(&CheckParams::for_column("id")).unwrap();
        let first = ids(vec![Some(1), None, Some(3)]);
        let second = ids(vec![None, Some(5)]);
        check
            .observe(1, ChunkView::new(&first, RowIds::Contiguous(0)))
            .unwrap();
        check
            .observe(1, ChunkView::new(&second, RowIds::Contiguous(3)))
            .unwrap();

        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.total_count, 5);
        let rows: Vec<u64> = verdict.failures.iter().map(|f| f.row).collect();
        assert_eq!(rows, vec![1, 3]);
    }

    #[test]
    fn test_not_null_missing_column() {
        let mut check = NotNullCheck::from_params(&CheckParams::for_column("other")).unwrap();
        let batch = ids(vec![Some(1)]);
        let err = check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap_err();
        assert!(matches!(err, CheckError::ColumnNotFound(_)));
    }

    #[test]
    fn test_unique_reports_first_seen_row() {
        let mut check = unique(1_000);
        let batch = ids(vec![Some(1), Some(2), Some(2), Some(3)]);
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap();

        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.total_count, 4);
        assert_eq!(verdict.failures[0].row, 2);
        assert_eq!(verdict.failures[0].value, "2");
        assert_eq!(
            verdict.failures[0].detail.as_deref(),
            Some("first seen at row 1")
        );
        check.release().unwrap();
    }

    #[test]
    fn test_unique_skips_null_keys() {
        let mut check = unique(1_000);
        let batch = ids(vec![None, Some(1), None]);
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap();
        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 0);
        assert_eq!(verdict.total_count, 1);
        assert_eq!(verdict.metrics["null_keys"], 2.0);
        check.release().unwrap();
    }

    #[test]
    fn test_unique_across_chunks_with_spill() {
        let mut check = unique(2);
        let first = ids(vec![Some(1), Some(2), Some(3)]);
        let second = ids(vec![Some(4), Some(3), Some(1)]);
        check
            .observe(1, ChunkView::new(&first, RowIds::Contiguous(0)))
            .unwrap();
        check
            .observe(1, ChunkView::new(&second, RowIds::Contiguous(3)))
            .unwrap();

        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 2);
        assert_eq!(verdict.metrics["spilled"], 1.0);
        let details: Vec<&str> = verdict
            .failures
            .iter()
            .filter_map(|f| f.detail.as_deref())
            .collect();
        assert_eq!(details, vec!["first seen at row 2", "first seen at row 0"]);
        check.release().unwrap();
    }

    #[test]
    fn test_unique_composite_key() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Utf8, false),
            Field::new("b", DataType::Utf8, false),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["x,y", "x", "x"])),
                Arc::new(StringArray::from(vec!["z", "y,z", "y,z"])),
            ],
        )
        .unwrap();
        let params = CheckParams {
            columns: Some(vec!["a".to_string(), "b".to_string()]),
            ..CheckParams::default()
        };
        let mut check = UniqueCheck::from_params(&params).unwrap();
        check
            .observe(1, ChunkView::new(&batch, RowIds::Contiguous(0)))
            .unwrap();
        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failed_count, 1);
        assert_eq!(verdict.failures[0].value, "(x, y,z)");
        check.release().unwrap();
    }

    #[test]
    fn test_unique_type_change_between_chunks() {
        let mut check = unique(10);
        let first = ids(vec![Some(1)]);
        let schema = Schema::new(vec![Field::new("id", DataType::Utf8, true)]);
        let second = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec!["1"]))],
        )
        .unwrap();
        check
            .observe(1, ChunkView::new(&first, RowIds::Contiguous(0)))
            .unwrap();
        let err = check
            .observe(1, ChunkView::new(&second, RowIds::Contiguous(1)))
            .unwrap_err();
        assert!(matches!(err, CheckError::TypeCastError(column, _) if column == "id"));
        check.release().unwrap();
    }

    #[test]
    fn test_unique_sampled_row_ids() {
        let mut check = unique(10);
        let batch = ids(vec![Some(7), Some(7)]);
        let origins = [40u64, 900];
        check
            .observe(1, ChunkView::new(&batch, RowIds::Explicit(&origins)))
            .unwrap();
        let verdict = check.verdict().unwrap();
        assert_eq!(verdict.failures[0].row, 900);
        assert_eq!(
            verdict.failures[0].detail.as_deref(),
            Some("first seen at row 40")
        );
        check.release().unwrap();
    }
}
