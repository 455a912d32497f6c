//! Column lookup and casting helpers shared by the built-in checks.
use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Array, StringArray},
    compute,
    datatypes::{DataType, Float64Type},
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};

use crate::errors::CheckError;

/// Look up a column by name.
pub fn column_by_name<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, CheckError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| CheckError::ColumnNotFound(name.to_string()))
}

/// Cast a column to `Utf8`. String columns are returned without copying.
pub fn utf8_column(batch: &RecordBatch, name: &str) -> Result<StringArray, CheckError> {
    let array = column_by_name(batch, name)?;
    let casted = match array.data_type() {
        DataType::Utf8 => array.clone(),
        _ => compute::cast(array, &DataType::Utf8)
            .map_err(|e| CheckError::TypeCastError(name.to_string(), e.to_string()))?,
    };
    casted
        .as_string_opt::<i32>()
        .cloned()
        .ok_or_else(|| CheckError::TypeCastError(name.to_string(), "Utf8".to_string()))
}

/// A column cast to `Float64`, keeping track of values that failed to parse.
pub struct NumericColumn {
    pub values: Float64Array,
    /// Slots that were present in the source but could not be cast
    pub unparsable: Vec<usize>,
    pub source: ArrayRef,
}

impl NumericColumn {
    pub fn is_unparsable(&self, i: usize) -> bool {
        self.unparsable.binary_search(&i).is_ok()
    }
}

/// Cast a column to `Float64`.
///
/// Casting is lenient: text that is not a number becomes null in `values` and
/// its slot is listed in `unparsable`, mirroring how a type check counts
/// errors as the nulls introduced by the cast.
pub fn float_column(batch: &RecordBatch, name: &str) -> Result<NumericColumn, CheckError> {
    let array = column_by_name(batch, name)?;
    let casted = compute::cast(array, &DataType::Float64)
        .map_err(|e| CheckError::TypeCastError(name.to_string(), e.to_string()))?;
    let values = casted
        .as_primitive_opt::<Float64Type>()
        .cloned()
        .ok_or_else(|| CheckError::TypeCastError(name.to_string(), "Float64".to_string()))?;

    let unparsable = if values.null_count() > array.null_count() {
        (0..values.len())
            .filter(|&i| values.is_null(i) && array.is_valid(i))
            .collect()
    } else {
        Vec::new()
    };

    Ok(NumericColumn {
        values,
        unparsable,
        source: array.clone(),
    })
}

/// Render one slot for failure evidence.
pub fn display_value(array: &dyn Array, i: usize) -> String {
    if array.is_null(i) {
        return "null".to_string();
    }
    array_value_to_string(array, i).unwrap_or_else(|_| "<unprintable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("price", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])),
                Arc::new(StringArray::from(vec![Some("1.5"), Some("abc"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_column() {
        let err = column_by_name(&batch(), "nope").unwrap_err();
        assert!(matches!(err, CheckError::ColumnNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_utf8_from_integer() {
        let ids = utf8_column(&batch(), "id").unwrap();
        assert_eq!(ids.value(0), "1");
        assert!(ids.is_null(1));
    }

    #[test]
    fn test_float_column_tracks_unparsable() {
        let prices = float_column(&batch(), "price").unwrap();
        assert_eq!(prices.values.value(0), 1.5);
        assert_eq!(prices.unparsable, vec![1]);
        assert!(prices.is_unparsable(1));
        assert!(!prices.is_unparsable(2));
    }

    #[test]
    fn test_display_value() {
        let b = batch();
        assert_eq!(display_value(b.column(0).as_ref(), 0), "1");
        assert_eq!(display_value(b.column(0).as_ref(), 1), "null");
    }
}
