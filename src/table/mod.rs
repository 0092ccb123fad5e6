//! # Observation Tables
//!
//! In-memory per-plate tables: one row per image (whole-image QC) or per
//! segmented cell (single-cell QC), backed by an Arrow [`RecordBatch`].
//!
//! Every row carries a stable identity, its position in the table as it was
//! loaded. Filtering, projection and reordering return new tables that keep
//! those identities, so outliers found on a projected or filtered view can be
//! removed from the full table later.
//!
//! ## Example
//!
//! ```rust,no_run
//! use arrow::array::Array;
//! use plateqc::table::ObservationTable;
//!
//! let table = ObservationTable::open("BR00143976_converted.parquet")?;
//! let area = table.float_column("Nuclei_AreaShape_Area")?;
//! println!("{} cells, {} nulls", table.num_rows(), area.null_count());
//! # Ok::<(), plateqc::table::TableError>(())
//! ```

pub mod columns;
mod error;
mod io;


pub use error::TableError;
pub use io::CompressionType;

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, UInt64Array};
use arrow::compute::{
    cast, cast_with_options, concat_batches, filter_record_batch, take_record_batch, CastOptions,
};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

/// A table of observations with stable row identities
#[derive(Debug, Clone)]
pub struct ObservationTable {
    batch: RecordBatch,
    row_ids: Vec<usize>,
}

impl ObservationTable {
    /// Wrap a freshly loaded batch; row identities are `0..num_rows`
    pub fn new(batch: RecordBatch) -> Self {
        let row_ids = (0..batch.num_rows()).collect();
        Self { batch, row_ids }
    }

    /// Wrap a batch whose rows already have identities
    pub fn with_row_ids(batch: RecordBatch, row_ids: Vec<usize>) -> Result<Self, TableError> {
        if batch.num_rows() != row_ids.len() {
            return Err(TableError::RowIdMismatch {
                rows: batch.num_rows(),
                ids: row_ids.len(),
            });
        }
        Ok(Self { batch, row_ids })
    }

    /// Concatenate tables sharing one schema
    ///
    /// The result is a new table: its rows are renumbered `0..n` in input order.
    pub fn concat(tables: &[ObservationTable]) -> Result<Self, TableError> {
        let first = tables.first().ok_or(TableError::Empty)?;
        let schema = first.schema();
        let batch = concat_batches(&schema, tables.iter().map(|t| &t.batch))?;
        Ok(Self::new(batch))
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Returns true if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Arrow schema of the table
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Underlying record batch
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Row identities, in row order
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Column names, in table order
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Names of the metadata columns, in table order
    pub fn metadata_columns(&self) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|name| columns::is_metadata(name))
            .collect()
    }

    /// Returns true if the table has a column with this name
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&ArrayRef, TableError> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// Numeric column widened to `f64`; nulls stay null
    pub fn float_column(&self, name: &str) -> Result<Float64Array, TableError> {
        let column = self.column(name)?;
        if !column.data_type().is_numeric() {
            return Err(TableError::NonNumericColumn {
                name: name.to_string(),
                data_type: column.data_type().to_string(),
            });
        }
        let values = cast(column, &DataType::Float64)?;
        Ok(values.as_primitive::<Float64Type>().clone())
    }

    /// Any column rendered as strings, for use as a row key
    pub fn string_values(&self, name: &str) -> Result<Vec<Option<String>>, TableError> {
        let column = self.column(name)?;
        let strings = cast(column, &DataType::Utf8)?;
        Ok(strings
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    /// Boolean flag column; nulls read as `false`
    pub fn flag_values(&self, name: &str) -> Result<Vec<bool>, TableError> {
        let column = self.column(name)?;
        let flags = cast(column, &DataType::Boolean)?;
        let flags = flags.as_boolean();
        Ok((0..flags.len())
            .map(|i| flags.is_valid(i) && flags.value(i))
            .collect())
    }

    /// Keep the rows where `mask` is true (nulls drop the row)
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self, TableError> {
        let batch = filter_record_batch(&self.batch, mask)?;
        let row_ids = self
            .row_ids
            .iter()
            .enumerate()
            .filter(|(i, _)| mask.is_valid(*i) && mask.value(*i))
            .map(|(_, id)| *id)
            .collect();
        Self::with_row_ids(batch, row_ids)
    }

    /// Gather rows by position (positions may repeat or reorder)
    pub fn take(&self, positions: &[usize]) -> Result<Self, TableError> {
        let indices = UInt64Array::from_iter_values(positions.iter().map(|&p| p as u64));
        let batch = take_record_batch(&self.batch, &indices)?;
        let row_ids = positions.iter().map(|&p| self.row_ids[p]).collect();
        Self::with_row_ids(batch, row_ids)
    }

    /// Keep only the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, TableError> {
        let schema = self.batch.schema();
        let indices = names
            .iter()
            .map(|name| {
                schema
                    .index_of(name.as_ref())
                    .map_err(|_| TableError::ColumnNotFound(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let batch = self.batch.project(&indices)?;
        Self::with_row_ids(batch, self.row_ids.clone())
    }

    /// Remove the rows whose identity is in `ids`
    pub fn drop_rows(&self, ids: &BTreeSet<usize>) -> Result<Self, TableError> {
        let mask: BooleanArray = self
            .row_ids
            .iter()
            .map(|id| Some(!ids.contains(id)))
            .collect();
        self.filter(&mask)
    }

    /// Append a column, or replace the column of the same name
    pub fn with_column(&self, name: &str, values: ArrayRef) -> Result<Self, TableError> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays: Vec<ArrayRef> = self.batch.columns().to_vec();
        let field = Field::new(name, values.data_type().clone(), true);

        match schema.index_of(name) {
            Ok(i) => {
                fields[i] = field;
                arrays[i] = values;
            }
            Err(_) => {
                fields.push(field);
                arrays.push(values);
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::with_row_ids(batch, self.row_ids.clone())
    }

    /// Rename a column
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self, TableError> {
        let schema = self.batch.schema();
        let index = schema
            .index_of(from)
            .map_err(|_| TableError::ColumnNotFound(from.to_string()))?;
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if i == index {
                    f.as_ref().clone().with_name(to)
                } else {
                    f.as_ref().clone()
                }
            })
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), self.batch.columns().to_vec())?;
        Self::with_row_ids(batch, self.row_ids.clone())
    }

    /// Reorder and cast columns to match `schema`
    ///
    /// Columns absent from `schema` are dropped. A column of `schema` missing
    /// from this table is an error, as is a value that cannot be cast to the
    /// reference type.
    pub fn align_to(&self, schema: &SchemaRef) -> Result<Self, TableError> {
        let strict = CastOptions {
            safe: false,
            ..Default::default()
        };
        let arrays = schema
            .fields()
            .iter()
            .map(|field| {
                let column = self.column(field.name())?;
                if column.data_type() == field.data_type() {
                    Ok(column.clone())
                } else {
                    Ok(cast_with_options(column, field.data_type(), &strict)?)
                }
            })
            .collect::<Result<Vec<_>, TableError>>()?;
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| f.as_ref().clone().with_nullable(true))
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::with_row_ids(batch, self.row_ids.clone())
    }
}
