use std::fmt;

use duckdb::arrow::array::{new_empty_array, Array, ArrayRef};
use duckdb::arrow::compute::{concat, concat_batches};
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::arrow::util::pretty::pretty_format_batches;

use crate::error::DrDuckError;

/// In-memory query result: an Arrow schema plus the record batches produced
/// by the engine, in order.
#[derive(Clone, Debug)]
pub struct DataFrame {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    /// All values of one column as a single array, or `None` if absent.
    pub fn column(&self, name: &str) -> Result<Option<ArrayRef>, DrDuckError> {
        let Ok(index) = self.schema.index_of(name) else {
            return Ok(None);
        };
        if self.batches.is_empty() {
            let field = self.schema.field(index);
            return Ok(Some(new_empty_array(field.data_type())));
        }
        let pieces: Vec<&dyn Array> = self
            .batches
            .iter()
            .map(|batch| batch.column(index).as_ref())
            .collect();
        Ok(Some(concat(&pieces)?))
    }

    /// Display form of every value in one column (nulls become empty strings).
    pub fn column_strings(&self, name: &str) -> Result<Option<Vec<String>>, DrDuckError> {
        let Some(array) = self.column(name)? else {
            return Ok(None);
        };
        let options = FormatOptions::default();
        let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
        Ok(Some(
            (0..array.len())
                .map(|row| formatter.value(row).to_string())
                .collect(),
        ))
    }

    /// Display form of every row, in column order.
    pub fn rows_as_strings(&self) -> Result<Vec<Vec<String>>, DrDuckError> {
        let options = FormatOptions::default();
        let mut rows = Vec::with_capacity(self.height());
        for batch in &self.batches {
            let formatters = batch
                .columns()
                .iter()
                .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
                .collect::<Result<Vec<_>, _>>()?;
            for row in 0..batch.num_rows() {
                rows.push(
                    formatters
                        .iter()
                        .map(|formatter| formatter.value(row).to_string())
                        .collect(),
                );
            }
        }
        Ok(rows)
    }

    /// Concatenate all batches into one.
    pub fn to_record_batch(&self) -> Result<RecordBatch, DrDuckError> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = if self.batches.is_empty() {
            pretty_format_batches(&[RecordBatch::new_empty(self.schema.clone())])
        } else {
            pretty_format_batches(&self.batches)
        };
        match rendered {
            Ok(table) => write!(f, "{table}"),
            Err(_) => Err(fmt::Error),
        }
    }
}
