//! Output strategies for dataframes.
//!
//! The format is chosen once at startup and handed to the command runner as a
//! boxed [`FrameRenderer`].

use std::io::Write;

use clap::ValueEnum;
use duckdb::arrow::array::{Array, AsArray};
use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use serde_json::{Map, Number, Value};

use crate::duck::frame::DataFrame;
use crate::error::DrDuckError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Box-drawn table for terminals.
    #[default]
    Table,
    /// RFC 4180 CSV with a header row.
    Csv,
    /// One JSON object per row.
    Json,
}

pub trait FrameRenderer {
    fn render(&self, frame: &DataFrame, out: &mut dyn Write) -> Result<(), DrDuckError>;
}

pub fn renderer_for(format: OutputFormat) -> Box<dyn FrameRenderer> {
    match format {
        OutputFormat::Table => Box::new(TableRenderer),
        OutputFormat::Csv => Box::new(CsvRenderer),
        OutputFormat::Json => Box::new(JsonLinesRenderer),
    }
}

pub struct TableRenderer;

impl FrameRenderer for TableRenderer {
    fn render(&self, frame: &DataFrame, out: &mut dyn Write) -> Result<(), DrDuckError> {
        writeln!(out, "{frame}")?;
        writeln!(
            out,
            "({} row{})",
            frame.height(),
            if frame.height() == 1 { "" } else { "s" }
        )?;
        Ok(())
    }
}

pub struct CsvRenderer;

impl FrameRenderer for CsvRenderer {
    fn render(&self, frame: &DataFrame, out: &mut dyn Write) -> Result<(), DrDuckError> {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record(frame.column_names())
            .map_err(std::io::Error::from)?;
        for row in frame.rows_as_strings()? {
            writer.write_record(&row).map_err(std::io::Error::from)?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub struct JsonLinesRenderer;

impl FrameRenderer for JsonLinesRenderer {
    fn render(&self, frame: &DataFrame, out: &mut dyn Write) -> Result<(), DrDuckError> {
        let names = frame.column_names();
        let options = FormatOptions::default();
        for batch in frame.batches() {
            let formatters = batch
                .columns()
                .iter()
                .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
                .collect::<Result<Vec<_>, _>>()?;
            for row in 0..batch.num_rows() {
                let object: Map<String, Value> = names
                    .iter()
                    .zip(batch.columns())
                    .zip(&formatters)
                    .map(|((name, column), formatter)| {
                        (name.to_string(), json_value(column.as_ref(), formatter, row))
                    })
                    .collect();
                let line =
                    serde_json::to_string(&Value::Object(object)).map_err(std::io::Error::from)?;
                writeln!(out, "{line}")?;
            }
        }
        Ok(())
    }
}

/// JSON form of one cell: nulls stay null, booleans and integers keep their
/// type, floats become numbers when finite. Everything else is its display
/// string.
fn json_value(array: &dyn Array, formatter: &ArrayFormatter<'_>, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    if let DataType::Boolean = array.data_type() {
        return Value::Bool(array.as_boolean().value(row));
    }

    let text = formatter.value(row).to_string();
    let typed = match array.data_type() {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            text.parse::<i64>().ok().map(Value::from)
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            text.parse::<u64>().ok().map(Value::from)
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    };
    typed.unwrap_or(Value::String(text))
}
