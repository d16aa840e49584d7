//! JSON I/O for the CLI
//!
//! - Inputs: definition, data and config files
//! - Output: one JSON object per command on stdout

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::{Map, Value};

use super::errors::{CliError, CliResult};

/// Read a data file: `{"TypeName": [record, ...], ...}`
pub fn read_data(path: &Path) -> CliResult<Map<String, Value>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::input_error(format!("failed to read {}: {}", path.display(), e)))?;
    match serde_json::from_str(&content)? {
        Value::Object(data) => Ok(data),
        _ => Err(CliError::input_error(format!(
            "{} must hold an object of type names to record arrays",
            path.display()
        ))),
    }
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_value(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_value(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
