//! JSON I/O handling for CLI
//!
//! - Input: JSON files, or a single JSON document on stdin
//! - Output: single JSON object per line on stdout

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read and deserialize a JSON file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::input(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::input(format!("invalid JSON in {}: {}", path.display(), e)))
}

/// Read a JSON document from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::input("empty input"));
    }

    Ok(serde_json::from_str(&input)?)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FindRequest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"filter": "document.archived == false", "paginate": true}}"#).unwrap();

        let request: FindRequest = read_json_file(file.path()).unwrap();
        assert!(request.paginate);
        assert!(request.filter.is_some());
    }

    #[test]
    fn test_read_json_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = read_json_file::<Value>(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
