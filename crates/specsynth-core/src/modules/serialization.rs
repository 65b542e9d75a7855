use serde::Serialize;
use std::fs;
use std::path::Path;

/// Right-aligned exponent notation; non-finite values print as `NaN`/`inf`.
pub fn format_scientific_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$e}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Pretty-printed JSON with a trailing newline.
pub fn write_json_artifact<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_text_artifact(path, &content)
}

/// Whitespace-separated columns under a `#` header line. Columns must share a
/// length; extra entries of longer columns are ignored.
pub fn render_columns(header: &[&str], columns: &[&[f64]]) -> String {
    let rows = columns.iter().map(|column| column.len()).min().unwrap_or(0);
    let mut content = String::new();
    content.push('#');
    for name in header {
        content.push_str(&format!(" {name:>18}"));
    }
    content.push('\n');

    for row in 0..rows {
        let line: Vec<String> = columns
            .iter()
            .map(|column| format_scientific_f64(column[row], 19, 10))
            .collect();
        content.push_str(&line.join(""));
        content.push('\n');
    }
    content
}

#[cfg(test)]
mod tests {
    use super::{
        format_scientific_f64, normalize_text_artifact, render_columns, write_json_artifact,
        write_text_artifact,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scientific_float_formatting_is_deterministic() {
        let first = format_scientific_f64(1250.0, 12, 3);
        let second = format_scientific_f64(1250.0, 12, 3);

        assert_eq!(first, "     1.250e3");
        assert_eq!(first, second);
        assert_eq!(format_scientific_f64(f64::NAN, 5, 2), "  NaN");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("synthetic.dat");
        let input = "line 1\r\nline 2\rline 3";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"line 1\nline 2\nline 3\n");
    }

    #[test]
    fn column_tables_have_one_row_per_sample() {
        let wavelengths = [100.0, 110.0];
        let intensities = [0.5, 1.0];
        let table = render_columns(
            &["wavelength", "intensity"],
            &[&wavelengths[..], &intensities[..]],
        );
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('#'));
        let values: Vec<f64> = lines[2]
            .split_whitespace()
            .map(|token| token.parse().expect("number"))
            .collect();
        assert_eq!(values, vec![110.0, 1.0]);
    }

    #[test]
    fn json_artifacts_end_with_a_newline() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("scan.json");
        write_json_artifact(&path, &vec![Some(1.5), None]).expect("write");

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.ends_with('\n'));
        let parsed: Vec<Option<f64>> = serde_json::from_str(&text).expect("parse");
        assert_eq!(parsed, vec![Some(1.5), None]);
    }
}
