use super::ExperimentError;
use std::path::Path;

const HEADER_LINES: usize = 1;
const EXPERIMENT_COLUMN_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDelimiter {
    Comma,
    Whitespace,
}

impl ColumnDelimiter {
    pub fn for_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("csv") {
            Some(Self::Comma)
        } else if extension.eq_ignore_ascii_case("txt") {
            Some(Self::Whitespace)
        } else {
            None
        }
    }
}

/// Parses the two numeric columns following the header line. Rows keep file order.
pub fn parse_experimental_source(
    source_label: &str,
    source: &str,
    delimiter: ColumnDelimiter,
) -> Result<(Vec<f64>, Vec<f64>), ExperimentError> {
    match delimiter {
        ColumnDelimiter::Comma => parse_csv(source_label, source),
        ColumnDelimiter::Whitespace => parse_whitespace(source_label, source),
    }
}

fn parse_csv(source_label: &str, source: &str) -> Result<(Vec<f64>, Vec<f64>), ExperimentError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(HEADER_LINES > 0)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source.as_bytes());

    let mut wavelengths = Vec::new();
    let mut intensities = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| ExperimentError::Csv {
            source_label: source_label.to_string(),
            source,
        })?;
        let line = record
            .position()
            .map_or(0, |position| position.line() as usize);
        let mut fields: Vec<&str> = record.iter().collect();
        // "1.0,2.0," carries one empty trailing field.
        if fields.len() == EXPERIMENT_COLUMN_COUNT + 1 && fields.last() == Some(&"") {
            fields.pop();
        }

        let [wavelength, intensity] = parse_row(source_label, line, &fields)?;
        wavelengths.push(wavelength);
        intensities.push(intensity);
    }

    Ok((wavelengths, intensities))
}

fn parse_whitespace(
    source_label: &str,
    source: &str,
) -> Result<(Vec<f64>, Vec<f64>), ExperimentError> {
    let mut wavelengths = Vec::new();
    let mut intensities = Vec::new();

    for (line_index, raw_line) in source.lines().enumerate().skip(HEADER_LINES) {
        if raw_line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw_line.split_whitespace().collect();
        let [wavelength, intensity] = parse_row(source_label, line_index + 1, &fields)?;
        wavelengths.push(wavelength);
        intensities.push(intensity);
    }

    Ok((wavelengths, intensities))
}

fn parse_row(
    source_label: &str,
    line: usize,
    fields: &[&str],
) -> Result<[f64; EXPERIMENT_COLUMN_COUNT], ExperimentError> {
    if fields.len() != EXPERIMENT_COLUMN_COUNT {
        return Err(ExperimentError::ColumnCount {
            source_label: source_label.to_string(),
            line,
            found: fields.len(),
        });
    }

    let mut values = [0.0_f64; EXPERIMENT_COLUMN_COUNT];
    for (column_index, (slot, field)) in values.iter_mut().zip(fields).enumerate() {
        *slot = field
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ExperimentError::InvalidNumber {
                source_label: source_label.to_string(),
                line,
                column: column_index + 1,
                value: (*field).to_string(),
            })?;
    }
    Ok(values)
}
