use super::{LINE_LIST_COLUMN_COUNT, LineListError, Transition};

const LEVEL_INDEX_COLUMNS: [usize; 2] = [5, 6];

/// Parses the headerless eight-column table:
/// `E_lower E_upper E_transition gf index_lower index_upper J_lower J_upper`.
/// Blank lines are skipped, line numbers in errors are 1-based.
pub fn parse_line_list_source(
    source_label: &str,
    source: &str,
) -> Result<Vec<Transition>, LineListError> {
    let mut transitions = Vec::new();

    for (line_index, raw_line) in source.lines().enumerate() {
        let line = line_index + 1;
        let fields: Vec<&str> = raw_line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != LINE_LIST_COLUMN_COUNT {
            return Err(LineListError::ColumnCount {
                source_label: source_label.to_string(),
                line,
                found: fields.len(),
            });
        }

        let mut values = [0.0_f64; LINE_LIST_COLUMN_COUNT];
        for (column_index, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
            *slot = parse_number(field).ok_or_else(|| LineListError::InvalidNumber {
                source_label: source_label.to_string(),
                line,
                column: column_index + 1,
                value: (*field).to_string(),
            })?;
        }

        for column in LEVEL_INDEX_COLUMNS {
            let value = values[column - 1];
            if value.fract() != 0.0 {
                return Err(LineListError::NonIntegralIndex {
                    source_label: source_label.to_string(),
                    line,
                    column,
                    value,
                });
            }
        }

        transitions.push(Transition {
            energy_lower: values[0],
            energy_upper: values[1],
            transition_energy: values[2],
            strength: values[3],
            index_lower: values[4] as i64,
            index_upper: values[5] as i64,
            j_lower: values[6],
            j_upper: values[7],
        });
    }

    Ok(transitions)
}

fn parse_number(token: &str) -> Option<f64> {
    let normalized = token.replace(['D', 'd'], "E");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
