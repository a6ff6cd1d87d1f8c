//! Minimal CSV writer for the KPI export.

/// Escape a field: wrap in quotes when it contains a comma, quote or line
/// break, doubling embedded quotes.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn write_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Header line plus one line per row, each terminated by `\n`.
pub fn to_csv<S: AsRef<str>>(header: &[&str], rows: &[Vec<S>]) -> String {
    let mut output = String::new();
    output.push_str(&write_record(header));
    output.push('\n');
    for row in rows {
        output.push_str(&write_record(row));
        output.push('\n');
    }
    output
}
