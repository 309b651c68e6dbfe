use crate::parse::Row;
use serde_json::Value;

/// Format a size in bytes into a human-readable string.
pub fn format_file_size(size_bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;
    if size_bytes < KIB {
        format!("{size_bytes} B")
    } else if size_bytes < MIB {
        format!("{:.1} KB", size_bytes as f64 / KIB as f64)
    } else if size_bytes < GIB {
        format!("{:.1} MB", size_bytes as f64 / MIB as f64)
    } else {
        format!("{:.1} GB", size_bytes as f64 / GIB as f64)
    }
}

/// Truncate text to `max_len` characters and append an ellipsis when
/// anything was cut.
pub fn truncate_text(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        value.to_string()
    } else {
        let kept: String = value.chars().take(max_len).collect();
        format!("{kept}...")
    }
}

/// Render a JSON value the way a human reads a cell: bare strings
/// unquoted, null as empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Render a preview of parsed rows: the column list, the first `sample`
/// rows with long cell values truncated, and a trailer noting how many
/// rows were left out.
pub fn render_rows_preview(rows: &[Row], sample: usize) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    parts.push(format!("Columns: {}", columns.join(", ")));
    parts.push(String::new());
    parts.push(format!(
        "Sample data (first {} rows):",
        sample.min(rows.len())
    ));
    for (index, row) in rows.iter().take(sample).enumerate() {
        parts.push(format!("  Row {}:", index + 1));
        for (key, value) in row {
            parts.push(format!(
                "    {}: {}",
                key,
                truncate_text(&display_value(value), 100)
            ));
        }
    }
    if rows.len() > sample {
        parts.push(format!(
            "  ... ({} more row(s) available)",
            rows.len() - sample
        ));
    }
    parts.join("\n")
}
