use crate::error::{DatagouvError, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::borrow::Cow;
use std::io::{Cursor, Read};

/// One parsed record: column name to value, in file order.
pub type Row = serde_json::Map<String, Value>;

fn decompress_gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DatagouvError::parse(format!("invalid gzip stream: {e}")))?;
    Ok(out)
}

/// Decode UTF-8, dropping a leading byte-order mark when present.
fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DatagouvError::parse(format!("payload is not valid UTF-8: {e}")))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Pick the CSV delimiter by sampling the header line.
///
/// French open-data files are split roughly evenly between comma and
/// semicolon delimiters. Semicolon wins only when it appears strictly
/// more often than the comma in the header.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas { b';' } else { b',' }
}

/// Parse CSV bytes into rows keyed by the header fields.
///
/// Ragged records are tolerated: missing trailing fields become empty
/// strings and fields beyond the header are dropped. Row order follows
/// the file.
pub fn parse_csv(bytes: &[u8], is_gzipped: bool) -> Result<Vec<Row>> {
    let bytes: Cow<'_, [u8]> = if is_gzipped {
        Cow::Owned(decompress_gzip(bytes)?)
    } else {
        Cow::Borrowed(bytes)
    };
    let text = decode_utf8(&bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DatagouvError::parse(format!("could not read CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DatagouvError::parse(format!("malformed CSV record: {e}")))?;
        let mut row = Row::new();
        for (index, column) in headers.iter().enumerate() {
            let value = record.get(index).unwrap_or("");
            row.insert(column.clone(), Value::String(value.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Parse a JSON or JSONL payload into rows.
///
/// A whole-document parse is attempted first: an array yields its object
/// elements (anything else in the array is skipped with a warning), a
/// single object becomes a one-row sequence. When the document as a
/// whole does not parse, each line is parsed independently and lines
/// that fail are skipped; one bad line never loses the rest of the file.
pub fn parse_json(bytes: &[u8], is_gzipped: bool) -> Result<Vec<Row>> {
    let bytes: Cow<'_, [u8]> = if is_gzipped {
        Cow::Owned(decompress_gzip(bytes)?)
    } else {
        Cow::Borrowed(bytes)
    };
    let text = decode_utf8(&bytes)?;

    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        match value {
            Value::Array(items) => {
                let mut rows = Vec::new();
                for item in items {
                    match item {
                        Value::Object(map) => rows.push(map),
                        other => {
                            tracing::warn!("skipping non-object JSON array element: {other}")
                        }
                    }
                }
                return Ok(rows);
            }
            Value::Object(map) => return Ok(vec![map]),
            // scalar document: treat as line-delimited below
            _ => {}
        }
    }

    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

fn supported_inner_format(name: &str) -> Option<InnerFormat> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        Some(InnerFormat::Csv)
    } else if lower.ends_with(".json") || lower.ends_with(".jsonl") || lower.ends_with(".ndjson") {
        Some(InnerFormat::Json)
    } else {
        None
    }
}

#[derive(Clone, Copy)]
enum InnerFormat {
    Csv,
    Json,
}

/// Extract and parse the first supported file from a ZIP archive.
///
/// macOS resource-fork noise (`__MACOSX/...`) and directories are
/// ignored. Among the remaining CSV/JSON/JSONL entries the
/// alphabetically first full path is chosen, so the pick is
/// reproducible regardless of the archive's physical entry order.
/// Returns the parsed rows together with the inner filename.
pub fn parse_zip(bytes: &[u8]) -> Result<(Vec<Row>, String)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DatagouvError::parse(format!("invalid ZIP archive: {e}")))?;

    let mut candidates = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| DatagouvError::parse(format!("unreadable ZIP entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.split('/').any(|segment| segment == "__MACOSX") {
            continue;
        }
        if supported_inner_format(&name).is_some() {
            candidates.push(name);
        }
    }

    candidates.sort();
    let Some(chosen) = candidates.into_iter().next() else {
        return Err(DatagouvError::NoSupportedFile);
    };

    let mut entry = archive
        .by_name(&chosen)
        .map_err(|e| DatagouvError::parse(format!("unreadable ZIP entry: {e}")))?;
    let mut inner = Vec::new();
    entry
        .read_to_end(&mut inner)
        .map_err(|e| DatagouvError::parse(format!("could not extract '{chosen}': {e}")))?;

    let rows = match supported_inner_format(&chosen) {
        Some(InnerFormat::Csv) => parse_csv(&inner, false)?,
        Some(InnerFormat::Json) => parse_json(&inner, false)?,
        None => return Err(DatagouvError::NoSupportedFile),
    };
    Ok((rows, chosen))
}
