/// File format of a downloaded resource, as far as parsing cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Xlsx,
    Xls,
    Xml,
    Gzip,
    Zip,
    Unknown,
}

/// Guess the format of a payload from its filename and content type.
///
/// The filename extension wins over the content type when both are
/// present: upstream servers routinely send generic or plain wrong
/// `Content-Type` headers for open-data files. Compound suffixes are
/// checked before single ones, so `data.csv.gz` is CSV (gzipped), not
/// gzip-of-unknown. Never fails; anything unrecognized is `Unknown`.
pub fn detect_format(filename: &str, content_type: Option<&str>) -> FileFormat {
    let name = filename.to_ascii_lowercase();
    let stem = name.strip_suffix(".gz").unwrap_or(&name);

    if stem.ends_with(".csv") {
        return FileFormat::Csv;
    }
    if stem.ends_with(".json") || stem.ends_with(".jsonl") || stem.ends_with(".ndjson") {
        return FileFormat::Json;
    }
    if name.ends_with(".xml") {
        return FileFormat::Xml;
    }
    if name.ends_with(".xlsx") {
        return FileFormat::Xlsx;
    }
    if name.ends_with(".xls") {
        return FileFormat::Xls;
    }
    if name.ends_with(".zip") {
        return FileFormat::Zip;
    }
    if name.ends_with(".gz") {
        return FileFormat::Gzip;
    }

    let content_type = content_type.unwrap_or("").to_ascii_lowercase();
    if content_type.contains("csv") {
        FileFormat::Csv
    } else if content_type.contains("json") {
        FileFormat::Json
    } else if content_type.contains("xml") {
        FileFormat::Xml
    } else if content_type.contains("excel") || content_type.contains("spreadsheet") {
        FileFormat::Xlsx
    } else if content_type.contains("gzip") {
        FileFormat::Gzip
    } else {
        FileFormat::Unknown
    }
}

/// Whether the payload is gzip-compressed on the wire, judged by name.
pub fn is_gzipped(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".gz")
}

impl FileFormat {
    /// Short lowercase label for display.
    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
            FileFormat::Xml => "xml",
            FileFormat::Gzip => "gzip",
            FileFormat::Zip => "zip",
            FileFormat::Unknown => "unknown",
        }
    }
}
