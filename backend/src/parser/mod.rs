//! CSV parser and row validator for entity uploads.
//!
//! Turns raw upload bytes into ordered [`EntityRecord`]s or a descriptive
//! [`CsvError`]. Encoding and delimiter are auto-detected.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::EntityRecord;

/// Columns every upload must carry.
pub const REQUIRED_HEADERS: [&str; 2] = ["name", "address"];

/// Optional phone column.
pub const PHONE_HEADER: &str = "phone";

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| CsvError::EncodingError(e.to_string()))?,
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    if let Some(rest) = decoded.strip_prefix('\u{feff}') {
        return Ok(rest.to_string());
    }
    Ok(decoded)
}

/// Detect the delimiter from the header line (first non-blank line).
/// Separators inside double quotes are not counted. Falls back to a comma.
pub fn detect_delimiter(content: &str) -> u8 {
    let header_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0), (b'|', 0)];
    let mut in_quotes = false;

    for b in header_line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some((_, count)) = counts.iter_mut().find(|(sep, _)| *sep == b) {
            *count += 1;
        }
    }

    let mut best_sep = b',';
    let mut best_count = 0;

    for (sep, count) in counts {
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse upload bytes into validated entity records.
pub fn parse_entities(bytes: &[u8]) -> CsvResult<Vec<EntityRecord>> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    parse_entities_str(&content)
}

/// Parse a CSV file from disk.
pub fn parse_entities_file<P: AsRef<Path>>(path: P) -> CsvResult<Vec<EntityRecord>> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::ParseError(format!("Cannot read file: {}", e)))?;
    parse_entities(&bytes)
}

/// Parse already-decoded CSV content.
pub fn parse_entities_str(content: &str) -> CsvResult<Vec<EntityRecord>> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(content))
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::ParseError(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let column = |name: &str| headers.iter().position(|h| h == name);

    let mut missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|h| column(h).is_none())
        .map(|h| h.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(CsvError::MissingHeaders(missing));
    }

    // Both present, checked above.
    let name_idx = column("name").unwrap_or_default();
    let address_idx = column("address").unwrap_or_default();
    let phone_idx = column(PHONE_HEADER);

    let mut records = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let row = idx + 1;
        let record = result.map_err(|e| CsvError::ParseError(format!("Row {}: {}", row, e)))?;
        let cell = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let name = cell(name_idx);
        let address = cell(address_idx);
        let phone = phone_idx.map(cell).unwrap_or("");

        if name.is_empty() {
            return Err(CsvError::MissingField { row, field: "Name" });
        }
        if address.is_empty() {
            return Err(CsvError::MissingField { row, field: "Address" });
        }

        records.push(EntityRecord {
            name: name.to_string(),
            address: address.to_string(),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
            source_row: row,
        });
    }

    Ok(records)
}
