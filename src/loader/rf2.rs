//! SNOMED RF2 tab-delimited file helpers (spec §4.1 "RF2 deduplication").
//!
//! Grounded in `original_source/.../snomed.py`'s `rf2_dataframe_deduplicate`:
//! group by `id`, keep the row with the maximum `effectiveTime`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::{BtsError, BtsResult};

/// Headers plus deduplicated rows of an RF2 tab file: for each distinct
/// `id`, only the row with the lexicographically-maximum `effectiveTime`
/// (RF2 timestamps are `YYYYMMDD`, so lexicographic order is chronological)
/// survives.
pub fn read_deduplicated(path: &Path) -> BtsResult<(StringRecord, Vec<StringRecord>)> {
    let file = std::fs::File::open(path)?;
    deduplicate(file).map_err(|e| match e {
        BtsError::ParseError { line, message, .. } => BtsError::ParseError {
            file: path.display().to_string(),
            line,
            message,
        },
        other => other,
    })
}

pub fn deduplicate<R: Read>(reader: R) -> BtsResult<(StringRecord, Vec<StringRecord>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| parse_err(0, &e))?
        .clone();
    let id_idx = headers
        .iter()
        .position(|h| h == "id")
        .ok_or_else(|| parse_err(0, &"missing `id` column"))?;
    let time_idx = headers
        .iter()
        .position(|h| h == "effectiveTime")
        .ok_or_else(|| parse_err(0, &"missing `effectiveTime` column"))?;

    let mut best: HashMap<String, StringRecord> = HashMap::new();
    // Preserve first-seen order among distinct ids so downstream processing
    // is deterministic.
    let mut order: Vec<String> = Vec::new();

    for (line, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| parse_err(line + 2, &e))?;
        let id = record.get(id_idx).unwrap_or("").to_string();
        let time = record.get(time_idx).unwrap_or("");

        match best.get(&id) {
            Some(existing) if existing.get(time_idx).unwrap_or("") >= time => {}
            None => {
                order.push(id.clone());
                best.insert(id, record);
            }
            Some(_) => {
                best.insert(id, record);
            }
        }
    }

    let rows = order
        .into_iter()
        .filter_map(|id| best.remove(&id))
        .collect();
    Ok((headers, rows))
}

fn parse_err(line: usize, message: &dyn std::fmt::Display) -> BtsError {
    BtsError::ParseError {
        file: "rf2".to_string(),
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn keeps_row_with_max_effective_time() {
        let data = "id\teffectiveTime\tactive\n\
                    404684003\t20020131\t0\n\
                    404684003\t20230131\t1\n";
        let (headers, rows) = deduplicate(Cursor::new(data)).unwrap();
        assert_eq!(rows.len(), 1);
        let active_idx = headers.iter().position(|h| h == "active").unwrap();
        assert_eq!(rows[0].get(active_idx), Some("1"));
    }

    #[test]
    fn distinct_ids_are_all_kept() {
        let data = "id\teffectiveTime\n1\t20200101\n2\t20200101\n";
        let (_, rows) = deduplicate(Cursor::new(data)).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn missing_id_column_is_a_parse_error() {
        let data = "foo\tbar\n1\t2\n";
        assert!(deduplicate(Cursor::new(data)).is_err());
    }
}
