//! CSV rendering of the event log.

use crate::domain::EventRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write error: {0}")]
    Csv(String),
}

#[derive(Debug, serde::Serialize)]
struct Row<'a> {
    seq: u64,
    time_ms: i64,
    kind: &'a str,
    account: &'a str,
    value: String,
    event_key: &'a str,
}

/// One header row, then one row per event in the order given.
///
/// Events that move no value leave the `value` column empty.
pub fn events_to_csv(records: &[EventRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for record in records {
        writer
            .serialize(Row {
                seq: record.seq,
                time_ms: record.time_ms.as_ms(),
                kind: record.event.kind(),
                account: record.event.account().as_str(),
                value: record
                    .event
                    .value()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                event_key: &record.event_key,
            })
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, PoolEvent, TimeMs};

    #[test]
    fn test_events_to_csv() {
        let account = Address::from_bytes([0xab; 20]);
        let records = vec![
            EventRecord::new(
                1,
                TimeMs::new(1000),
                PoolEvent::Bid {
                    account: account.clone(),
                    value: 340282366920938463463374607431768211455,
                },
            ),
            EventRecord::new(
                2,
                TimeMs::new(2000),
                PoolEvent::DepositSet {
                    account: account.clone(),
                    enabled: true,
                },
            ),
        ];

        let bytes = events_to_csv(&records).unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["seq", "time_ms", "kind", "account", "value", "event_key"]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "bid");
        assert_eq!(&rows[0][3], account.as_str());
        assert_eq!(&rows[0][4], "340282366920938463463374607431768211455");
        assert_eq!(&rows[1][4], "");
        assert_eq!(&rows[1][5], records[1].event_key.as_str());
    }

    #[test]
    fn test_empty_log_renders_nothing() {
        assert!(events_to_csv(&[]).unwrap().is_empty());
    }
}
