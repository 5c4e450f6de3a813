use {
    crate::state::{current_timestamp, AlarmRecord, Snapshot},
    chrono::{DateTime, NaiveDateTime, Utc},
    serde::Deserialize,
    serde_json::Value,
    std::{
        collections::HashMap,
        sync::{PoisonError, RwLock},
    },
};

/// Annotation key whose value names the alarming equipment
pub const EQUIPMENT_KEY: &str = "EquipmentName";

/// Wire shape of an inbound alarm. Only `annotations` is structurally required;
/// any other top-level field is ignored.
#[derive(Debug, Deserialize)]
struct AlarmMessage {
    #[serde(default)]
    timestamp: Option<Value>,
    annotations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "KeyNameAsString")]
    key_name: String,
    #[serde(rename = "ValueAsString")]
    value: String,
}

/// Alarm message after validation
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAlarm {
    pub timestamp: DateTime<Utc>,
    /// The message timestamp was missing or unparsable and processing time was used
    pub timestamp_fallback: bool,
    /// Equipment ids from `EquipmentName` annotations, in message order
    pub equipment: Vec<String>,
    /// Annotations dropped for a foreign key or missing/non-string fields
    pub skipped: usize,
}

#[derive(Debug)]
pub enum IngestError {
    /// Not JSON, not an object, or no `annotations` array
    Malformed(serde_json::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Malformed(e) => write!(f, "Malformed alarm message: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Malformed(err)
    }
}

/// Decode raw payload bytes into a validated alarm
pub fn decode(raw: &[u8]) -> Result<DecodedAlarm, IngestError> {
    let message: AlarmMessage = serde_json::from_slice(raw)?;

    let parsed = message
        .timestamp
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    let timestamp_fallback = parsed.is_none();
    let timestamp = parsed.unwrap_or_else(current_timestamp);

    let total = message.annotations.len();
    let equipment: Vec<String> = message
        .annotations
        .into_iter()
        .filter_map(|value| serde_json::from_value::<Annotation>(value).ok())
        .filter(|annotation| annotation.key_name == EQUIPMENT_KEY)
        .map(|annotation| annotation.value)
        .collect();

    Ok(DecodedAlarm {
        timestamp,
        timestamp_fallback,
        skipped: total - equipment.len(),
        equipment,
    })
}

/// RFC 3339 first; a zone-less ISO-8601 date-time is read as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Per-equipment alarm aggregation
///
/// The only writer of alarm state. The equipment map and the global counter
/// each sit behind their own lock; callers only ever see `Snapshot` copies.
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: RwLock<HashMap<String, AlarmRecord>>,
    global_count: RwLock<u64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw message into the aggregate and return the resulting snapshot
    ///
    /// A structurally invalid message leaves every counter untouched. Otherwise
    /// the global counter goes up by exactly one, whatever the annotations hold.
    pub fn ingest(&self, raw: &[u8]) -> Result<Snapshot, IngestError> {
        let alarm = decode(raw)?;

        {
            let mut global_count = self
                .global_count
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *global_count += 1;
        }

        if alarm.timestamp_fallback {
            log::warn!(
                "Alarm timestamp missing or unparsable, using processing time {}",
                alarm.timestamp
            );
        }
        if alarm.skipped > 0 {
            log::debug!("Skipped {} non-equipment annotations", alarm.skipped);
        }

        if !alarm.equipment.is_empty() {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            for equipment_id in &alarm.equipment {
                records
                    .entry(equipment_id.clone())
                    .and_modify(|record| record.record(alarm.timestamp))
                    .or_insert_with(|| AlarmRecord::first_seen(equipment_id, alarm.timestamp));
            }
        }

        Ok(self.snapshot())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        let records = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let global_count = *self
            .global_count
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Snapshot::new(records, global_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    const T1_ALARM: &str = r#"{"timestamp":"2024-01-01T00:00:00Z","annotations":[{"KeyNameAsString":"EquipmentName","ValueAsString":"T1"}]}"#;

    fn alarm(timestamp: &str, equipment: &[&str]) -> Vec<u8> {
        let annotations: Vec<Value> = equipment
            .iter()
            .map(|id| serde_json::json!({"KeyNameAsString": EQUIPMENT_KEY, "ValueAsString": id}))
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "timestamp": timestamp,
            "annotations": annotations,
        }))
        .unwrap()
    }

    #[test]
    fn test_single_alarm_scenario() {
        let aggregator = Aggregator::new();
        let snapshot = aggregator.ingest(T1_ALARM.as_bytes()).unwrap();

        let record = snapshot.record("T1").unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.last_seen, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(snapshot.global_count(), 1);
    }

    #[test]
    fn test_malformed_bytes_change_nothing() {
        let aggregator = Aggregator::new();

        for raw in [
            &b"not json at all"[..],
            b"[1, 2, 3]",
            br#"{"timestamp":"2024-01-01T00:00:00Z"}"#,
            br#"{"annotations": null}"#,
            br#"{"annotations": "EquipmentName"}"#,
        ] {
            assert!(matches!(aggregator.ingest(raw), Err(IngestError::Malformed(_))));
        }

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.global_count(), 0);
        assert_eq!(snapshot.equipment_count(), 0);
    }

    #[test]
    fn test_bad_timestamp_falls_back_to_processing_time() {
        let aggregator = Aggregator::new();
        let before = Utc::now();
        let snapshot = aggregator.ingest(&alarm("yesterday-ish", &["T2"])).unwrap();
        let after = Utc::now();

        let record = snapshot.record("T2").unwrap();
        assert_eq!(record.count, 1);
        assert!(record.last_seen >= before && record.last_seen <= after);
        assert_eq!(snapshot.global_count(), 1);
    }

    #[test]
    fn test_missing_timestamp_is_not_fatal() {
        let decoded = decode(
            br#"{"annotations":[{"KeyNameAsString":"EquipmentName","ValueAsString":"T9"}]}"#,
        )
        .unwrap();

        assert!(decoded.timestamp_fallback);
        assert_eq!(decoded.equipment, vec!["T9".to_string()]);
    }

    #[test]
    fn test_zoneless_timestamp_read_as_utc() {
        let decoded = decode(&alarm("2024-03-05T10:20:30.250", &[])).unwrap();

        assert!(!decoded.timestamp_fallback);
        assert_eq!(
            decoded.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_n_annotations_add_n() {
        let aggregator = Aggregator::new();
        aggregator.ingest(&alarm("2024-01-01T00:00:00Z", &["T1"])).unwrap();
        let snapshot = aggregator
            .ingest(&alarm("2024-01-02T00:00:00Z", &["T1", "T1", "T1", "T4"]))
            .unwrap();

        let t1 = snapshot.record("T1").unwrap();
        assert_eq!(t1.count, 4);
        assert_eq!(t1.last_seen, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(snapshot.record("T4").unwrap().count, 1);
        // Two messages, regardless of how many annotations they carried
        assert_eq!(snapshot.global_count(), 2);
    }

    #[test]
    fn test_foreign_and_incomplete_annotations_skipped() {
        let raw = br#"{
            "timestamp": "2024-01-01T00:00:00Z",
            "annotations": [
                {"KeyNameAsString": "Severity", "ValueAsString": "HIGH"},
                {"KeyNameAsString": "EquipmentName"},
                {"ValueAsString": "T5"},
                {"KeyNameAsString": "EquipmentName", "ValueAsString": 42},
                "garbage",
                {"KeyNameAsString": "EquipmentName", "ValueAsString": "T6"}
            ],
            "source": "ignored"
        }"#;

        let aggregator = Aggregator::new();
        let snapshot = aggregator.ingest(raw).unwrap();

        assert_eq!(snapshot.equipment_count(), 1);
        assert_eq!(snapshot.record("T6").unwrap().count, 1);
        assert_eq!(snapshot.global_count(), 1);
        assert_eq!(decode(raw).unwrap().skipped, 5);
    }

    #[test]
    fn test_message_without_equipment_still_counts() {
        let aggregator = Aggregator::new();
        let snapshot = aggregator.ingest(&alarm("2024-01-01T00:00:00Z", &[])).unwrap();

        assert_eq!(snapshot.global_count(), 1);
        assert_eq!(snapshot.equipment_count(), 0);
    }

    #[test]
    fn test_reingest_is_not_idempotent() {
        let aggregator = Aggregator::new();
        let first = aggregator.ingest(T1_ALARM.as_bytes()).unwrap();
        let second = aggregator.ingest(T1_ALARM.as_bytes()).unwrap();

        // Counts are cumulative: the same message counts twice
        assert_ne!(first, second);
        assert_eq!(second.record("T1").unwrap().count, 2);
        assert_eq!(second.global_count(), 2);
    }

    #[test]
    fn test_snapshots_are_monotonic() {
        let aggregator = Aggregator::new();
        let messages = [
            alarm("2024-01-01T00:00:00Z", &["T1"]),
            b"{broken".to_vec(),
            alarm("2024-01-01T00:01:00Z", &["T2", "T1"]),
            alarm("not a time", &[]),
            alarm("2024-01-01T00:02:00Z", &["T3"]),
        ];

        let mut previous = aggregator.snapshot();
        for raw in &messages {
            if let Ok(snapshot) = aggregator.ingest(raw) {
                assert!(snapshot.dominates(&previous));
                previous = snapshot;
            }
        }
        assert_eq!(previous.global_count(), 4);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let aggregator = Aggregator::new();
        let snapshot = aggregator.ingest(T1_ALARM.as_bytes()).unwrap();
        aggregator.ingest(T1_ALARM.as_bytes()).unwrap();

        assert_eq!(snapshot.record("T1").unwrap().count, 1);
        assert_eq!(aggregator.snapshot().record("T1").unwrap().count, 2);
    }

    #[test]
    fn test_concurrent_ingest() {
        let aggregator = Arc::new(Aggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    let id = format!("T{}", worker % 2);
                    for _ in 0..50 {
                        aggregator
                            .ingest(&alarm("2024-01-01T00:00:00Z", &[id.as_str()]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.global_count(), 400);
        assert_eq!(snapshot.record("T0").unwrap().count, 200);
        assert_eq!(snapshot.record("T1").unwrap().count, 200);
    }
}
