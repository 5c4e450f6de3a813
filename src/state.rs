use {
    chrono::{DateTime, Utc},
    std::collections::HashMap,
};

/// Alarm tally for a single piece of equipment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRecord {
    pub equipment_id: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

impl AlarmRecord {
    /// First sighting of an equipment id
    pub fn first_seen(equipment_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            count: 1,
            last_seen: at,
        }
    }

    /// Count another alarm and move `last_seen` to its timestamp
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.last_seen = at;
    }
}

/// Point-in-time copy of the aggregation state
///
/// Copied out of the aggregator under its read locks, after the write for
/// the current message has been released, and handed across the channel by
/// value. Nothing in here aliases the aggregator's own map.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    records: HashMap<String, AlarmRecord>,
    global_count: u64,
}

impl Snapshot {
    pub fn new(records: HashMap<String, AlarmRecord>, global_count: u64) -> Self {
        Self {
            records,
            global_count,
        }
    }

    pub fn global_count(&self) -> u64 {
        self.global_count
    }

    /// Number of distinct equipment ids seen so far
    pub fn equipment_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, equipment_id: &str) -> Option<&AlarmRecord> {
        self.records.get(equipment_id)
    }

    /// Records ordered by equipment id, ascending
    pub fn sorted_records(&self) -> Vec<&AlarmRecord> {
        let mut records: Vec<&AlarmRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
        records
    }

    /// True when `self` could have been produced after `earlier`: the global
    /// counter and every equipment count seen in `earlier` did not go down.
    pub fn dominates(&self, earlier: &Snapshot) -> bool {
        self.global_count >= earlier.global_count
            && earlier.records.iter().all(|(id, record)| {
                self.records
                    .get(id)
                    .map_or(false, |current| current.count >= record.count)
            })
    }
}

/// Helper to get the processing time used when a message timestamp is unusable
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
