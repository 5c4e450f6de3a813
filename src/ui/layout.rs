use {
    crate::state::{AlarmRecord, Snapshot},
    chrono::{DateTime, Local, Utc},
    ratatui::style::{Color, Modifier, Style},
};

/// Rows above the equipment list: three title rows and a spacer
pub const HEADER_ROWS: u16 = 4;

pub const APP_TITLE: &str = "Alarm Monitor";

pub fn title_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

pub fn text_style() -> Style {
    Style::default().fg(Color::White)
}

/// One positioned line of the title block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLine {
    pub x: u16,
    pub y: u16,
    pub text: String,
}

/// Title block: name, clock with global counter, equipment count
///
/// The second counter is indented so both `--` separators line up.
pub fn title_lines(now: DateTime<Local>, global_count: u64, equipment_count: usize) -> [TitleLine; 3] {
    [
        TitleLine {
            x: 0,
            y: 0,
            text: APP_TITLE.to_string(),
        },
        TitleLine {
            x: 0,
            y: 1,
            text: format!(
                "Time: {:<24} -- Alarm Global Counter: {:<4}",
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                global_count
            ),
        },
        TitleLine {
            x: 31,
            y: 2,
            text: format!("--      Equipment Count: {:<4}", equipment_count),
        },
    ]
}

pub fn format_record(record: &AlarmRecord) -> String {
    format!(
        "Equipment: {:<9} - Alarms: {:>4} - Last alarm: {}",
        record.equipment_id,
        record.count,
        format_timestamp(record.last_seen)
    )
}

/// Display lines for a snapshot, sorted by equipment id
pub fn render_lines(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .sorted_records()
        .into_iter()
        .map(format_record)
        .collect()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.3f %:z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[test]
    fn test_title_lines() {
        let now = Local.with_ymd_and_hms(2024, 6, 1, 8, 30, 5).unwrap();
        let [name, clock, equipment] = title_lines(now, 42, 7);

        assert_eq!(name.text, APP_TITLE);
        assert!(clock.text.starts_with("Time: 2024-06-01 08:30:05"));
        assert!(clock.text.contains("Alarm Global Counter: 42"));
        assert!(equipment.text.contains("Equipment Count: 7"));
        // Separators of rows 1 and 2 share a column
        assert_eq!(clock.text.find("--"), Some(equipment.x as usize));
    }

    #[test]
    fn test_render_lines_sorted_and_padded() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut records = HashMap::new();
        for (id, count) in [("T2", 3u64), ("T1", 12)] {
            let mut record = AlarmRecord::first_seen(id, at);
            record.count = count;
            records.insert(id.to_string(), record);
        }

        let lines = render_lines(&Snapshot::new(records, 15));

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Equipment: T1        - Alarms:   12 - Last alarm: "));
        assert!(lines[1].starts_with("Equipment: T2        - Alarms:    3 - Last alarm: "));
    }
}
