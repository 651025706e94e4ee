//! Summary statistics over the full session record set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use usage_core::record::SessionRecord;

/// Fixed five-bucket age histogram. Bucket bounds are lower-inclusive:
/// 40 lands in "40-50", 70 lands in "70+".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeGroups {
    #[serde(rename = "<40")]
    pub under_40: u32,
    #[serde(rename = "40-50")]
    pub from_40_to_50: u32,
    #[serde(rename = "50-60")]
    pub from_50_to_60: u32,
    #[serde(rename = "60-70")]
    pub from_60_to_70: u32,
    #[serde(rename = "70+")]
    pub over_70: u32,
}

impl AgeGroups {
    /// Count one record into the bucket its age falls in.
    pub fn count(&mut self, age: f64) {
        if age < 40.0 {
            self.under_40 += 1;
        } else if age < 50.0 {
            self.from_40_to_50 += 1;
        } else if age < 60.0 {
            self.from_50_to_60 += 1;
        } else if age < 70.0 {
            self.from_60_to_70 += 1;
        } else {
            self.over_70 += 1;
        }
    }

    /// Total records counted across all buckets.
    pub fn total(&self) -> u32 {
        self.under_40 + self.from_40_to_50 + self.from_50_to_60 + self.from_60_to_70 + self.over_70
    }
}

/// Summary statistics for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub total_messages: u64,
    pub total_trials_found: u64,
    /// Occurrence count per cancer type; records without one are excluded.
    pub cancer_types: HashMap<String, u32>,
    /// Occurrence count per location; records without one are excluded.
    pub locations: HashMap<String, u32>,
    /// Records with a known age, bucketed.
    pub age_groups: AgeGroups,
    pub last_updated: DateTime<Utc>,
}

impl UsageSummary {
    /// Aggregate the full record set.
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let mut cancer_types: HashMap<String, u32> = HashMap::new();
        let mut locations: HashMap<String, u32> = HashMap::new();
        let mut age_groups = AgeGroups::default();

        for record in records {
            if let Some(cancer_type) = &record.cancer_type {
                *cancer_types.entry(cancer_type.clone()).or_insert(0) += 1;
            }
            if let Some(location) = &record.location {
                *locations.entry(location.clone()).or_insert(0) += 1;
            }
            if let Some(age) = record.age {
                age_groups.count(age);
            }
        }

        Self {
            total_sessions: records.len(),
            completed_sessions: records.iter().filter(|r| r.is_completed()).count(),
            total_messages: records.iter().map(|r| r.messages_sent).sum(),
            total_trials_found: records.iter().map(|r| r.trials_found).sum(),
            cancer_types,
            locations,
            age_groups,
            last_updated: Utc::now(),
        }
    }

    /// Compact text rendering for CLI display.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "  Sessions: {} ({} completed)\n",
            self.total_sessions, self.completed_sessions
        ));
        output.push_str(&format!(
            "  Messages: {}  Trials found: {}\n",
            self.total_messages, self.total_trials_found
        ));

        let ages = &self.age_groups;
        output.push_str(&format!(
            "  Ages: <40: {}  40-50: {}  50-60: {}  60-70: {}  70+: {}\n",
            ages.under_40,
            ages.from_40_to_50,
            ages.from_50_to_60,
            ages.from_60_to_70,
            ages.over_70
        ));

        output.push_str(&breakdown_line("Cancer types", &self.cancer_types));
        output.push_str(&breakdown_line("Locations", &self.locations));

        output
    }
}

/// Render one breakdown map as a single line, most frequent first.
fn breakdown_line(label: &str, counts: &HashMap<String, u32>) -> String {
    if counts.is_empty() {
        return String::new();
    }
    let mut entries: Vec<(&String, &u32)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    let mut line = format!("  {}:", label);
    for (name, count) in entries {
        line.push_str(&format!(" {}({})", name, count));
    }
    line.push('\n');
    line
}
