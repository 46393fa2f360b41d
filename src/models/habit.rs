use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HabitKind {
    Simple,
    Counter,
}

impl HabitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HabitKind::Simple => "simple",
            HabitKind::Counter => "counter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple" => Some(HabitKind::Simple),
            "counter" => Some(HabitKind::Counter),
            _ => None,
        }
    }
}

/// What the projected count does when accepted increments exceed the target.
/// `Saturate` pins the visible count at the target; `Wrap` reduces the net
/// count modulo (target + 1), so one increment past the target shows 0 again.
/// Either way the over-target events stay in the ledger for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    Saturate,
    Wrap,
}

impl OverflowPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OverflowPolicy::Saturate => "saturate",
            OverflowPolicy::Wrap => "wrap",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "saturate" => Some(OverflowPolicy::Saturate),
            "wrap" => Some(OverflowPolicy::Wrap),
            _ => None,
        }
    }
}

/// Weekday applicability mask, Monday first. Stored as a 7-char string of
/// '1'/'0', e.g. "1111100" for weekdays only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitSchedule {
    mask: [bool; 7],
}

impl HabitSchedule {
    pub fn every_day() -> Self {
        Self { mask: [true; 7] }
    }

    pub fn from_weekdays(days: &[Weekday]) -> Self {
        let mut mask = [false; 7];
        for day in days {
            mask[day.num_days_from_monday() as usize] = true;
        }
        Self { mask }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 7 {
            return None;
        }
        let mut mask = [false; 7];
        for (index, ch) in value.chars().enumerate() {
            match ch {
                '1' => mask[index] = true,
                '0' => {}
                _ => return None,
            }
        }
        Some(Self { mask })
    }

    pub fn mask_string(&self) -> String {
        self.mask
            .iter()
            .map(|active| if *active { '1' } else { '0' })
            .collect()
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.mask[weekday.num_days_from_monday() as usize]
    }

    pub fn is_scheduled_on(&self, day: NaiveDate) -> bool {
        self.contains(day.weekday())
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|active| !active)
    }

    /// Most recent scheduled day at or before `day`, if the mask has any
    /// active weekday at all.
    pub fn latest_scheduled_on_or_before(&self, day: NaiveDate) -> Option<NaiveDate> {
        if self.is_empty() {
            return None;
        }
        let mut cursor = day;
        for _ in 0..7 {
            if self.is_scheduled_on(cursor) {
                return Some(cursor);
            }
            cursor = cursor.pred_opt()?;
        }
        None
    }

    /// Scheduled day strictly before `day`.
    pub fn previous_scheduled(&self, day: NaiveDate) -> Option<NaiveDate> {
        let cursor = day.pred_opt()?;
        self.latest_scheduled_on_or_before(cursor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub id: String,
    pub owner_id: String,
    pub kind: HabitKind,
    pub target_count: i64,
    pub schedule: HabitSchedule,
    pub time_zone: String,
    pub overflow_policy: OverflowPolicy,
    pub created_at: String,
    /// Owner-local calendar day of creation, frozen at create time.
    pub created_on: String,
    pub deleted_at: Option<String>,
}

impl HabitRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitCreateInput {
    pub owner_id: String,
    pub kind: HabitKind,
    #[serde(default)]
    pub target_count: Option<i64>,
    #[serde(default)]
    pub schedule: Option<String>,
    pub time_zone: String,
    #[serde(default)]
    pub overflow_policy: Option<OverflowPolicy>,
}

impl Default for HabitKind {
    fn default() -> Self {
        HabitKind::Simple
    }
}

/// Derived per-(habit, day) progress. Never stored; recomputed from the
/// ledger on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitDayState {
    pub habit_id: String,
    pub day: String,
    pub current_count: i64,
    pub target: i64,
    pub is_complete: bool,
}
