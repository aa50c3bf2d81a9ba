//! 营业时间的 JSON 解析与展示格式化。
//!
//! 数据库中 `business_profiles.business_hours` 为 jsonb，形如
//! `{"monday": {"open": "09:00", "close": "17:00"}, "sunday": {"closed": true}}`。
//! 缺失的日期视为休息。

use chrono::{NaiveTime, Weekday};
use serde_json::{Map, Value, json};

use crate::error::AppError;

const DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HoursError {
    #[error("business hours must be a JSON object keyed by weekday")]
    NotAnObject,
    #[error("unknown weekday: {0}")]
    UnknownDay(String),
    #[error("invalid hours for {0}")]
    InvalidEntry(String),
    #[error("invalid time {value:?} for {day}, expected HH:MM")]
    InvalidTime { day: String, value: String },
    #[error("{0}: opening time must be before closing time")]
    OpenAfterClose(String),
    #[error("{0} is given more than once")]
    DuplicateDay(String),
}

impl From<HoursError> for AppError {
    fn from(e: HoursError) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessHours {
    days: [Option<DayHours>; 7],
}

pub fn day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn day_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn parse_day(key: &str) -> Option<Weekday> {
    let key = key.trim().to_ascii_lowercase();
    DAYS.into_iter()
        .find(|d| day_key(*d) == key || day_key(*d)[..3] == key)
}

fn parse_time(day: &str, value: &Value) -> Result<NaiveTime, HoursError> {
    let invalid = || HoursError::InvalidTime {
        day: day.to_string(),
        value: value.to_string(),
    };
    let raw = value.as_str().ok_or_else(invalid)?.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| invalid())
}

fn parse_entry(day: &str, value: &Value) -> Result<Option<DayHours>, HoursError> {
    let obj = match value {
        Value::Null => return Ok(None),
        Value::Object(obj) => obj,
        _ => return Err(HoursError::InvalidEntry(day.to_string())),
    };

    if obj.get("closed").and_then(Value::as_bool) == Some(true)
        || obj.get("is_open").and_then(Value::as_bool) == Some(false)
    {
        return Ok(None);
    }

    let (Some(open), Some(close)) = (obj.get("open"), obj.get("close")) else {
        return Err(HoursError::InvalidEntry(day.to_string()));
    };
    let open = parse_time(day, open)?;
    let close = parse_time(day, close)?;
    if open >= close {
        return Err(HoursError::OpenAfterClose(day.to_string()));
    }
    Ok(Some(DayHours { open, close }))
}

fn format_time(t: NaiveTime) -> String {
    t.format("%-I:%M %p").to_string()
}

impl BusinessHours {
    pub fn parse(value: &Value) -> Result<Self, HoursError> {
        let obj = value.as_object().ok_or(HoursError::NotAnObject)?;
        let mut hours = BusinessHours::default();
        let mut seen = [false; 7];
        for (key, entry) in obj {
            let day = parse_day(key).ok_or_else(|| HoursError::UnknownDay(key.clone()))?;
            let idx = day.num_days_from_monday() as usize;
            // "mon" 与 "monday" 指同一天
            if std::mem::replace(&mut seen[idx], true) {
                return Err(HoursError::DuplicateDay(day_key(day).to_string()));
            }
            hours.days[idx] = parse_entry(day_key(day), entry)?;
        }
        Ok(hours)
    }

    pub fn set(&mut self, day: Weekday, hours: Option<DayHours>) {
        self.days[day.num_days_from_monday() as usize] = hours;
    }

    pub fn get(&self, day: Weekday) -> Option<DayHours> {
        self.days[day.num_days_from_monday() as usize]
    }

    pub fn is_open_at(&self, day: Weekday, time: NaiveTime) -> bool {
        self.get(day)
            .is_some_and(|h| h.open <= time && time < h.close)
    }

    pub fn open_days(&self) -> usize {
        self.days.iter().filter(|d| d.is_some()).count()
    }

    /// 规范化输出：七天全部给出，休息日为 {"closed": true}
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for day in DAYS {
            let entry = match self.get(day) {
                Some(h) => json!({
                    "open": h.open.format("%H:%M").to_string(),
                    "close": h.close.format("%H:%M").to_string(),
                }),
                None => json!({ "closed": true }),
            };
            map.insert(day_key(day).to_string(), entry);
        }
        Value::Object(map)
    }

    pub fn format_day(&self, day: Weekday) -> String {
        match self.get(day) {
            Some(h) => format!(
                "{}: {} - {}",
                day_label(day),
                format_time(h.open),
                format_time(h.close)
            ),
            None => format!("{}: Closed", day_label(day)),
        }
    }

    /// 周一到周日的展示文本
    pub fn summary(&self) -> Vec<String> {
        DAYS.into_iter().map(|d| self.format_day(d)).collect()
    }
}
