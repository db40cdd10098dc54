use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Сколько месяцев вперед можно листать календарь.
pub const MAX_MONTHS_AHEAD: i32 = 12;

pub type Week = [Option<NaiveDate>; 7];

/// Календарный месяц. Внутри хранится первое число месяца.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(YearMonth)
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn pred(&self) -> Option<Self> {
        self.0.checked_sub_months(Months::new(1)).map(YearMonth)
    }

    pub fn succ(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(YearMonth)
    }

    /// Разница в месяцах: положительная, если `self` позже `other`.
    pub fn months_since(&self, other: YearMonth) -> i32 {
        (self.year() - other.year()) * 12 + self.month() as i32 - other.month() as i32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let month = self.month();
        self.0.iter_days().take_while(move |day| day.month() == month)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('.')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}.{:02}", self.year(), self.month())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        YearMonth::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad month {raw:?}")))
    }
}

/// Сетка месяца по неделям, неделя начинается с понедельника.
/// Пустые ячейки в начале первой и в конце последней недели равны `None`.
pub fn month_grid(month: YearMonth) -> Vec<Week> {
    let mut weeks = Vec::with_capacity(6);
    let mut week: Week = [None; 7];
    let mut column = month.first_day().weekday().num_days_from_monday() as usize;

    for day in month.days() {
        week[column] = Some(day);
        column += 1;
        if column == 7 {
            weeks.push(week);
            week = [None; 7];
            column = 0;
        }
    }
    if column > 0 {
        weeks.push(week);
    }
    weeks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthNavigation {
    pub prev: Option<YearMonth>,
    pub next: Option<YearMonth>,
}

/// Кнопки листания: назад только после текущего месяца,
/// вперед пока показанный месяц не дальше `MAX_MONTHS_AHEAD`.
pub fn navigation(shown: YearMonth, today: NaiveDate) -> MonthNavigation {
    let ahead = shown.months_since(YearMonth::of(today));
    MonthNavigation {
        prev: if ahead > 0 { shown.pred() } else { None },
        next: if ahead <= MAX_MONTHS_AHEAD { shown.succ() } else { None },
    }
}
