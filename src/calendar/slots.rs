use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::config::BookingSettings;
use crate::crm::{DayInterval, TimeRange};

/// Сколько интервалов помещается на одну страницу выбора времени.
pub const PAGE_SIZE: usize = 24;
/// Кнопок времени в ряду.
pub const ROW_LEN: usize = 3;

/// Отрезок времени, на который можно записаться целиком.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    pub begin: NaiveTime,
    pub end: NaiveTime,
}

/// Склеивает элементарные тики врача в блоки длительностью приема.
///
/// В блок идут `ceil(duration / tick)` подряд идущих тиков (минимум один),
/// размер тика берется по первому тику. Разрыв между тиками начинает
/// набор заново, неполный хвост отбрасывается.
pub fn merge_ticks(ticks: &[TimeRange], duration_minutes: u32, default_tick_minutes: u32) -> Vec<Block> {
    let mut ticks = ticks.to_vec();
    ticks.sort_by_key(|tick| (tick.begin, tick.end));

    let Some(first) = ticks.first() else {
        return Vec::new();
    };

    let tick_minutes = match (first.end - first.begin).num_minutes() {
        minutes if minutes > 0 => minutes as u32,
        _ => default_tick_minutes.max(1),
    };
    let per_block = duration_minutes.div_ceil(tick_minutes).max(1) as usize;

    let mut blocks = Vec::new();
    let mut run: Vec<TimeRange> = Vec::with_capacity(per_block);
    for tick in ticks {
        if run.last().is_some_and(|last| last.end != tick.begin) {
            run.clear();
        }
        run.push(tick);
        if run.len() == per_block {
            blocks.push(Block {
                begin: run[0].begin,
                end: tick.end,
            });
            run.clear();
        }
    }

    blocks.sort();
    blocks
}

/// Блоки одного дня из ответа `freetimeintervals`.
pub fn day_blocks(
    intervals: &[DayInterval],
    date: NaiveDate,
    duration_minutes: u32,
    default_tick_minutes: u32,
) -> Vec<Block> {
    let ticks: Vec<TimeRange> = intervals
        .iter()
        .filter(|interval| interval.date == date)
        .flat_map(DayInterval::ticks)
        .collect();
    merge_ticks(&ticks, duration_minutes, default_tick_minutes)
}

/// Дни начиная с `today`, в которых есть хотя бы один блок.
pub fn available_days(
    intervals: &[DayInterval],
    today: NaiveDate,
    duration_minutes: u32,
    default_tick_minutes: u32,
) -> BTreeSet<NaiveDate> {
    intervals
        .iter()
        .filter(|interval| interval.date >= today)
        .filter(|interval| !merge_ticks(&interval.ticks(), duration_minutes, default_tick_minutes).is_empty())
        .map(|interval| interval.date)
        .collect()
}

/// Локальное время клиники для момента `now`.
pub fn clinic_now(now: DateTime<Utc>, settings: &BookingSettings) -> chrono::NaiveDateTime {
    now.with_timezone(&settings.clinic_offset).naive_local()
}

/// Можно ли еще записаться на начало `begin` в день `date`.
/// Граница `now + cutoff` включительно.
pub fn is_selectable(date: NaiveDate, begin: NaiveTime, now: DateTime<Utc>, settings: &BookingSettings) -> bool {
    date.and_time(begin) >= clinic_now(now, settings) + settings.cutoff
}

#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub index: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

pub fn paginate<T>(items: &[T], index: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let start = index.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    Page {
        items: &items[start..end],
        index,
        has_prev: index > 0 && items.len() > page_size,
        has_next: items.len() > index.saturating_add(1).saturating_mul(page_size),
    }
}
