use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::{self, navigation, Block, Page, YearMonth, ROW_LEN};
use crate::config::BookingSettings;
use crate::crm::{Appointment, Doctor, ShortRecord};
use crate::handlers::texts;
use crate::messenger::{Button, Keyboard, Markup};
use crate::protocol::{Action, BackTo};

const BTN_PREV: &str = "<";
const BTN_NEXT: &str = ">";

fn noop(text: impl Into<String>) -> Button {
    Button::new(text, Action::Noop)
}

pub fn back_button(to: BackTo) -> Button {
    Button::new(texts::BACK, Action::Back { to })
}

pub fn make_back_keyboard(to: BackTo) -> Keyboard {
    vec![vec![back_button(to)]]
}

/// Врачи филиала, по одному в ряд.
pub fn make_doctors_keyboard(doctors: &[Doctor]) -> Keyboard {
    doctors
        .iter()
        .map(|doctor| {
            vec![Button::new(
                format!("{} - {}", doctor.fio, doctor.departments_label()),
                Action::SelectDoctor { doctor_id: doctor.id },
            )]
        })
        .collect()
}

pub fn make_appointments_keyboard(appointments: &[Appointment]) -> Keyboard {
    let mut keyboard: Keyboard = appointments
        .iter()
        .map(|appointment| {
            vec![Button::new(
                format!("({} мин.) {}", appointment.time, appointment.name),
                Action::Appointment {
                    appointment_id: appointment.id,
                },
            )]
        })
        .collect();
    keyboard.push(vec![back_button(BackTo::Doctors)]);
    keyboard
}

pub fn make_calendar_keyboard(
    month: YearMonth,
    today: NaiveDate,
    available: &BTreeSet<NaiveDate>,
    doctor_id: i64,
) -> Keyboard {
    let mut keyboard: Keyboard = Vec::new();

    keyboard.push(vec![noop(format!("{} {}", texts::month_name(month.month()), month.year()))]);
    keyboard.push(texts::WEEKDAYS.iter().map(|day| noop(*day)).collect());

    for week in calendar::month_grid(month) {
        keyboard.push(
            week.iter()
                .map(|cell| match cell {
                    Some(date) => {
                        let text = if available.contains(date) {
                            format!("🟢 {}", date.format("%-d"))
                        } else {
                            date.format("%-d").to_string()
                        };
                        Button::new(text, Action::Day { date: *date, page: 0 })
                    }
                    None => noop(" "),
                })
                .collect(),
        );
    }

    let nav = navigation(month, today);
    let mut nav_row = Vec::new();
    if let Some(prev) = nav.prev {
        nav_row.push(Button::new(BTN_PREV, Action::SwitchMonth { month: prev, doctor_id }));
    }
    if let Some(next) = nav.next {
        nav_row.push(Button::new(BTN_NEXT, Action::SwitchMonth { month: next, doctor_id }));
    }
    if !nav_row.is_empty() {
        keyboard.push(nav_row);
    }

    keyboard.push(vec![back_button(BackTo::Appointments)]);
    keyboard
}

/// Страница интервалов дня по три в ряд. Прошедшие отмечены, но кнопка остается.
pub fn make_intervals_keyboard(
    page: &Page<'_, Block>,
    date: NaiveDate,
    now: DateTime<Utc>,
    settings: &BookingSettings,
) -> Keyboard {
    let mut keyboard: Keyboard = page
        .items
        .chunks(ROW_LEN)
        .map(|row| {
            row.iter()
                .map(|block| {
                    let mut text = format!("{} - {}", block.begin.format("%H:%M"), block.end.format("%H:%M"));
                    if !calendar::is_selectable(date, block.begin, now, settings) {
                        text = format!("❌ {text}");
                    }
                    Button::new(text, Action::Interval { start: block.begin })
                })
                .collect()
        })
        .collect();

    let mut nav_row = Vec::new();
    if page.has_prev {
        nav_row.push(Button::new(
            BTN_PREV,
            Action::Day {
                date,
                page: page.index - 1,
            },
        ));
    }
    if page.has_next {
        nav_row.push(Button::new(
            BTN_NEXT,
            Action::Day {
                date,
                page: page.index + 1,
            },
        ));
    }
    if !nav_row.is_empty() {
        keyboard.push(nav_row);
    }

    keyboard.push(vec![back_button(BackTo::Calendar)]);
    keyboard
}

pub fn make_approve_keyboard() -> Keyboard {
    vec![
        vec![Button::new(texts::CHANGE_NAME, Action::ChangeName)],
        vec![Button::new(texts::APPROVE, Action::Approve), back_button(BackTo::Calendar)],
    ]
}

pub fn make_delete_records_keyboard(records: &[ShortRecord]) -> Keyboard {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            vec![Button::new(
                texts::delete_record_item(i + 1, record.date_start, &record.doctor_name),
                Action::DeleteRecord { record_id: record.id },
            )]
        })
        .collect()
}

pub fn contact_markup() -> Markup {
    Markup::RequestContact(texts::SEND_PHONE_BUTTON.to_string())
}

pub fn confirm_markup() -> Markup {
    Markup::Choice(vec![texts::APPROVE.to_string(), texts::DECLINE.to_string()])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::calendar::{paginate, PAGE_SIZE};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_marks_available_days() {
        let today = date(2024, 11, 9);
        let available: BTreeSet<NaiveDate> = [date(2024, 11, 12)].into_iter().collect();
        let keyboard = make_calendar_keyboard(YearMonth::of(today), today, &available, 2);

        assert_eq!(keyboard[0][0].text, "Ноябрь 2024");
        assert_eq!(keyboard[1].len(), 7);

        let days: Vec<&Button> = keyboard[2..7].iter().flatten().collect();
        let marked: Vec<&str> = days
            .iter()
            .filter(|b| b.text.starts_with("🟢"))
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(marked, vec!["🟢 12"]);

        // Текущий месяц: только "вперед"
        let nav = &keyboard[keyboard.len() - 2];
        assert_eq!(nav.len(), 1);
        assert_eq!(nav[0].text, BTN_NEXT);
        assert_eq!(keyboard.last().unwrap()[0].action, Action::Back { to: BackTo::Appointments });
    }

    #[test]
    fn day_buttons_carry_literal_date() {
        let today = date(2024, 11, 9);
        let keyboard = make_calendar_keyboard(YearMonth::of(today), today, &BTreeSet::new(), 2);
        // 1 ноября 2024 - пятница
        assert_eq!(keyboard[2][4].action, Action::Day { date: date(2024, 11, 1), page: 0 });
        assert_eq!(keyboard[2][0].action, Action::Noop);
    }

    #[test]
    fn intervals_are_paged_and_marked() {
        let settings = BookingSettings::default();
        let now = date(2024, 11, 9).and_hms_opt(14, 0, 0).unwrap().and_utc(); // 17:00 по Москве
        let blocks: Vec<Block> = (0..30)
            .map(|i| Block {
                begin: NaiveTime::from_hms_opt(8 + i / 4, (i % 4) * 15, 0).unwrap(),
                end: NaiveTime::from_hms_opt(8 + (i + 1) / 4, ((i + 1) % 4) * 15, 0).unwrap(),
            })
            .collect();

        let page = paginate(&blocks, 0, PAGE_SIZE);
        let keyboard = make_intervals_keyboard(&page, date(2024, 11, 9), now, &settings);

        assert_eq!(keyboard.len(), 8 + 2);
        assert!(keyboard[0][0].text.starts_with("❌ 08:00"));
        let nav = &keyboard[8];
        assert_eq!(nav.len(), 1);
        assert_eq!(nav[0].action, Action::Day { date: date(2024, 11, 9), page: 1 });

        let tomorrow = make_intervals_keyboard(&page, date(2024, 11, 10), now, &settings);
        assert_eq!(tomorrow[0][0].text, "08:00 - 08:15");
    }

    #[test]
    fn approve_keyboard_layout() {
        let keyboard = make_approve_keyboard();
        assert_eq!(keyboard[0][0].action, Action::ChangeName);
        assert_eq!(keyboard[1][0].action, Action::Approve);
        assert_eq!(keyboard[1][1].action, Action::Back { to: BackTo::Calendar });
    }
}
