use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use teloxide::utils::html::escape;

pub const POSITIVE_ANSWERS: &[&str] = &["✅ Подтвердить", "Подтвердить", "Да", "Yes", "Y", "Ok", "Ок"];
pub const NEGATIVE_ANSWERS: &[&str] = &["Отменить", "Нет", "Не", "No", "N"];

pub const WELCOME: &str = "Привет! 👋 Добро пожаловать в нашу стоматологическую клинику в \"Олимп\" Софрино 🦷✨

Вот что я могу для вас сделать:
- 🗓️ /record — Запись на приём к стоматологу
- 🗑️ /delete_record — Удалить запись на приём
- 📋 /myrecords — Получить информацию о предстоящих визитах
- ✏️ /change_name — Изменить имя в системе
- ❌ /cancel — Отменить последнее действие и вернуться к началу

Для записи на приём просто отправьте команду /record или выберите нужный пункт в меню.";

pub const CANCEL: &str = "Мы успешно вернулись в начало";
pub const CALENDAR: &str = "Выберите нужный день";
pub const PHONE_NUMBER_REQUEST: &str = "Пожалуйста, укажите ваш номер телефона 📱. \
Он понадобится для подтверждения вашей регистрации и редактирования записи.\n\n\
Нажмите кнопку <b>📞 Отправить номер телефона</b>";
pub const PHONE_NUMBER_RETRY: &str = "📲 Пожалуйста, нажмите кнопку <b>📞 Отправить номер телефона</b>, \n\n\
Если передумали, введите команду /cancel ❌";
pub const SEND_PHONE_BUTTON: &str = "📞 Отправить номер телефона";
pub const BACK: &str = "Назад";
pub const WAIT: &str = "Секунду...";
pub const CHOOSE_DOCTOR: &str =
    "Пожалуйста, выберите врача для записи. Вы можете выбрать из доступных специалистов ниже 👇";
pub const CHOOSE_APPOINTMENTS: &str = "Пожалуйста, выберите желаемый прием 🌟.";
pub const APPROVE: &str = "✅ Подтвердить";
pub const DECLINE: &str = "Отменить";
pub const APPROVE_REGISTER_TIME_LIMIT: &str = "⚠️ Упс! Вы не можете записаться на уже прошедшую дату и время";
pub const HAS_SAME_RECORD: &str = "К сожалению, вы не можете записаться к этому врачу, \
так как уже состоите в списке записавшихся 🩺❗ к нему";
pub const CONTACTS_ADDED_SUCCESS: &str = "📞 Ваш номер телефона успешно добавлен!\nВы можете продолжить регистрацию.";
pub const CHANGE_NAME: &str = "Изменить имя";
pub const CHANGE_FIRST_NAME_REQUEST: &str = "🗝 Пожалуйста, укажите ваше имя.";
pub const CHANGE_LAST_NAME_REQUEST: &str = "🗝 Пожалуйста, теперь укажите фамилию.";
pub const REGISTER_INTERVAL_ERROR: &str =
    "К сожалению, выбранный интервал недоступен для записи 😔. Пожалуйста, выберите другой 🗓️.";
pub const HAS_NO_RECORDS: &str = "Похоже, у вас нет записей 📅";
pub const RECORD_LIST: &str = "Список ваших записей в стоматологическую клинику \"Олимп\" в Софрино\n\
🔴 - Предстоящие записи\n\n";
pub const DELETE_RECORDS: &str = "Выберите запись, которую хотите удалить ❌";
pub const HAS_NO_DELETE_RECORD: &str = "К сожалению, такой записи не найдено 😕";
pub const UNKNOWN_APPROVE_DELETE_RECORD: &str = "Пожалуйста, напишите 'Да' или 'Нет', \
либо нажмите на соответствующую кнопку 😊

Если хотите вернуться и отменить действие, напишите /cancel";
pub const INTERNAL_ERROR: &str =
    "😔 Внутренняя ошибка сервера. Пожалуйста, попробуйте позже. Спасибо за понимание! 🙏";

const MONTHS: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь", "Июль", "Август", "Сентябрь", "Октябрь", "Ноябрь", "Декабрь",
];
pub const WEEKDAYS: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];

pub fn month_name(month: u32) -> &'static str {
    MONTHS.get(month.saturating_sub(1) as usize).copied().unwrap_or("")
}

pub fn is_match_ignore_case(text: &str, phrases: &[&str]) -> bool {
    let text = text.trim().to_lowercase();
    phrases.iter().any(|phrase| phrase.to_lowercase() == text)
}

pub fn dont_has_appointments(doctor: &str) -> String {
    format!("К сожалению, у врача {doctor} пока нет доступных приемов 😔.")
}

pub fn calendar_header(doctor: &str, appointment: &str) -> String {
    format!("{CALENDAR} - {doctor}\n{appointment}\n🟢 Доступные дни")
}

pub fn choose_interval(date: NaiveDate, doctor: &str, appointment: &str) -> String {
    format!(
        "День {}\nВрач {doctor}\n{appointment}\n\nПожалуйста, выберите свободное время. 🕒✨",
        date.format("%d.%m.%Y")
    )
}

pub fn dont_has_intervals(date: NaiveDate, doctor: &str, appointment: &str) -> String {
    format!(
        "День {}\nВрач {doctor}\n{appointment}\n\n\
         К сожалению, у врача {doctor} пока нет свободных интервалов в этот день. 😔🗓️",
        date.format("%d.%m.%Y")
    )
}

pub fn approve_register(
    starts_at: NaiveDateTime,
    doctor: &str,
    appointment: &str,
    minutes: u32,
    last_name: &str,
    first_name: &str,
) -> String {
    format!(
        "Стоматологическая клиника \"Олимп\" в Софрино\n\n\
         📅 Дата и время: <b><i>{}</i></b>\n👨‍⚕️ Врач: <b><i>{}</i></b>\n\
         🦷 На прием: <b><i>{} ({minutes} мин)</i></b>\n\n\
         Вы будете записаны как: <b><i>{} {}</i></b>\n\n\
         Пожалуйста, подтвердите, что все верно.",
        starts_at.format("%Y-%m-%d %H:%M"),
        escape(doctor),
        escape(appointment),
        escape(last_name),
        escape(first_name),
    )
}

pub fn register_success(
    date: NaiveDate,
    time: NaiveTime,
    doctor: &str,
    appointment: &str,
    minutes: u32,
    last_name: &str,
    first_name: &str,
) -> String {
    format!(
        "Вы успешно записались на прием! 🎉\n\n\
         Стоматологическая клиника \"Олимп\" в Софрино\n\n\
         📅 Дата и время: <b><i>{} {}</i></b>\n👨‍⚕️ Врач: <b><i>{}</i></b>\n\
         🦷 На прием: <b><i>{} ({minutes} мин)</i></b>\n\n\
         Вы записаны как: <b><i>{} {}</i></b>\n\n\
         Воспользуйтесь командой:\n\
         \t/delete_record ❌ — если хотите удалить запись\n\n\
         Ждем вас! 😊",
        date.format("%Y-%m-%d"),
        time.format("%H:%M:%S"),
        escape(doctor),
        escape(appointment),
        escape(last_name),
        escape(first_name),
    )
}

pub fn change_name_succeed(first_name: &str, last_name: &str) -> String {
    format!(
        "🎉 Ваше имя успешно изменено на <b><i>{} {}</i></b>!",
        escape(first_name),
        escape(last_name)
    )
}

pub fn record_item(
    number: usize,
    upcoming: bool,
    starts_at: NaiveDateTime,
    doctor: &str,
    department: &str,
    appointment: &str,
    minutes: i64,
) -> String {
    let marker = if upcoming { "🔴 " } else { "" };
    format!(
        "{marker}Запись №{number}\n📅 Дата и время: <b><i>{}</i></b>\n\
         👨‍⚕️ Врач: <b><i>{} - {}</i></b>\n🦷 На прием: <b><i>{} ({minutes} мин)</i></b>",
        starts_at.format("%Y-%m-%d %H:%M"),
        escape(doctor),
        escape(department),
        escape(appointment),
    )
}

pub fn delete_record_item(number: usize, starts_at: NaiveDateTime, doctor: &str) -> String {
    format!("Запись №{number}: {} {doctor}", starts_at.format("%Y-%m-%d %H:%M"))
}

pub fn approve_delete_record(starts_at: NaiveDateTime, doctor: &str) -> String {
    format!(
        "Вы хотите удалить запись — {}, {doctor} 🗓️.\n\nПодтвердить удаление? ✅",
        starts_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn cancel_delete_record(starts_at: NaiveDateTime, doctor: &str) -> String {
    format!("Удаление записи — {}, {doctor}, отменено ❌", starts_at.format("%Y-%m-%d %H:%M"))
}

pub fn success_delete_record(starts_at: NaiveDateTime, doctor: &str) -> String {
    format!("Запись — {}, {doctor}, успешно удалена ✅", starts_at.format("%Y-%m-%d %H:%M"))
}
