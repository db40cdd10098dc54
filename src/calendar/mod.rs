pub mod grid;
pub mod slots;

pub use grid::{month_grid, navigation, MonthNavigation, Week, YearMonth, MAX_MONTHS_AHEAD};
pub use slots::{
    available_days, clinic_now, day_blocks, is_selectable, merge_ticks, paginate, Block, Page, PAGE_SIZE, ROW_LEN,
};
