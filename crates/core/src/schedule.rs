use chrono::{Datelike, Days, NaiveDate, Weekday};

pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn tomorrow(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}

/// First workday strictly after `today`: Friday (and the weekend) roll over to
/// Monday, any other weekday announces the next calendar day.
pub fn next_workday(today: NaiveDate) -> NaiveDate {
    let mut candidate = tomorrow(today);
    while !is_workday(candidate) {
        let next = tomorrow(candidate);
        if next == candidate {
            break;
        }
        candidate = next;
    }
    candidate
}
