use tracing::warn;

pub const FALLBACK_CALENDAR: &str = "hourly";

const KNOWN_SCHEDULES: [(&str, &str); 5] = [
    ("*/1 * * * *", "*:*"),
    ("*/5 * * * *", "*:0/5"),
    ("*/10 * * * *", "*:0/10"),
    ("0 * * * *", "hourly"),
    ("0 0 * * *", "daily"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTranslation {
    pub on_calendar: &'static str,
    pub approximated: bool,
}

/// Map a cron expression onto an `OnCalendar=` value.
///
/// Only a small table of recurring patterns is understood. Anything else
/// runs hourly and is reported as approximated.
pub fn translate_calendar(schedule: &str) -> CalendarTranslation {
    let normalized = schedule.split_whitespace().collect::<Vec<_>>().join(" ");

    match KNOWN_SCHEDULES
        .iter()
        .find(|(cron, _)| *cron == normalized)
    {
        Some(&(_, on_calendar)) => CalendarTranslation {
            on_calendar,
            approximated: false,
        },
        None => {
            warn!(schedule = %schedule, fallback = FALLBACK_CALENDAR, "unrecognized cron schedule");
            CalendarTranslation {
                on_calendar: FALLBACK_CALENDAR,
                approximated: true,
            }
        }
    }
}
