use std::{collections::BTreeMap, fmt::Write};

use ansi_term::{Colour, Style};
use chrono::NaiveDate;

use crate::report::{DayView, Level, StatusView};

fn level_style(level: Level) -> Style {
    match level {
        Level::None => Style::new(),
        Level::Minimum => Colour::Fixed(151).normal(),
        Level::Target => Colour::Fixed(71).normal(),
        Level::Maximum => Colour::Fixed(28).bold(),
    }
}

fn paint(text: String, level: Level, colored: bool) -> String {
    if colored {
        level_style(level).paint(text).to_string()
    } else {
        text
    }
}

fn mark(reached: bool) -> &'static str {
    if reached {
        "✓"
    } else {
        "✗"
    }
}

pub fn format_status(status: &StatusView, colored: bool) -> String {
    let mut output = String::new();
    let headline = format!(
        "{}  {:.1} min  level {} {}",
        status.date,
        status.minutes,
        u8::from(status.level),
        mark(status.target_reached)
    );
    let _ = writeln!(output, "{}", paint(headline, status.level, colored));
    let _ = writeln!(
        output,
        "thresholds {} / {} / {} min, {:.1} min left to target ({})",
        status.min_minutes,
        status.target_minutes,
        status.max_minutes,
        status.remaining_to_target(),
        status.progress_to_target()
    );
    let session = match (status.active_session, &status.current_document) {
        (false, _) => "session: none".to_string(),
        (true, None) => "session: active".to_string(),
        (true, Some(document)) => format!("session: active, reading {document}"),
    };
    let _ = writeln!(output, "{session}");
    output
}

/// One line per day, newest first.
pub fn format_history(history: &BTreeMap<NaiveDate, DayView>, colored: bool) -> String {
    let mut output = String::new();
    for (date, day) in history.iter().rev() {
        let line = format!(
            "{date}  {:>6.1} min  level {} {}",
            day.minutes,
            u8::from(day.level),
            mark(day.target_reached)
        );
        let _ = writeln!(output, "{}", paint(line, day.level, colored));
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use crate::report::{DayView, Level, StatusView};

    use super::{format_history, format_status};

    fn status(active_session: bool, current_document: Option<&str>) -> StatusView {
        StatusView {
            date: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
            minutes: 45.,
            level: Level::Minimum,
            target_reached: true,
            min_minutes: 30.,
            target_minutes: 60.,
            max_minutes: 180.,
            active_session,
            current_document: current_document.map(String::from),
        }
    }

    #[test]
    fn test_status_text() {
        let text = format_status(&status(true, Some("/tmp/a.pdf")), false);
        assert_eq!(
            text,
            "2024-07-04  45.0 min  level 1 ✓\n\
             thresholds 30 / 60 / 180 min, 15.0 min left to target (75%)\n\
             session: active, reading /tmp/a.pdf\n"
        );
    }

    #[test]
    fn test_idle_status_text() {
        let text = format_status(&status(false, None), false);
        assert!(text.ends_with("session: none\n"));
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut history = BTreeMap::new();
        history.insert(
            NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            DayView {
                minutes: 0.,
                level: Level::None,
                target_reached: false,
            },
        );
        history.insert(
            NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
            DayView {
                minutes: 75.5,
                level: Level::Target,
                target_reached: true,
            },
        );

        let text = format_history(&history, false);
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "2024-07-04    75.5 min  level 2 ✓");
        assert_eq!(lines[1], "2024-07-03     0.0 min  level 0 ✗");
    }

    #[test]
    fn test_colored_output_keeps_text() {
        let text = format_history(
            &BTreeMap::from([(
                NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
                DayView {
                    minutes: 200.,
                    level: Level::Maximum,
                    target_reached: true,
                },
            )]),
            true,
        );
        assert!(text.contains("200.0 min"));
        assert!(text.contains('\u{1b}'));
    }
}
