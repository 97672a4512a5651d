use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use daybook_core::service::DaybookService;

use super::helpers::{parse_date, print_day_view};

pub(crate) fn cmd_day_show(
    svc: &DaybookService,
    owner: Uuid,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let view = svc.get_or_create_day(owner, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_day_view(&view);
    }
    Ok(())
}

/// First day of a `days`-long window ending on `end`.
fn history_start(end: NaiveDate, days: u32) -> Result<NaiveDate> {
    end.checked_sub_days(Days::new(u64::from(days.max(1) - 1)))
        .with_context(|| format!("--days {days} reaches before the earliest supported date"))
}

pub(crate) fn cmd_day_history(
    svc: &DaybookService,
    owner: Uuid,
    days: u32,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "In")]
        calories_in: i64,
        #[tabled(rename = "Out")]
        calories_out: i64,
        #[tabled(rename = "Target")]
        target: i64,
        #[tabled(rename = "Minutes")]
        minutes: i64,
        #[tabled(rename = "Sets")]
        sets: i64,
    }

    let end = Local::now().date_naive();
    let start = history_start(end, days)?;
    let history = svc.day_history(owner, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        eprintln!("No tracked days in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .rev()
        .map(|d| HistoryRow {
            date: d.date.to_string(),
            calories_in: d.calories_in,
            calories_out: d.calories_out,
            target: d.calories_target,
            minutes: d.total_workout_minutes,
            sets: d.total_sets,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_history_start() {
        let end = date(2024, 6, 15);
        assert_eq!(history_start(end, 1).unwrap(), end);
        assert_eq!(history_start(end, 0).unwrap(), end);
        assert_eq!(history_start(end, 7).unwrap(), date(2024, 6, 9));
    }

    #[test]
    fn test_history_too_many_days_is_an_error() {
        assert!(history_start(date(2024, 6, 15), u32::MAX).is_err());

        let svc = DaybookService::new_in_memory().unwrap();
        let err = cmd_day_history(&svc, Uuid::new_v4(), u32::MAX, true).unwrap_err();
        assert!(err.to_string().contains("--days"));
    }
}
