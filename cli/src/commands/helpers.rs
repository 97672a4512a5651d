use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use daybook_core::Error as CoreError;
use daybook_core::models::{DayView, MealEntry, RecipeIngredient, WorkoutEntry};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `name:measure` (measure optional), e.g. `"flour:200g"` or `"salt"`.
pub(crate) fn parse_ingredient(s: &str) -> Result<RecipeIngredient> {
    let (name, measure) = match s.split_once(':') {
        Some((name, measure)) => (name.trim(), Some(measure.trim())),
        None => (s.trim(), None),
    };
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use 'name' or 'name:measure'");
    }
    Ok(RecipeIngredient {
        name: name.to_string(),
        measure: measure.filter(|m| !m.is_empty()).map(str::to_string),
    })
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Print `message` in the requested format and exit with status 2.
pub(crate) fn exit_missing(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// Unwrap a service result, turning a missing or mismatched record into
/// the exit-2 "not found" path instead of a hard error.
pub(crate) fn found_or_exit<T>(result: daybook_core::Result<T>, json: bool) -> Result<T> {
    match result {
        Err(e @ (CoreError::NotFound { .. } | CoreError::Conflict { .. })) => {
            exit_missing(&e.to_string(), json)
        }
        other => Ok(other?),
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn opt_num(v: Option<i64>) -> String {
    v.map_or_else(|| "-".to_string(), |n| n.to_string())
}

pub(crate) fn print_meal_table(meals: &[MealEntry]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Label")]
        label: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Meal")]
        name: String,
        #[tabled(rename = "Servings")]
        servings: String,
        #[tabled(rename = "Kcal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id.to_string(),
            label: m.label.clone(),
            time: m.time.clone().unwrap_or_default(),
            name: truncate(&m.recipe_name, 30),
            servings: format!("{}", m.servings),
            calories: opt_num(m.calories),
            protein: opt_num(m.protein),
            carbs: opt_num(m.carbs),
            fat: opt_num(m.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_workout_table(workouts: &[WorkoutEntry]) {
    #[derive(Tabled)]
    struct WorkoutRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Workout")]
        name: String,
        #[tabled(rename = "Minutes")]
        minutes: i64,
        #[tabled(rename = "Kcal")]
        calories: String,
        #[tabled(rename = "Sets")]
        sets: i64,
    }

    let rows: Vec<WorkoutRow> = workouts
        .iter()
        .map(|w| WorkoutRow {
            id: w.id.to_string(),
            time: w.time.clone().unwrap_or_default(),
            name: truncate(&w.name, 30),
            minutes: w.duration_min,
            calories: opt_num(w.calories_burned),
            sets: w.total_sets,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_day_view(view: &DayView) {
    let date = view.date;
    println!("=== {date} ===\n");

    if view.meals.is_empty() {
        println!("  No meals logged");
    } else {
        print_meal_table(&view.meals);
    }
    if !view.workouts.is_empty() {
        println!();
        print_workout_table(&view.workouts);
    }

    let cal_in = view.calories_in;
    let cal_out = view.calories_out;
    let target = view.calories_target;
    let remaining = view.calories_remaining();
    let minutes = view.total_workout_minutes;
    let sets = view.total_sets;
    println!();
    println!("  IN: {cal_in} kcal | OUT: {cal_out} kcal | TARGET: {target} kcal");
    println!("  REMAINING: {remaining} kcal | WORKOUT: {minutes} min, {sets} sets");
}

/// Print the day after a change: pretty JSON, or `message` followed by the
/// day tables.
pub(crate) fn print_result(view: &DayView, message: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        println!("{message}\n");
        print_day_view(view);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_ingredient() {
        let flour = parse_ingredient("flour: 200g").unwrap();
        assert_eq!(flour.name, "flour");
        assert_eq!(flour.measure.as_deref(), Some("200g"));

        let salt = parse_ingredient("salt").unwrap();
        assert_eq!(salt.name, "salt");
        assert!(salt.measure.is_none());

        assert!(parse_ingredient("pepper:").unwrap().measure.is_none());
        assert!(parse_ingredient(":1 cup").is_err());
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Poulet rôti", 20), "Poulet rôti");
    }

    #[test]
    fn test_print_result_both_formats() {
        let svc = daybook_core::service::DaybookService::new_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let view = svc.get_or_create_day(uuid::Uuid::new_v4(), date).unwrap();
        assert!(print_result(&view, "Shown", true).is_ok());
        assert!(print_result(&view, "Shown", false).is_ok());
    }

    #[test]
    fn test_opt_num() {
        assert_eq!(opt_num(Some(42)), "42");
        assert_eq!(opt_num(None), "-");
    }
}
