use anyhow::{Result, bail};
use clap::Args;
use uuid::Uuid;

use daybook_core::models::{WorkoutEntry, WorkoutInput};
use daybook_core::service::DaybookService;

use super::helpers::{found_or_exit, parse_date, print_result};

#[derive(Args, Debug, Default)]
pub(crate) struct WorkoutOptions {
    /// Duration in minutes
    #[arg(short, long)]
    pub minutes: Option<i64>,
    /// Calories burned
    #[arg(short, long)]
    pub calories: Option<i64>,
    /// Total sets
    #[arg(short, long)]
    pub sets: Option<i64>,
    /// Start time (HH:MM)
    #[arg(short, long)]
    pub time: Option<String>,
}

impl WorkoutOptions {
    fn is_empty(&self) -> bool {
        self.minutes.is_none() && self.calories.is_none() && self.sets.is_none() && self.time.is_none()
    }

    fn into_input(self, name: String) -> WorkoutInput {
        WorkoutInput {
            name,
            time: self.time,
            duration_min: self.minutes,
            calories_burned: self.calories,
            total_sets: self.sets,
        }
    }

    fn merged_with(self, name: Option<String>, existing: WorkoutEntry) -> WorkoutInput {
        WorkoutInput {
            name: name.unwrap_or(existing.name),
            time: self.time.or(existing.time),
            duration_min: self.minutes.or(Some(existing.duration_min)),
            calories_burned: self.calories.or(existing.calories_burned),
            total_sets: self.sets.or(Some(existing.total_sets)),
        }
    }
}

pub(crate) fn cmd_workout_add(
    svc: &DaybookService,
    owner: Uuid,
    name: String,
    opts: WorkoutOptions,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let input = opts.into_input(name);
    let view = svc.add_workout(owner, date, &input)?;
    let name = input.name.trim();
    print_result(&view, &format!("Added workout {name} to {date}"), json)
}

pub(crate) fn cmd_workout_update(
    svc: &DaybookService,
    owner: Uuid,
    workout_id: Uuid,
    name: Option<String>,
    opts: WorkoutOptions,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if name.is_none() && opts.is_empty() {
        bail!("Nothing to update. Provide --name or at least one workout option");
    }

    let date = parse_date(date)?;
    let existing = found_or_exit(svc.get_workout(owner, date, workout_id), json)?;
    let input = opts.merged_with(name, existing);
    let view = found_or_exit(svc.update_workout(owner, date, workout_id, &input), json)?;
    print_result(&view, &format!("Updated workout {workout_id}"), json)
}

pub(crate) fn cmd_workout_delete(
    svc: &DaybookService,
    owner: Uuid,
    workout_id: Uuid,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let view = found_or_exit(svc.delete_workout(owner, date, workout_id), json)?;
    print_result(&view, &format!("Deleted workout {workout_id}"), json)
}
