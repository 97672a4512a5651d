//! Day tracking aggregation.
//!
//! A [`TrackingDay`] holds derived totals over its meals and workouts. Every
//! child mutation runs in one transaction that resolves the day, applies the
//! change, re-sums all children from storage and persists the day, so the
//! totals always equal the sums of the rows that exist.

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    DayView, MealEntry, MealInput, TrackingDay, WorkoutEntry, WorkoutInput,
    validate_calories_target, validate_meal_input, validate_workout_input,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkoutTotals {
    pub minutes: i64,
    pub sets: i64,
    pub calories_burned: i64,
}

/// Sum of meal calories, missing values counted as zero.
#[must_use]
pub fn meal_totals(meals: &[MealEntry]) -> i64 {
    meals
        .iter()
        .fold(0, |acc, m| acc.saturating_add(m.calories.unwrap_or(0)))
}

#[must_use]
pub fn workout_totals(workouts: &[WorkoutEntry]) -> WorkoutTotals {
    workouts
        .iter()
        .fold(WorkoutTotals::default(), |acc, w| WorkoutTotals {
            minutes: acc.minutes.saturating_add(w.duration_min),
            sets: acc.sets.saturating_add(w.total_sets),
            calories_burned: acc
                .calories_burned
                .saturating_add(w.calories_burned.unwrap_or(0)),
        })
}

pub struct DayTracker<'a> {
    db: &'a Database,
}

impl<'a> DayTracker<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_or_create(&self, owner_id: Uuid, date: NaiveDate) -> Result<DayView> {
        self.db.with_transaction(|db| {
            let day = ensure_day(db, owner_id, date)?;
            build_view(db, &day)
        })
    }

    /// Tracked days in `start..=end`, oldest first. Never creates days.
    pub fn history(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TrackingDay>> {
        if start > end {
            return Err(Error::invalid(format!(
                "start date {start} is after end date {end}"
            )));
        }
        self.db.list_days(owner_id, start, end)
    }

    pub fn set_calories_target(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        target: i64,
    ) -> Result<DayView> {
        validate_calories_target(target)?;
        self.db.with_transaction(|db| {
            let mut day = ensure_day(db, owner_id, date)?;
            day.calories_target = target;
            db.save_day(&day)?;
            info!(%owner_id, %date, target, "calories target set");
            build_view(db, &day)
        })
    }

    // --- Meals ---

    pub fn add_meal(&self, owner_id: Uuid, date: NaiveDate, input: &MealInput) -> Result<DayView> {
        let meal = validate_meal_input(input)?;
        self.db.with_transaction(|db| {
            let day = ensure_day(db, owner_id, date)?;
            let entry = db.insert_meal(day.id, &meal)?;
            info!(%owner_id, %date, meal_id = %entry.id, "meal added");
            recompute(db, day)
        })
    }

    pub fn get_meal(&self, owner_id: Uuid, date: NaiveDate, meal_id: Uuid) -> Result<MealEntry> {
        let day = existing_day(self.db, owner_id, date)?;
        resolve_meal(self.db, &day, meal_id)
    }

    /// Replace every mutable field of the meal with `input`.
    pub fn update_meal(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        meal_id: Uuid,
        input: &MealInput,
    ) -> Result<DayView> {
        let meal = validate_meal_input(input)?;
        self.db.with_transaction(|db| {
            let day = existing_day(db, owner_id, date)?;
            resolve_meal(db, &day, meal_id)?;
            db.update_meal(meal_id, &meal)?;
            info!(%owner_id, %date, %meal_id, "meal updated");
            recompute(db, day)
        })
    }

    pub fn delete_meal(&self, owner_id: Uuid, date: NaiveDate, meal_id: Uuid) -> Result<DayView> {
        self.db.with_transaction(|db| {
            let day = existing_day(db, owner_id, date)?;
            resolve_meal(db, &day, meal_id)?;
            db.delete_meal(meal_id)?;
            info!(%owner_id, %date, %meal_id, "meal deleted");
            recompute(db, day)
        })
    }

    // --- Workouts ---

    pub fn add_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        input: &WorkoutInput,
    ) -> Result<DayView> {
        let workout = validate_workout_input(input)?;
        self.db.with_transaction(|db| {
            let day = ensure_day(db, owner_id, date)?;
            let entry = db.insert_workout(day.id, &workout)?;
            info!(%owner_id, %date, workout_id = %entry.id, "workout added");
            recompute(db, day)
        })
    }

    pub fn get_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
    ) -> Result<WorkoutEntry> {
        let day = existing_day(self.db, owner_id, date)?;
        resolve_workout(self.db, &day, workout_id)
    }

    pub fn update_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
        input: &WorkoutInput,
    ) -> Result<DayView> {
        let workout = validate_workout_input(input)?;
        self.db.with_transaction(|db| {
            let day = existing_day(db, owner_id, date)?;
            resolve_workout(db, &day, workout_id)?;
            db.update_workout(workout_id, &workout)?;
            info!(%owner_id, %date, %workout_id, "workout updated");
            recompute(db, day)
        })
    }

    pub fn delete_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
    ) -> Result<DayView> {
        self.db.with_transaction(|db| {
            let day = existing_day(db, owner_id, date)?;
            resolve_workout(db, &day, workout_id)?;
            db.delete_workout(workout_id)?;
            info!(%owner_id, %date, %workout_id, "workout deleted");
            recompute(db, day)
        })
    }
}

fn ensure_day(db: &Database, owner_id: Uuid, date: NaiveDate) -> Result<TrackingDay> {
    if let Some(day) = db.find_day(owner_id, date)? {
        return Ok(day);
    }
    let day = db.insert_day(owner_id, date)?;
    info!(%owner_id, %date, day_id = %day.id, "tracking day created");
    Ok(day)
}

fn existing_day(db: &Database, owner_id: Uuid, date: NaiveDate) -> Result<TrackingDay> {
    db.find_day(owner_id, date)?
        .ok_or_else(|| Error::not_found("day", date))
}

fn resolve_meal(db: &Database, day: &TrackingDay, meal_id: Uuid) -> Result<MealEntry> {
    let meal = db
        .get_meal(meal_id)?
        .ok_or_else(|| Error::not_found("meal", meal_id))?;
    if meal.day_id != day.id {
        return Err(Error::Conflict {
            entity: "meal",
            id: meal_id,
            date: day.date,
        });
    }
    Ok(meal)
}

fn resolve_workout(db: &Database, day: &TrackingDay, workout_id: Uuid) -> Result<WorkoutEntry> {
    let workout = db
        .get_workout(workout_id)?
        .ok_or_else(|| Error::not_found("workout", workout_id))?;
    if workout.day_id != day.id {
        return Err(Error::Conflict {
            entity: "workout",
            id: workout_id,
            date: day.date,
        });
    }
    Ok(workout)
}

/// Re-sum every child of `day`, persist the totals and return the view.
fn recompute(db: &Database, mut day: TrackingDay) -> Result<DayView> {
    let meals = db.load_meals(day.id)?;
    let workouts = db.load_workouts(day.id)?;
    let totals = workout_totals(&workouts);

    day.calories_in = meal_totals(&meals);
    day.calories_out = totals.calories_burned;
    day.total_workout_minutes = totals.minutes;
    day.total_sets = totals.sets;
    db.save_day(&day)?;
    debug!(
        day_id = %day.id,
        calories_in = day.calories_in,
        calories_out = day.calories_out,
        minutes = day.total_workout_minutes,
        sets = day.total_sets,
        "day totals recomputed"
    );
    Ok(DayView::new(&day, meals, workouts))
}

fn build_view(db: &Database, day: &TrackingDay) -> Result<DayView> {
    let meals = db.load_meals(day.id)?;
    let workouts = db.load_workouts(day.id)?;
    Ok(DayView::new(day, meals, workouts))
}
