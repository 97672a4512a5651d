use anyhow::{Result, bail};
use clap::Args;
use uuid::Uuid;

use daybook_core::models::{MealEntry, MealInput};
use daybook_core::service::DaybookService;

use super::helpers::{found_or_exit, parse_date, print_result};

#[derive(Args, Debug, Default)]
pub(crate) struct MealOptions {
    /// Label: breakfast, lunch, dinner, snack, or any custom label
    #[arg(short, long)]
    pub label: Option<String>,
    /// Time eaten (HH:MM)
    #[arg(short, long)]
    pub time: Option<String>,
    /// Calories
    #[arg(short, long)]
    pub calories: Option<i64>,
    /// Servings multiplier (default: 1)
    #[arg(short, long)]
    pub servings: Option<f64>,
    /// Protein (g)
    #[arg(long)]
    pub protein: Option<i64>,
    /// Carbs (g)
    #[arg(long)]
    pub carbs: Option<i64>,
    /// Fat (g)
    #[arg(long)]
    pub fat: Option<i64>,
    /// Image URL
    #[arg(long)]
    pub image_url: Option<String>,
}

impl MealOptions {
    fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.time.is_none()
            && self.calories.is_none()
            && self.servings.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.image_url.is_none()
    }

    fn into_input(self, recipe_name: String) -> MealInput {
        MealInput {
            recipe_name,
            label: self.label,
            time: self.time,
            calories: self.calories,
            servings: self.servings,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            image_url: self.image_url,
        }
    }

    /// Fill every option not given on the command line from `existing`.
    fn merged_with(self, name: Option<String>, existing: MealEntry) -> MealInput {
        MealInput {
            recipe_name: name.unwrap_or(existing.recipe_name),
            label: self.label.or(Some(existing.label)),
            time: self.time.or(existing.time),
            calories: self.calories.or(existing.calories),
            servings: self.servings.or(Some(existing.servings)),
            protein: self.protein.or(existing.protein),
            carbs: self.carbs.or(existing.carbs),
            fat: self.fat.or(existing.fat),
            image_url: self.image_url.or(existing.image_url),
        }
    }
}

pub(crate) fn cmd_meal_add(
    svc: &DaybookService,
    owner: Uuid,
    name: String,
    opts: MealOptions,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let input = opts.into_input(name);
    let view = svc.add_meal(owner, date, &input)?;
    let name = input.recipe_name.trim();
    print_result(&view, &format!("Added {name} to {date}"), json)
}

pub(crate) fn cmd_meal_update(
    svc: &DaybookService,
    owner: Uuid,
    meal_id: Uuid,
    name: Option<String>,
    opts: MealOptions,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if name.is_none() && opts.is_empty() {
        bail!("Nothing to update. Provide --name or at least one meal option");
    }

    let date = parse_date(date)?;
    let existing = found_or_exit(svc.get_meal(owner, date, meal_id), json)?;
    let input = opts.merged_with(name, existing);
    let view = found_or_exit(svc.update_meal(owner, date, meal_id, &input), json)?;
    print_result(&view, &format!("Updated meal {meal_id}"), json)
}

pub(crate) fn cmd_meal_delete(
    svc: &DaybookService,
    owner: Uuid,
    meal_id: Uuid,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let view = found_or_exit(svc.delete_meal(owner, date, meal_id), json)?;
    print_result(&view, &format!("Deleted meal {meal_id}"), json)
}
