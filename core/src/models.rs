use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DEFAULT_CALORIES_TARGET: i64 = 2100;

pub const MEAL_LABELS: &[&str] = &["BREAKFAST", "LUNCH", "DINNER", "SNACK"];
pub const DEFAULT_MEAL_LABEL: &str = "SNACK";

pub const RECIPE_SOURCES: &[&str] = &["WEB", "AI", "USER", "PHOTO"];
pub const DEFAULT_RECIPE_SOURCE: &str = "USER";

pub const DEFAULT_PAGE_SIZE: u32 = 8;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound for every numeric amount a client can send (calories,
/// macros, minutes, sets, targets).
pub const MAX_AMOUNT: i64 = 1_000_000;

// --- Day tracking records ---

/// Per-owner, per-date aggregate root. The `calories_in`, `calories_out`,
/// `total_workout_minutes` and `total_sets` fields are derived from the
/// day's meals and workouts and only written by the aggregator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDay {
    pub id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub calories_target: i64,
    pub calories_in: i64,
    pub calories_out: i64,
    pub total_workout_minutes: i64,
    pub total_sets: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: Uuid,
    #[serde(skip)]
    pub day_id: Uuid,
    pub recipe_name: String,
    pub label: String,
    pub time: Option<String>,
    pub calories: Option<i64>,
    pub servings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip)]
    pub created_at: String,
    #[serde(skip)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutEntry {
    pub id: Uuid,
    #[serde(skip)]
    pub day_id: Uuid,
    pub name: String,
    pub time: Option<String>,
    pub duration_min: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<i64>,
    pub total_sets: i64,
    #[serde(skip)]
    pub created_at: String,
    #[serde(skip)]
    pub updated_at: String,
}

/// Read model returned by every aggregator operation: the day plus all of
/// its meals and workouts, in insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub calories_in: i64,
    pub calories_target: i64,
    pub calories_out: i64,
    pub total_workout_minutes: i64,
    pub total_sets: i64,
    pub meals: Vec<MealEntry>,
    pub workouts: Vec<WorkoutEntry>,
}

impl DayView {
    #[must_use]
    pub fn new(day: &TrackingDay, meals: Vec<MealEntry>, workouts: Vec<WorkoutEntry>) -> Self {
        Self {
            id: day.id,
            date: day.date,
            calories_in: day.calories_in,
            calories_target: day.calories_target,
            calories_out: day.calories_out,
            total_workout_minutes: day.total_workout_minutes,
            total_sets: day.total_sets,
            meals,
            workouts,
        }
    }

    /// Calories left against the target once burned calories are credited back.
    #[must_use]
    pub fn calories_remaining(&self) -> i64 {
        self.calories_target
            .saturating_sub(self.calories_in)
            .saturating_add(self.calories_out)
    }
}

// --- Inputs ---

/// Meal payload as sent by clients. Absent fields fall back to their
/// defaults when validated into a [`NewMealEntry`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealInput {
    pub recipe_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub calories: Option<i64>,
    #[serde(default)]
    pub servings: Option<f64>,
    #[serde(default)]
    pub protein: Option<i64>,
    #[serde(default)]
    pub carbs: Option<i64>,
    #[serde(default)]
    pub fat: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutInput {
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub calories_burned: Option<i64>,
    #[serde(default)]
    pub total_sets: Option<i64>,
}

/// Validated, normalized meal fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMealEntry {
    pub recipe_name: String,
    pub label: String,
    pub time: Option<String>,
    pub calories: Option<i64>,
    pub servings: f64,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fat: Option<i64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkoutEntry {
    pub name: String,
    pub time: Option<String>,
    pub duration_min: i64,
    pub calories_burned: Option<i64>,
    pub total_sets: i64,
}

// --- Recipes ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub short_description: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub servings: i64,
    pub calories: Option<i64>,
    pub prep_minutes: Option<i64>,
    pub cook_minutes: Option<i64>,
    pub protein_g: Option<i64>,
    pub carbs_g: Option<i64>,
    pub fat_g: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub category: Option<String>,
    pub area: Option<String>,
    pub tags: Option<String>,
    pub instructions: Option<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipe {
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_recipe_source")]
    pub source: String,
    #[serde(default = "default_recipe_servings")]
    pub servings: i64,
    #[serde(default)]
    pub calories: Option<i64>,
    #[serde(default)]
    pub prep_minutes: Option<i64>,
    #[serde(default)]
    pub cook_minutes: Option<i64>,
    #[serde(default)]
    pub protein_g: Option<i64>,
    #[serde(default)]
    pub carbs_g: Option<i64>,
    #[serde(default)]
    pub fat_g: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
}

fn default_recipe_source() -> String {
    DEFAULT_RECIPE_SOURCE.to_string()
}

fn default_recipe_servings() -> i64 {
    1
}

impl NewRecipe {
    #[must_use]
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            short_description: None,
            image_url: None,
            source: default_recipe_source(),
            servings: default_recipe_servings(),
            calories: None,
            prep_minutes: None,
            cook_minutes: None,
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            category: None,
            area: None,
            tags: None,
            instructions: None,
            ingredients: Vec::new(),
        }
    }
}

/// One page of recipes plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePage {
    pub content: Vec<Recipe>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
}

/// Zero-based page request. `size` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

impl Page {
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

// --- Validation ---

pub fn parse_day(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| Error::invalid(format!("Invalid date '{date}'. Use YYYY-MM-DD")))
}

/// Accept `H:MM` or `HH:MM` and normalize to `HH:MM`.
pub fn validate_time(time: &str) -> Result<String> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| Error::invalid(format!("Invalid time '{time}'. Use HH:MM")))
}

/// Meal labels are an open set: known labels and custom ones are both
/// stored upper-cased. Blank or missing labels default to SNACK.
pub fn normalize_meal_label(label: Option<&str>) -> Result<String> {
    match label.map(str::trim) {
        None | Some("") => Ok(DEFAULT_MEAL_LABEL.to_string()),
        Some(l) if l.len() > 32 => Err(Error::invalid(format!(
            "Meal label '{l}' is too long (max 32 characters)"
        ))),
        Some(l) => {
            let label = l.to_uppercase();
            if !MEAL_LABELS.contains(&label.as_str()) {
                debug!(%label, "custom meal label");
            }
            Ok(label)
        }
    }
}

fn in_range(field: &str, value: Option<i64>) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(Error::invalid(format!("{field} must not be negative"))),
        Some(v) if v > MAX_AMOUNT => Err(Error::invalid(format!(
            "{field} must be at most {MAX_AMOUNT}"
        ))),
        _ => Ok(()),
    }
}

fn required_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_meal_input(input: &MealInput) -> Result<NewMealEntry> {
    let recipe_name = required_name("recipeName", &input.recipe_name)?;
    let label = normalize_meal_label(input.label.as_deref())?;
    let time = input.time.as_deref().map(validate_time).transpose()?;
    in_range("calories", input.calories)?;
    in_range("protein", input.protein)?;
    in_range("carbs", input.carbs)?;
    in_range("fat", input.fat)?;
    let servings = input.servings.unwrap_or(1.0);
    if !servings.is_finite() || servings <= 0.0 {
        return Err(Error::invalid("servings must be greater than 0"));
    }
    if servings > 1000.0 {
        return Err(Error::invalid("servings must be at most 1000"));
    }
    Ok(NewMealEntry {
        recipe_name,
        label,
        time,
        calories: input.calories,
        servings,
        protein: input.protein,
        carbs: input.carbs,
        fat: input.fat,
        image_url: optional_text(input.image_url.as_ref()),
    })
}

pub fn validate_workout_input(input: &WorkoutInput) -> Result<NewWorkoutEntry> {
    let name = required_name("name", &input.name)?;
    let time = input.time.as_deref().map(validate_time).transpose()?;
    in_range("durationMin", input.duration_min)?;
    in_range("caloriesBurned", input.calories_burned)?;
    in_range("totalSets", input.total_sets)?;
    Ok(NewWorkoutEntry {
        name,
        time,
        duration_min: input.duration_min.unwrap_or(0),
        calories_burned: input.calories_burned,
        total_sets: input.total_sets.unwrap_or(0),
    })
}

pub fn validate_calories_target(target: i64) -> Result<()> {
    if target <= 0 {
        return Err(Error::invalid("caloriesTarget must be greater than 0"));
    }
    if target > MAX_AMOUNT {
        return Err(Error::invalid(format!(
            "caloriesTarget must be at most {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// Trim text fields, upper-case the source and check numeric bounds.
pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<NewRecipe> {
    let title = required_name("title", &recipe.title)?;
    if title.chars().count() > 255 {
        return Err(Error::invalid("title must be at most 255 characters"));
    }
    let source = required_name("source", &recipe.source)?.to_uppercase();
    if !RECIPE_SOURCES.contains(&source.as_str()) {
        debug!(%source, "custom recipe source");
    }
    if recipe.servings < 1 {
        return Err(Error::invalid("servings must be at least 1"));
    }
    in_range("servings", Some(recipe.servings))?;
    in_range("calories", recipe.calories)?;
    in_range("prepMinutes", recipe.prep_minutes)?;
    in_range("cookMinutes", recipe.cook_minutes)?;
    in_range("proteinG", recipe.protein_g)?;
    in_range("carbsG", recipe.carbs_g)?;
    in_range("fatG", recipe.fat_g)?;
    if recipe.ingredients.iter().any(|i| i.name.trim().is_empty()) {
        return Err(Error::invalid("ingredient names must not be empty"));
    }
    Ok(NewRecipe {
        title,
        short_description: optional_text(recipe.short_description.as_ref()),
        image_url: optional_text(recipe.image_url.as_ref()),
        source,
        servings: recipe.servings,
        calories: recipe.calories,
        prep_minutes: recipe.prep_minutes,
        cook_minutes: recipe.cook_minutes,
        protein_g: recipe.protein_g,
        carbs_g: recipe.carbs_g,
        fat_g: recipe.fat_g,
        category: optional_text(recipe.category.as_ref()),
        area: optional_text(recipe.area.as_ref()),
        tags: optional_text(recipe.tags.as_ref()),
        instructions: optional_text(recipe.instructions.as_ref()),
        ingredients: recipe
            .ingredients
            .iter()
            .map(|i| RecipeIngredient {
                name: i.name.trim().to_string(),
                measure: optional_text(i.measure.as_ref()),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(name: &str) -> MealInput {
        MealInput {
            recipe_name: name.to_string(),
            ..MealInput::default()
        }
    }

    #[test]
    fn test_meal_defaults() {
        let entry = validate_meal_input(&meal("Oatmeal")).unwrap();
        assert_eq!(entry.recipe_name, "Oatmeal");
        assert_eq!(entry.label, "SNACK");
        assert!((entry.servings - 1.0).abs() < f64::EPSILON);
        assert!(entry.time.is_none());
        assert!(entry.calories.is_none());
        assert!(entry.protein.is_none());
    }

    #[test]
    fn test_meal_label_is_upper_cased() {
        assert_eq!(normalize_meal_label(Some("lunch")).unwrap(), "LUNCH");
        assert_eq!(normalize_meal_label(Some(" Brunch ")).unwrap(), "BRUNCH");
        assert_eq!(normalize_meal_label(Some("  ")).unwrap(), "SNACK");
        assert_eq!(normalize_meal_label(None).unwrap(), "SNACK");
    }

    #[test]
    fn test_meal_label_too_long() {
        let long = "x".repeat(33);
        assert!(normalize_meal_label(Some(&long)).is_err());
    }

    #[test]
    fn test_meal_blank_name_rejected() {
        assert!(matches!(
            validate_meal_input(&meal("   ")),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_meal_negative_calories_rejected() {
        let mut input = meal("Salad");
        input.calories = Some(-5);
        assert!(validate_meal_input(&input).is_err());
    }

    #[test]
    fn test_meal_zero_servings_rejected() {
        let mut input = meal("Salad");
        input.servings = Some(0.0);
        assert!(validate_meal_input(&input).is_err());
        input.servings = Some(f64::NAN);
        assert!(validate_meal_input(&input).is_err());
    }

    #[test]
    fn test_blank_image_url_dropped() {
        let mut input = meal("Salad");
        input.image_url = Some("  ".to_string());
        assert!(validate_meal_input(&input).unwrap().image_url.is_none());
    }

    #[test]
    fn test_validate_time() {
        assert_eq!(validate_time("08:30").unwrap(), "08:30");
        assert_eq!(validate_time("8:05").unwrap(), "08:05");
        assert!(validate_time("25:00").is_err());
        assert!(validate_time("noon").is_err());
    }

    #[test]
    fn test_workout_defaults() {
        let entry = validate_workout_input(&WorkoutInput {
            name: "Run".to_string(),
            ..WorkoutInput::default()
        })
        .unwrap();
        assert_eq!(entry.duration_min, 0);
        assert_eq!(entry.total_sets, 0);
        assert!(entry.calories_burned.is_none());
    }

    #[test]
    fn test_workout_negative_duration_rejected() {
        let input = WorkoutInput {
            name: "Run".to_string(),
            duration_min: Some(-1),
            ..WorkoutInput::default()
        };
        assert!(validate_workout_input(&input).is_err());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(
            parse_day("2024-06-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert!(parse_day("15/06/2024").is_err());
    }

    #[test]
    fn test_meal_input_from_camel_case_json() {
        let input: MealInput = serde_json::from_value(serde_json::json!({
            "recipeName": "Oatmeal",
            "label": "BREAKFAST",
            "time": "07:30",
            "calories": 300,
            "imageUrl": "https://img.example/oats.png"
        }))
        .unwrap();
        assert_eq!(input.recipe_name, "Oatmeal");
        assert_eq!(input.calories, Some(300));
        assert_eq!(
            input.image_url.as_deref(),
            Some("https://img.example/oats.png")
        );
    }

    #[test]
    fn test_validate_new_recipe_normalizes() {
        let mut recipe = NewRecipe::titled("  Poulet basquaise ");
        recipe.source = "web".to_string();
        recipe.category = Some(String::new());
        recipe.ingredients = vec![RecipeIngredient {
            name: " Chicken ".to_string(),
            measure: Some("500g".to_string()),
        }];
        let recipe = validate_new_recipe(&recipe).unwrap();
        assert_eq!(recipe.title, "Poulet basquaise");
        assert_eq!(recipe.source, "WEB");
        assert!(recipe.category.is_none());
        assert_eq!(recipe.ingredients[0].name, "Chicken");
    }

    #[test]
    fn test_validate_new_recipe_rejects_zero_servings() {
        let mut recipe = NewRecipe::titled("Soup");
        recipe.servings = 0;
        assert!(validate_new_recipe(&recipe).is_err());
    }

    #[test]
    fn test_page_clamps_size() {
        assert_eq!(Page::new(0, 0).size, 1);
        assert_eq!(Page::new(0, 1000).size, MAX_PAGE_SIZE);
        let page = Page::new(2, 8);
        assert_eq!(page.offset(), 16);
        assert_eq!(page.limit(), 8);
        assert_eq!(Page::default(), Page::new(0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_calories_remaining_credits_workouts() {
        let view = DayView {
            id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            calories_in: 750,
            calories_target: 2100,
            calories_out: 250,
            total_workout_minutes: 30,
            total_sets: 0,
            meals: Vec::new(),
            workouts: Vec::new(),
        };
        assert_eq!(view.calories_remaining(), 1600);
    }

    #[test]
    fn test_calories_remaining_saturates() {
        let mut view = DayView {
            id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            calories_in: 0,
            calories_target: i64::MAX,
            calories_out: 10,
            total_workout_minutes: 0,
            total_sets: 0,
            meals: Vec::new(),
            workouts: Vec::new(),
        };
        assert_eq!(view.calories_remaining(), i64::MAX);
        view.calories_target = 1;
        view.calories_in = i64::MAX;
        view.calories_out = 0;
        assert_eq!(view.calories_remaining(), 1 - i64::MAX);
    }

    #[test]
    fn test_amounts_are_capped() {
        assert!(validate_calories_target(MAX_AMOUNT).is_ok());
        assert!(matches!(
            validate_calories_target(i64::MAX),
            Err(Error::Invalid(_))
        ));

        let mut input = meal("Feast");
        input.calories = Some(MAX_AMOUNT + 1);
        assert!(validate_meal_input(&input).is_err());
        input.calories = Some(MAX_AMOUNT);
        assert!(validate_meal_input(&input).is_ok());
        input.servings = Some(1e9);
        assert!(validate_meal_input(&input).is_err());

        let workout = WorkoutInput {
            name: "Ultra".to_string(),
            calories_burned: Some(i64::MAX),
            ..WorkoutInput::default()
        };
        assert!(validate_workout_input(&workout).is_err());

        let mut recipe = NewRecipe::titled("Soup");
        recipe.fat_g = Some(i64::MAX);
        assert!(validate_new_recipe(&recipe).is_err());
    }
}
