use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{
    Connection, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    DEFAULT_CALORIES_TARGET, MealEntry, NewMealEntry, NewRecipe, NewWorkoutEntry, Page, Recipe,
    TrackingDay, WorkoutEntry,
};
use crate::recipe_search::{RecipeFilter, fold};

const DAY_COLUMNS: &str = "id, owner_id, date, calories_target, calories_in, calories_out,
     total_workout_minutes, total_sets, created_at, updated_at";

const MEAL_COLUMNS: &str = "id, day_id, recipe_name, label, time, calories, servings,
     protein, carbs, fat, image_url, created_at, updated_at";

const WORKOUT_COLUMNS: &str = "id, day_id, name, time, duration_min, calories_burned,
     total_sets, created_at, updated_at";

const RECIPE_COLUMNS: &str = "id, title, short_description, image_url, source, servings,
     calories, prep_minutes, cook_minutes, protein_g, carbs_g, fat_g, external_id,
     category, area, tags, instructions, ingredients_json, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS day_tracking (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    calories_target INTEGER NOT NULL,
                    calories_in INTEGER NOT NULL DEFAULT 0,
                    calories_out INTEGER NOT NULL DEFAULT 0,
                    total_workout_minutes INTEGER NOT NULL DEFAULT 0,
                    total_sets INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (owner_id, date)
                );

                CREATE TABLE IF NOT EXISTS day_meals (
                    id TEXT PRIMARY KEY,
                    day_id TEXT NOT NULL REFERENCES day_tracking(id),
                    recipe_name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    time TEXT,
                    calories INTEGER,
                    servings REAL NOT NULL DEFAULT 1.0,
                    protein INTEGER,
                    carbs INTEGER,
                    fat INTEGER,
                    image_url TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS day_workouts (
                    id TEXT PRIMARY KEY,
                    day_id TEXT NOT NULL REFERENCES day_tracking(id),
                    name TEXT NOT NULL,
                    time TEXT,
                    duration_min INTEGER NOT NULL DEFAULT 0,
                    calories_burned INTEGER,
                    total_sets INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    title_folded TEXT NOT NULL,
                    short_description TEXT,
                    image_url TEXT,
                    source TEXT NOT NULL,
                    servings INTEGER NOT NULL DEFAULT 1,
                    calories INTEGER,
                    prep_minutes INTEGER,
                    cook_minutes INTEGER,
                    protein_g INTEGER,
                    carbs_g INTEGER,
                    fat_g INTEGER,
                    external_id TEXT UNIQUE,
                    category TEXT,
                    area TEXT,
                    tags TEXT,
                    instructions TEXT,
                    ingredients_json TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_day_tracking_owner_date ON day_tracking(owner_id, date);
                CREATE INDEX IF NOT EXISTS idx_day_meals_day ON day_meals(day_id);
                CREATE INDEX IF NOT EXISTS idx_day_workouts_day ON day_workouts(day_id);
                CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title_folded);
                CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Run `f` inside an `IMMEDIATE` transaction. The write lock is taken at
    /// `BEGIN`, so a read-then-write sequence cannot interleave with another
    /// writer. Any error rolls everything back.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // --- Row mapping helpers ---

    fn uuid_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
        let text: String = row.get(idx)?;
        Uuid::parse_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn date_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let text: String = row.get(idx)?;
        NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn day_from_row(row: &rusqlite::Row) -> rusqlite::Result<TrackingDay> {
        Ok(TrackingDay {
            id: Self::uuid_at(row, 0)?,
            owner_id: Self::uuid_at(row, 1)?,
            date: Self::date_at(row, 2)?,
            calories_target: row.get(3)?,
            calories_in: row.get(4)?,
            calories_out: row.get(5)?,
            total_workout_minutes: row.get(6)?,
            total_sets: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealEntry> {
        Ok(MealEntry {
            id: Self::uuid_at(row, 0)?,
            day_id: Self::uuid_at(row, 1)?,
            recipe_name: row.get(2)?,
            label: row.get(3)?,
            time: row.get(4)?,
            calories: row.get(5)?,
            servings: row.get(6)?,
            protein: row.get(7)?,
            carbs: row.get(8)?,
            fat: row.get(9)?,
            image_url: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn workout_from_row(row: &rusqlite::Row) -> rusqlite::Result<WorkoutEntry> {
        Ok(WorkoutEntry {
            id: Self::uuid_at(row, 0)?,
            day_id: Self::uuid_at(row, 1)?,
            name: row.get(2)?,
            time: row.get(3)?,
            duration_min: row.get(4)?,
            calories_burned: row.get(5)?,
            total_sets: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // Ingredients come back as raw JSON and are decoded in `decode_recipe`,
    // where a bad payload can be reported as a corrupt record.
    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<(Recipe, String)> {
        let recipe = Recipe {
            id: Self::uuid_at(row, 0)?,
            title: row.get(1)?,
            short_description: row.get(2)?,
            image_url: row.get(3)?,
            source: row.get(4)?,
            servings: row.get(5)?,
            calories: row.get(6)?,
            prep_minutes: row.get(7)?,
            cook_minutes: row.get(8)?,
            protein_g: row.get(9)?,
            carbs_g: row.get(10)?,
            fat_g: row.get(11)?,
            external_id: row.get(12)?,
            category: row.get(13)?,
            area: row.get(14)?,
            tags: row.get(15)?,
            instructions: row.get(16)?,
            ingredients: Vec::new(),
            created_at: row.get(18)?,
            updated_at: row.get(19)?,
        };
        Ok((recipe, row.get(17)?))
    }

    fn decode_recipe((mut recipe, json): (Recipe, String)) -> Result<Recipe> {
        recipe.ingredients = serde_json::from_str(&json).map_err(|e| {
            Error::Corrupt(format!("recipe {} has unreadable ingredients: {e}", recipe.id))
        })?;
        Ok(recipe)
    }

    fn encode_ingredients(recipe: &NewRecipe) -> Result<String> {
        serde_json::to_string(&recipe.ingredients)
            .map_err(|e| Error::Corrupt(format!("could not encode ingredients: {e}")))
    }

    // --- Tracking days ---

    pub fn find_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<Option<TrackingDay>> {
        let day = self
            .conn
            .query_row(
                &format!("SELECT {DAY_COLUMNS} FROM day_tracking WHERE owner_id = ?1 AND date = ?2"),
                params![owner_id.to_string(), date.format("%Y-%m-%d").to_string()],
                Self::day_from_row,
            )
            .optional()?;
        Ok(day)
    }

    pub fn get_day(&self, id: Uuid) -> Result<TrackingDay> {
        self.conn
            .query_row(
                &format!("SELECT {DAY_COLUMNS} FROM day_tracking WHERE id = ?1"),
                params![id.to_string()],
                Self::day_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("day", id))
    }

    pub fn insert_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<TrackingDay> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO day_tracking (id, owner_id, date, calories_target, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                owner_id.to_string(),
                date.format("%Y-%m-%d").to_string(),
                DEFAULT_CALORIES_TARGET,
                now,
                now,
            ],
        )?;
        self.get_day(id)
    }

    /// Persist the target and derived totals of `day`.
    pub fn save_day(&self, day: &TrackingDay) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE day_tracking
             SET calories_target = ?1, calories_in = ?2, calories_out = ?3,
                 total_workout_minutes = ?4, total_sets = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                day.calories_target,
                day.calories_in,
                day.calories_out,
                day.total_workout_minutes,
                day.total_sets,
                now,
                day.id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("day", day.id));
        }
        Ok(())
    }

    /// Days of `owner_id` between `start` and `end` inclusive, oldest first.
    pub fn list_days(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TrackingDay>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DAY_COLUMNS} FROM day_tracking
             WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date"
        ))?;
        let days = stmt
            .query_map(
                params![
                    owner_id.to_string(),
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string(),
                ],
                Self::day_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }

    // --- Meals ---

    pub fn insert_meal(&self, day_id: Uuid, meal: &NewMealEntry) -> Result<MealEntry> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO day_meals (id, day_id, recipe_name, label, time, calories, servings,
                                    protein, carbs, fat, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id.to_string(),
                day_id.to_string(),
                meal.recipe_name,
                meal.label,
                meal.time,
                meal.calories,
                meal.servings,
                meal.protein,
                meal.carbs,
                meal.fat,
                meal.image_url,
                now,
                now,
            ],
        )?;
        self.get_meal(id)?
            .ok_or_else(|| Error::not_found("meal", id))
    }

    pub fn get_meal(&self, id: Uuid) -> Result<Option<MealEntry>> {
        let meal = self
            .conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM day_meals WHERE id = ?1"),
                params![id.to_string()],
                Self::meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    /// Overwrite every mutable field of the meal. The owning day is untouched.
    pub fn update_meal(&self, id: Uuid, meal: &NewMealEntry) -> Result<MealEntry> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE day_meals
             SET recipe_name = ?1, label = ?2, time = ?3, calories = ?4, servings = ?5,
                 protein = ?6, carbs = ?7, fat = ?8, image_url = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                meal.recipe_name,
                meal.label,
                meal.time,
                meal.calories,
                meal.servings,
                meal.protein,
                meal.carbs,
                meal.fat,
                meal.image_url,
                now,
                id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("meal", id));
        }
        self.get_meal(id)?
            .ok_or_else(|| Error::not_found("meal", id))
    }

    pub fn delete_meal(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM day_meals WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    /// All meals of a day in insertion order.
    pub fn load_meals(&self, day_id: Uuid) -> Result<Vec<MealEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM day_meals WHERE day_id = ?1 ORDER BY rowid"
        ))?;
        let meals = stmt
            .query_map(params![day_id.to_string()], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    // --- Workouts ---

    pub fn insert_workout(&self, day_id: Uuid, workout: &NewWorkoutEntry) -> Result<WorkoutEntry> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO day_workouts (id, day_id, name, time, duration_min, calories_burned,
                                       total_sets, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.to_string(),
                day_id.to_string(),
                workout.name,
                workout.time,
                workout.duration_min,
                workout.calories_burned,
                workout.total_sets,
                now,
                now,
            ],
        )?;
        self.get_workout(id)?
            .ok_or_else(|| Error::not_found("workout", id))
    }

    pub fn get_workout(&self, id: Uuid) -> Result<Option<WorkoutEntry>> {
        let workout = self
            .conn
            .query_row(
                &format!("SELECT {WORKOUT_COLUMNS} FROM day_workouts WHERE id = ?1"),
                params![id.to_string()],
                Self::workout_from_row,
            )
            .optional()?;
        Ok(workout)
    }

    pub fn update_workout(&self, id: Uuid, workout: &NewWorkoutEntry) -> Result<WorkoutEntry> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE day_workouts
             SET name = ?1, time = ?2, duration_min = ?3, calories_burned = ?4,
                 total_sets = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                workout.name,
                workout.time,
                workout.duration_min,
                workout.calories_burned,
                workout.total_sets,
                now,
                id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("workout", id));
        }
        self.get_workout(id)?
            .ok_or_else(|| Error::not_found("workout", id))
    }

    pub fn delete_workout(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM day_workouts WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    /// All workouts of a day in insertion order.
    pub fn load_workouts(&self, day_id: Uuid) -> Result<Vec<WorkoutEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM day_workouts WHERE day_id = ?1 ORDER BY rowid"
        ))?;
        let workouts = stmt
            .query_map(params![day_id.to_string()], Self::workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(workouts)
    }

    // --- Recipes ---

    pub fn insert_recipe(&self, recipe: &NewRecipe, external_id: Option<&str>) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4();
        let ingredients = Self::encode_ingredients(recipe)?;
        self.conn.execute(
            "INSERT INTO recipes (id, title, title_folded, short_description, image_url, source,
                                  servings, calories, prep_minutes, cook_minutes, protein_g,
                                  carbs_g, fat_g, external_id, category, area, tags, instructions,
                                  ingredients_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21)",
            params![
                id.to_string(),
                recipe.title,
                fold(&recipe.title),
                recipe.short_description,
                recipe.image_url,
                recipe.source,
                recipe.servings,
                recipe.calories,
                recipe.prep_minutes,
                recipe.cook_minutes,
                recipe.protein_g,
                recipe.carbs_g,
                recipe.fat_g,
                external_id,
                recipe.category,
                recipe.area,
                recipe.tags,
                recipe.instructions,
                ingredients,
                now,
                now,
            ],
        )?;
        self.get_recipe(id)?
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    pub fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        self.conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
                params![id.to_string()],
                Self::recipe_from_row,
            )
            .optional()?
            .map(Self::decode_recipe)
            .transpose()
    }

    pub fn find_recipe_by_external_id(&self, external_id: &str) -> Result<Option<Recipe>> {
        self.conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE external_id = ?1"),
                params![external_id],
                Self::recipe_from_row,
            )
            .optional()?
            .map(Self::decode_recipe)
            .transpose()
    }

    /// Overwrite the recipe's content. `external_id` is kept.
    pub fn update_recipe(&self, id: Uuid, recipe: &NewRecipe) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let ingredients = Self::encode_ingredients(recipe)?;
        let rows = self.conn.execute(
            "UPDATE recipes
             SET title = ?1, title_folded = ?2, short_description = ?3, image_url = ?4,
                 source = ?5, servings = ?6, calories = ?7, prep_minutes = ?8,
                 cook_minutes = ?9, protein_g = ?10, carbs_g = ?11, fat_g = ?12,
                 category = ?13, area = ?14, tags = ?15, instructions = ?16,
                 ingredients_json = ?17, updated_at = ?18
             WHERE id = ?19",
            params![
                recipe.title,
                fold(&recipe.title),
                recipe.short_description,
                recipe.image_url,
                recipe.source,
                recipe.servings,
                recipe.calories,
                recipe.prep_minutes,
                recipe.cook_minutes,
                recipe.protein_g,
                recipe.carbs_g,
                recipe.fat_g,
                recipe.category,
                recipe.area,
                recipe.tags,
                recipe.instructions,
                ingredients,
                now,
                id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found("recipe", id));
        }
        self.get_recipe(id)?
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    pub fn delete_recipe(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    /// One page of recipes matching `filter`, ordered by title.
    pub fn list_recipes(&self, filter: &RecipeFilter, page: Page) -> Result<Vec<Recipe>> {
        let (where_sql, mut values) = filter.to_sql();
        let limit_idx = values.len() + 1;
        values.push(page.limit().into());
        values.push(page.offset().into());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes{where_sql}
             ORDER BY title_folded, rowid
             LIMIT ?{limit_idx} OFFSET ?{}",
            limit_idx + 1
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::decode_recipe).collect()
    }

    pub fn count_recipes(&self, filter: &RecipeFilter) -> Result<i64> {
        let (where_sql, values) = filter.to_sql();
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM recipes{where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn recipe_categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM recipes WHERE category IS NOT NULL ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeIngredient;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn sample_meal(name: &str, calories: Option<i64>) -> NewMealEntry {
        NewMealEntry {
            recipe_name: name.to_string(),
            label: "LUNCH".to_string(),
            time: Some("12:30".to_string()),
            calories,
            servings: 1.0,
            protein: Some(20),
            carbs: None,
            fat: None,
            image_url: None,
        }
    }

    fn sample_workout(name: &str) -> NewWorkoutEntry {
        NewWorkoutEntry {
            name: name.to_string(),
            time: None,
            duration_min: 45,
            calories_burned: Some(300),
            total_sets: 12,
        }
    }

    fn sample_recipe(title: &str, category: &str, calories: i64) -> NewRecipe {
        let mut recipe = NewRecipe::titled(title);
        recipe.category = Some(category.to_string());
        recipe.area = Some("French".to_string());
        recipe.calories = Some(calories);
        recipe
    }

    #[test]
    fn test_insert_and_find_day() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        assert!(db.find_day(owner, day(15)).unwrap().is_none());

        let created = db.insert_day(owner, day(15)).unwrap();
        assert_eq!(created.owner_id, owner);
        assert_eq!(created.date, day(15));
        assert_eq!(created.calories_target, DEFAULT_CALORIES_TARGET);
        assert_eq!(created.calories_in, 0);
        assert_eq!(created.total_sets, 0);

        let found = db.find_day(owner, day(15)).unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(db.find_day(Uuid::new_v4(), day(15)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_day_rejected() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        db.insert_day(owner, day(15)).unwrap();
        let err = db.insert_day(owner, day(15)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_save_day_persists_totals() {
        let db = Database::open_in_memory().unwrap();
        let mut tracked = db.insert_day(Uuid::new_v4(), day(15)).unwrap();
        tracked.calories_in = 750;
        tracked.calories_out = 250;
        tracked.total_workout_minutes = 30;
        tracked.calories_target = 1800;
        db.save_day(&tracked).unwrap();

        let reloaded = db.get_day(tracked.id).unwrap();
        assert_eq!(reloaded.calories_in, 750);
        assert_eq!(reloaded.calories_out, 250);
        assert_eq!(reloaded.total_workout_minutes, 30);
        assert_eq!(reloaded.calories_target, 1800);
    }

    #[test]
    fn test_get_day_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_day(Uuid::new_v4()),
            Err(Error::NotFound { entity: "day", .. })
        ));
    }

    #[test]
    fn test_list_days_range() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        for d in [20, 10, 15] {
            db.insert_day(owner, day(d)).unwrap();
        }
        db.insert_day(Uuid::new_v4(), day(12)).unwrap();

        let days = db.list_days(owner, day(10), day(15)).unwrap();
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![day(10), day(15)]);
    }

    #[test]
    fn test_meals_load_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let tracked = db.insert_day(Uuid::new_v4(), day(15)).unwrap();
        for name in ["Zucchini", "Apple", "Muffin"] {
            db.insert_meal(tracked.id, &sample_meal(name, Some(100))).unwrap();
        }
        let names: Vec<_> = db
            .load_meals(tracked.id)
            .unwrap()
            .into_iter()
            .map(|m| m.recipe_name)
            .collect();
        assert_eq!(names, vec!["Zucchini", "Apple", "Muffin"]);
    }

    #[test]
    fn test_meal_update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let tracked = db.insert_day(Uuid::new_v4(), day(15)).unwrap();
        let meal = db
            .insert_meal(tracked.id, &sample_meal("Salad", Some(450)))
            .unwrap();
        assert_eq!(meal.day_id, tracked.id);
        assert_eq!(meal.protein, Some(20));

        let mut changed = sample_meal("Big salad", None);
        changed.protein = None;
        let updated = db.update_meal(meal.id, &changed).unwrap();
        assert_eq!(updated.recipe_name, "Big salad");
        assert!(updated.calories.is_none());
        assert!(updated.protein.is_none());

        assert!(db.delete_meal(meal.id).unwrap());
        assert!(!db.delete_meal(meal.id).unwrap());
        assert!(db.get_meal(meal.id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_meal() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .update_meal(Uuid::new_v4(), &sample_meal("Ghost", None))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "meal", .. }));
    }

    #[test]
    fn test_meal_requires_existing_day() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .insert_meal(Uuid::new_v4(), &sample_meal("Orphan", Some(10)))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_workout_crud() {
        let db = Database::open_in_memory().unwrap();
        let tracked = db.insert_day(Uuid::new_v4(), day(15)).unwrap();
        let workout = db.insert_workout(tracked.id, &sample_workout("Squats")).unwrap();
        assert_eq!(workout.duration_min, 45);
        assert_eq!(workout.total_sets, 12);

        let mut changed = sample_workout("Front squats");
        changed.calories_burned = None;
        let updated = db.update_workout(workout.id, &changed).unwrap();
        assert_eq!(updated.name, "Front squats");
        assert!(updated.calories_burned.is_none());

        assert_eq!(db.load_workouts(tracked.id).unwrap().len(), 1);
        assert!(db.delete_workout(workout.id).unwrap());
        assert!(db.load_workouts(tracked.id).unwrap().is_empty());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let result: Result<()> = db.with_transaction(|db| {
            db.insert_day(owner, day(15))?;
            Err(Error::invalid("abort"))
        });
        assert!(result.is_err());
        assert!(db.find_day(owner, day(15)).unwrap().is_none());
    }

    #[test]
    fn test_transaction_commits() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let created = db
            .with_transaction(|db| db.insert_day(owner, day(15)))
            .unwrap();
        assert_eq!(db.find_day(owner, day(15)).unwrap().unwrap().id, created.id);
    }

    #[test]
    fn test_recipe_round_trip_with_ingredients() {
        let db = Database::open_in_memory().unwrap();
        let mut new = sample_recipe("Ratatouille", "Vegetarian", 350);
        new.ingredients = vec![
            RecipeIngredient {
                name: "Eggplant".to_string(),
                measure: Some("1".to_string()),
            },
            RecipeIngredient {
                name: "Salt".to_string(),
                measure: None,
            },
        ];
        let recipe = db.insert_recipe(&new, Some("52771")).unwrap();
        assert_eq!(recipe.external_id.as_deref(), Some("52771"));
        assert_eq!(recipe.ingredients, new.ingredients);

        let by_ext = db.find_recipe_by_external_id("52771").unwrap().unwrap();
        assert_eq!(by_ext.id, recipe.id);
    }

    #[test]
    fn test_recipe_external_id_unique() {
        let db = Database::open_in_memory().unwrap();
        let new = sample_recipe("Soup", "Starter", 120);
        db.insert_recipe(&new, Some("x1")).unwrap();
        assert!(db.insert_recipe(&new, Some("x1")).is_err());
        db.insert_recipe(&new, None).unwrap();
        db.insert_recipe(&new, None).unwrap();
    }

    #[test]
    fn test_corrupt_ingredients_reported() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db
            .insert_recipe(&sample_recipe("Soup", "Starter", 120), None)
            .unwrap();
        db.execute_raw("UPDATE recipes SET ingredients_json = 'not json'")
            .unwrap();
        assert!(matches!(db.get_recipe(recipe.id), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_update_and_delete_recipe() {
        let db = Database::open_in_memory().unwrap();
        let recipe = db
            .insert_recipe(&sample_recipe("Soup", "Starter", 120), Some("ext"))
            .unwrap();
        let updated = db
            .update_recipe(recipe.id, &sample_recipe("Onion soup", "Starter", 180))
            .unwrap();
        assert_eq!(updated.title, "Onion soup");
        assert_eq!(updated.calories, Some(180));
        assert_eq!(updated.external_id.as_deref(), Some("ext"));

        assert!(db.delete_recipe(recipe.id).unwrap());
        assert!(db.get_recipe(recipe.id).unwrap().is_none());
        assert!(matches!(
            db.update_recipe(recipe.id, &sample_recipe("x", "y", 1)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_recipes_filter_and_page() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe("Poulet basquaise", "Chicken", 650), None)
            .unwrap();
        db.insert_recipe(&sample_recipe("Poulet rôti", "Chicken", 800), None)
            .unwrap();
        db.insert_recipe(&sample_recipe("Gratin", "Vegetarian", 500), None)
            .unwrap();

        let filter = RecipeFilter::parse("title:POULET,calories<700").unwrap();
        let found = db.list_recipes(&filter, Page::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Poulet basquaise");
        assert_eq!(db.count_recipes(&filter).unwrap(), 1);

        let all = RecipeFilter::default();
        assert_eq!(db.count_recipes(&all).unwrap(), 3);
        let first = db.list_recipes(&all, Page::new(0, 2)).unwrap();
        let second = db.list_recipes(&all, Page::new(1, 2)).unwrap();
        assert_eq!(first[0].title, "Gratin");
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_title_search_folds_accented_letters() {
        let db = Database::open_in_memory().unwrap();
        db.insert_recipe(&sample_recipe("Crème brûlée", "Dessert", 350), None)
            .unwrap();
        let ecrase = db
            .insert_recipe(&sample_recipe("Écrasé de pommes", "Side", 200), None)
            .unwrap();

        for (query, title) in [
            ("title:CRÈME", "Crème brûlée"),
            ("title:brûlÉe", "Crème brûlée"),
            ("title:écrasé", "Écrasé de pommes"),
        ] {
            let filter = RecipeFilter::parse(query).unwrap();
            let found = db.list_recipes(&filter, Page::default()).unwrap();
            assert_eq!(found.len(), 1, "{query}");
            assert_eq!(found[0].title, title);
        }

        // A renamed recipe is found by its new title only.
        db.update_recipe(ecrase.id, &sample_recipe("Purée maison", "Side", 200))
            .unwrap();
        let old = RecipeFilter::parse("title:ÉCRASÉ").unwrap();
        assert_eq!(db.count_recipes(&old).unwrap(), 0);
        let new = RecipeFilter::parse("title:PURÉE").unwrap();
        assert_eq!(db.count_recipes(&new).unwrap(), 1);
    }

    #[test]
    fn test_recipe_categories_distinct_sorted() {
        let db = Database::open_in_memory().unwrap();
        for (title, category) in [("a", "Vegetarian"), ("b", "Chicken"), ("c", "Vegetarian")] {
            db.insert_recipe(&sample_recipe(title, category, 100), None)
                .unwrap();
        }
        db.insert_recipe(&NewRecipe::titled("d"), None).unwrap();
        assert_eq!(
            db.recipe_categories().unwrap(),
            vec!["Chicken".to_string(), "Vegetarian".to_string()]
        );
    }

    #[test]
    fn test_open_file_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daybook.db");
        let owner = Uuid::new_v4();
        {
            let db = Database::open(&path).unwrap();
            db.insert_day(owner, day(15)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.find_day(owner, day(15)).unwrap().is_some());
    }
}
