use std::path::Path;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    DayView, MealEntry, MealInput, NewRecipe, Page, Recipe, RecipePage, TrackingDay, WorkoutEntry,
    WorkoutInput, validate_new_recipe,
};
use crate::recipe_search::RecipeFilter;
use crate::tracking::DayTracker;

/// Entry point used by the CLI and the HTTP server. Owns the database and
/// hands out day-tracking and recipe-catalog operations.
pub struct DaybookService {
    db: Database,
}

impl DaybookService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    fn tracker(&self) -> DayTracker<'_> {
        DayTracker::new(&self.db)
    }

    // --- Day tracking ---

    pub fn get_or_create_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<DayView> {
        self.tracker().get_or_create(owner_id, date)
    }

    pub fn day_history(
        &self,
        owner_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TrackingDay>> {
        self.tracker().history(owner_id, start, end)
    }

    pub fn set_calories_target(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        target: i64,
    ) -> Result<DayView> {
        self.tracker().set_calories_target(owner_id, date, target)
    }

    pub fn add_meal(&self, owner_id: Uuid, date: NaiveDate, input: &MealInput) -> Result<DayView> {
        self.tracker().add_meal(owner_id, date, input)
    }

    pub fn get_meal(&self, owner_id: Uuid, date: NaiveDate, meal_id: Uuid) -> Result<MealEntry> {
        self.tracker().get_meal(owner_id, date, meal_id)
    }

    pub fn update_meal(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        meal_id: Uuid,
        input: &MealInput,
    ) -> Result<DayView> {
        self.tracker().update_meal(owner_id, date, meal_id, input)
    }

    pub fn delete_meal(&self, owner_id: Uuid, date: NaiveDate, meal_id: Uuid) -> Result<DayView> {
        self.tracker().delete_meal(owner_id, date, meal_id)
    }

    pub fn add_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        input: &WorkoutInput,
    ) -> Result<DayView> {
        self.tracker().add_workout(owner_id, date, input)
    }

    pub fn get_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
    ) -> Result<WorkoutEntry> {
        self.tracker().get_workout(owner_id, date, workout_id)
    }

    pub fn update_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
        input: &WorkoutInput,
    ) -> Result<DayView> {
        self.tracker()
            .update_workout(owner_id, date, workout_id, input)
    }

    pub fn delete_workout(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        workout_id: Uuid,
    ) -> Result<DayView> {
        self.tracker().delete_workout(owner_id, date, workout_id)
    }

    // --- Recipes ---

    /// Create a recipe. When `external_id` is already known the stored recipe
    /// is returned unchanged, so imports can be replayed.
    pub fn create_recipe(&self, recipe: &NewRecipe, external_id: Option<&str>) -> Result<Recipe> {
        let recipe = validate_new_recipe(recipe)?;
        let external_id = external_id.map(str::trim).filter(|id| !id.is_empty());
        self.db.with_transaction(|db| {
            if let Some(ext) = external_id {
                if let Some(existing) = db.find_recipe_by_external_id(ext)? {
                    return Ok(existing);
                }
            }
            let created = db.insert_recipe(&recipe, external_id)?;
            info!(recipe_id = %created.id, title = %created.title, "recipe created");
            Ok(created)
        })
    }

    pub fn get_recipe(&self, id: Uuid) -> Result<Recipe> {
        self.db
            .get_recipe(id)?
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    pub fn update_recipe(&self, id: Uuid, recipe: &NewRecipe) -> Result<Recipe> {
        let recipe = validate_new_recipe(recipe)?;
        let updated = self.db.update_recipe(id, &recipe)?;
        info!(recipe_id = %id, "recipe updated");
        Ok(updated)
    }

    pub fn delete_recipe(&self, id: Uuid) -> Result<()> {
        if !self.db.delete_recipe(id)? {
            return Err(Error::not_found("recipe", id));
        }
        info!(recipe_id = %id, "recipe deleted");
        Ok(())
    }

    pub fn list_recipes(&self, page: Page) -> Result<RecipePage> {
        self.recipe_page(&RecipeFilter::default(), page)
    }

    /// Search with the `title:..,category:..,calories<N` query language.
    pub fn search_recipes(&self, query: &str, page: Page) -> Result<RecipePage> {
        let filter = RecipeFilter::parse(query)?;
        self.recipe_page(&filter, page)
    }

    pub fn recipe_categories(&self) -> Result<Vec<String>> {
        self.db.recipe_categories()
    }

    fn recipe_page(&self, filter: &RecipeFilter, page: Page) -> Result<RecipePage> {
        let content = self.db.list_recipes(filter, page)?;
        let total_elements = self.db.count_recipes(filter)?;
        Ok(RecipePage {
            content,
            page: page.page,
            size: page.size,
            total_elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn recipe(title: &str, category: Option<&str>, calories: Option<i64>) -> NewRecipe {
        let mut recipe = NewRecipe::titled(title);
        recipe.category = category.map(str::to_string);
        recipe.calories = calories;
        recipe
    }

    #[test]
    fn test_service_day_round_trip() {
        let svc = DaybookService::new_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let view = svc
            .add_meal(
                owner,
                date(),
                &MealInput {
                    recipe_name: "Oatmeal".to_string(),
                    calories: Some(300),
                    ..MealInput::default()
                },
            )
            .unwrap();
        let meal_id = view.meals[0].id;
        assert_eq!(svc.get_meal(owner, date(), meal_id).unwrap().id, meal_id);
        assert_eq!(svc.get_or_create_day(owner, date()).unwrap().calories_in, 300);
        assert_eq!(svc.day_history(owner, date(), date()).unwrap().len(), 1);
    }

    #[test]
    fn test_create_recipe_idempotent_by_external_id() {
        let svc = DaybookService::new_in_memory().unwrap();
        let first = svc
            .create_recipe(&recipe("Teriyaki Chicken", Some("Chicken"), Some(600)), Some("52772"))
            .unwrap();
        let again = svc
            .create_recipe(&recipe("Something else", None, None), Some("52772"))
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.title, "Teriyaki Chicken");
        assert_eq!(svc.list_recipes(Page::default()).unwrap().total_elements, 1);
    }

    #[test]
    fn test_create_recipe_without_external_id_always_inserts() {
        let svc = DaybookService::new_in_memory().unwrap();
        let a = svc.create_recipe(&recipe("Soup", None, None), None).unwrap();
        let b = svc.create_recipe(&recipe("Soup", None, None), Some(" ")).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.external_id.is_none());
    }

    #[test]
    fn test_create_recipe_rejects_blank_title() {
        let svc = DaybookService::new_in_memory().unwrap();
        let err = svc.create_recipe(&recipe("  ", None, None), None).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn test_get_update_delete_recipe() {
        let svc = DaybookService::new_in_memory().unwrap();
        let created = svc
            .create_recipe(&recipe("Soup", Some("Starter"), Some(150)), None)
            .unwrap();
        assert_eq!(svc.get_recipe(created.id).unwrap().title, "Soup");

        let updated = svc
            .update_recipe(created.id, &recipe("Pumpkin soup", Some("Starter"), Some(180)))
            .unwrap();
        assert_eq!(updated.title, "Pumpkin soup");

        svc.delete_recipe(created.id).unwrap();
        assert!(matches!(
            svc.get_recipe(created.id),
            Err(Error::NotFound { entity: "recipe", .. })
        ));
        assert!(matches!(
            svc.delete_recipe(created.id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_search_recipes() {
        let svc = DaybookService::new_in_memory().unwrap();
        svc.create_recipe(&recipe("Poulet basquaise", Some("Chicken"), Some(650)), None)
            .unwrap();
        svc.create_recipe(&recipe("Poulet curry", Some("Chicken"), Some(750)), None)
            .unwrap();
        svc.create_recipe(&recipe("Tofu bowl", Some("Vegetarian"), Some(450)), None)
            .unwrap();

        let page = svc
            .search_recipes("title:poulet,category:Chicken,calories<700", Page::default())
            .unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].title, "Poulet basquaise");

        let page = svc.search_recipes("calories>500", Page::default()).unwrap();
        assert_eq!(page.total_elements, 2);

        let everything = svc.search_recipes("unknown:thing", Page::default()).unwrap();
        assert_eq!(everything.total_elements, 3);

        assert!(matches!(
            svc.search_recipes("calories<many", Page::default()),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_list_recipes_paging() {
        let svc = DaybookService::new_in_memory().unwrap();
        for title in ["a", "b", "c", "d", "e"] {
            svc.create_recipe(&recipe(title, None, None), None).unwrap();
        }
        let page = svc.list_recipes(Page::new(1, 2)).unwrap();
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 2);
        let titles: Vec<_> = page.content.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "d"]);
    }

    #[test]
    fn test_recipe_categories() {
        let svc = DaybookService::new_in_memory().unwrap();
        svc.create_recipe(&recipe("a", Some("Dessert"), None), None)
            .unwrap();
        svc.create_recipe(&recipe("b", Some("Beef"), None), None)
            .unwrap();
        svc.create_recipe(&recipe("c", Some("Dessert"), None), None)
            .unwrap();
        assert_eq!(svc.recipe_categories().unwrap(), vec!["Beef", "Dessert"]);
    }
}
