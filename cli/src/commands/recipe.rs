use anyhow::Result;
use clap::Args;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use daybook_core::models::{NewRecipe, Page, Recipe, RecipePage};
use daybook_core::service::DaybookService;

use super::helpers::{found_or_exit, opt_num, parse_ingredient, truncate};

#[derive(Args, Debug)]
pub(crate) struct RecipeArgs {
    /// Recipe title
    pub title: String,
    /// Short description
    #[arg(short, long)]
    pub description: Option<String>,
    /// Category, e.g. Dessert
    #[arg(long)]
    pub category: Option<String>,
    /// Cuisine area, e.g. Italian
    #[arg(long)]
    pub area: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
    /// Servings (default: 1)
    #[arg(short, long, default_value_t = 1)]
    pub servings: i64,
    /// Calories per serving
    #[arg(short, long)]
    pub calories: Option<i64>,
    /// Protein per serving (g)
    #[arg(long)]
    pub protein: Option<i64>,
    /// Carbs per serving (g)
    #[arg(long)]
    pub carbs: Option<i64>,
    /// Fat per serving (g)
    #[arg(long)]
    pub fat: Option<i64>,
    /// Preparation time in minutes
    #[arg(long)]
    pub prep: Option<i64>,
    /// Cooking time in minutes
    #[arg(long)]
    pub cook: Option<i64>,
    /// Ingredient as name or name:measure (repeatable)
    #[arg(short, long = "ingredient")]
    pub ingredients: Vec<String>,
    /// Preparation instructions
    #[arg(long)]
    pub instructions: Option<String>,
    /// Image URL
    #[arg(long)]
    pub image_url: Option<String>,
    /// Source: USER or an importer name (default: USER)
    #[arg(long)]
    pub source: Option<String>,
    /// Upstream id; re-adding the same id returns the existing recipe
    #[arg(long)]
    pub external_id: Option<String>,
}

impl RecipeArgs {
    fn to_new_recipe(&self) -> Result<NewRecipe> {
        let ingredients = self
            .ingredients
            .iter()
            .map(|s| parse_ingredient(s))
            .collect::<Result<Vec<_>>>()?;

        let mut recipe = NewRecipe::titled(&self.title);
        recipe.short_description.clone_from(&self.description);
        recipe.category.clone_from(&self.category);
        recipe.area.clone_from(&self.area);
        recipe.tags.clone_from(&self.tags);
        recipe.servings = self.servings;
        recipe.calories = self.calories;
        recipe.protein_g = self.protein;
        recipe.carbs_g = self.carbs;
        recipe.fat_g = self.fat;
        recipe.prep_minutes = self.prep;
        recipe.cook_minutes = self.cook;
        recipe.instructions.clone_from(&self.instructions);
        recipe.image_url.clone_from(&self.image_url);
        if let Some(source) = &self.source {
            recipe.source.clone_from(source);
        }
        recipe.ingredients = ingredients;
        Ok(recipe)
    }
}

fn print_recipe_page(page: &RecipePage, empty_message: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Area")]
        area: String,
        #[tabled(rename = "Servings")]
        servings: i64,
        #[tabled(rename = "Kcal")]
        calories: String,
    }

    if json {
        println!("{}", serde_json::to_string_pretty(page)?);
        return Ok(());
    }

    if page.content.is_empty() {
        eprintln!("{empty_message}");
        process::exit(2);
    }

    let rows: Vec<RecipeRow> = page
        .content
        .iter()
        .map(|r| RecipeRow {
            id: r.id.to_string(),
            title: truncate(&r.title, 30),
            category: r.category.clone().unwrap_or_default(),
            area: r.area.clone().unwrap_or_default(),
            servings: r.servings,
            calories: opt_num(r.calories),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let shown = page.content.len();
    let total = page.total_elements;
    let number = page.page + 1;
    println!("  Page {number}: {shown} of {total} recipes");
    Ok(())
}

fn print_recipe(recipe: &Recipe) {
    let title = &recipe.title;
    let servings = recipe.servings;
    let source = &recipe.source;
    println!("=== {title} ===");
    if let Some(description) = &recipe.short_description {
        println!("  {description}");
    }
    println!("  Servings: {servings}  |  Source: {source}");
    if let Some(category) = &recipe.category {
        println!("  Category: {category}");
    }
    if let Some(area) = &recipe.area {
        println!("  Area: {area}");
    }
    if let Some(tags) = &recipe.tags {
        println!("  Tags: {tags}");
    }
    if recipe.prep_minutes.is_some() || recipe.cook_minutes.is_some() {
        let prep = opt_num(recipe.prep_minutes);
        let cook = opt_num(recipe.cook_minutes);
        println!("  Prep: {prep} min | Cook: {cook} min");
    }

    let calories = opt_num(recipe.calories);
    let protein = opt_num(recipe.protein_g);
    let carbs = opt_num(recipe.carbs_g);
    let fat = opt_num(recipe.fat_g);
    println!("\n  PER SERVING:");
    println!("    {calories} kcal | P:{protein}g C:{carbs}g F:{fat}g");

    if !recipe.ingredients.is_empty() {
        println!("\n  INGREDIENTS:");
        for ing in &recipe.ingredients {
            let name = &ing.name;
            match &ing.measure {
                Some(measure) => println!("    {name}: {measure}"),
                None => println!("    {name}"),
            }
        }
    }

    if let Some(instructions) = &recipe.instructions {
        println!("\n  INSTRUCTIONS:");
        for line in instructions.lines() {
            println!("    {line}");
        }
    }
}

pub(crate) fn cmd_recipe_list(svc: &DaybookService, page: Page, json: bool) -> Result<()> {
    let result = svc.list_recipes(page)?;
    print_recipe_page(&result, "No recipes found", json)
}

pub(crate) fn cmd_recipe_search(
    svc: &DaybookService,
    query: &str,
    page: Page,
    json: bool,
) -> Result<()> {
    let result = svc.search_recipes(query, page)?;
    print_recipe_page(&result, &format!("No recipes match '{query}'"), json)
}

pub(crate) fn cmd_recipe_show(svc: &DaybookService, id: Uuid, json: bool) -> Result<()> {
    let recipe = found_or_exit(svc.get_recipe(id), json)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_recipe(&recipe);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add(svc: &DaybookService, args: &RecipeArgs, json: bool) -> Result<()> {
    let new_recipe = args.to_new_recipe()?;
    let recipe = svc.create_recipe(&new_recipe, args.external_id.as_deref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let title = &recipe.title;
        let id = recipe.id;
        let count = recipe.ingredients.len();
        println!("Saved recipe: {title} (id: {id}, {count} ingredients)");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &DaybookService, id: Uuid, json: bool) -> Result<()> {
    found_or_exit(svc.delete_recipe(id), json)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_categories(svc: &DaybookService, json: bool) -> Result<()> {
    let categories = svc.recipe_categories()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }
    if categories.is_empty() {
        eprintln!("No categories found");
        process::exit(2);
    }
    for category in &categories {
        println!("{category}");
    }
    Ok(())
}
