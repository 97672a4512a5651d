mod day;
mod helpers;
mod meal;
mod recipe;
mod target;
mod workout;

pub(crate) use day::{cmd_day_history, cmd_day_show};
pub(crate) use meal::{MealOptions, cmd_meal_add, cmd_meal_delete, cmd_meal_update};
pub(crate) use recipe::{
    RecipeArgs, cmd_recipe_add, cmd_recipe_categories, cmd_recipe_delete, cmd_recipe_list,
    cmd_recipe_search, cmd_recipe_show,
};
pub(crate) use target::cmd_target_set;
pub(crate) use workout::{WorkoutOptions, cmd_workout_add, cmd_workout_delete, cmd_workout_update};
