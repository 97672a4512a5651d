pub mod db;
pub mod error;
pub mod models;
pub mod recipe_search;
pub mod service;
pub mod tracking;

pub use error::{Error, Result};
