use anyhow::{Result, bail};
use uuid::Uuid;

use daybook_core::service::DaybookService;

use super::helpers::parse_date;

pub(crate) fn cmd_target_set(
    svc: &DaybookService,
    owner: Uuid,
    calories: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if calories <= 0 {
        bail!("Calorie target must be greater than 0");
    }

    let date = parse_date(date)?;
    let view = svc.set_calories_target(owner, date, calories)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        let remaining = view.calories_remaining();
        println!("{date}: target {calories} kcal/day ({remaining} kcal remaining)");
    }
    Ok(())
}
