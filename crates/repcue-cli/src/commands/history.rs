use repcue_core::Database;

use super::CliResult;

pub fn run(limit: usize, json: bool) -> CliResult {
    let db = Database::open()?;
    let records = db.history(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no workouts recorded");
        return Ok(());
    }
    for r in &records {
        println!(
            "{}  {:<9}  {:>3}/{:<3}  {}",
            r.ended_at.format("%Y-%m-%d %H:%M"),
            format!("{:?}", r.outcome).to_lowercase(),
            r.actions_done,
            r.actions_total,
            r.session_id
        );
    }
    Ok(())
}
