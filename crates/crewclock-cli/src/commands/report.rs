use chrono::{NaiveDate, TimeZone, Utc};

use super::{open_machine, CliResult};

/// Parse YYYY-MM-DD into the UTC instant starting (or ending) that day.
fn parse_day(value: &str, end_of_day: bool) -> Result<chrono::DateTime<Utc>, Box<dyn std::error::Error>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    let naive = time.ok_or_else(|| format!("invalid date: {value}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

pub fn run(user: &str, from: &str, to: &str) -> CliResult {
    let from = parse_day(from, false)?;
    let to = parse_day(to, true)?;

    let (machine, _rx) = open_machine()?;
    let report = machine.report(user, from, to)?;

    if report.timesheets.is_empty() {
        println!("no closed timesheets for '{user}' in range");
        return Ok(());
    }

    for ts in &report.timesheets {
        let ended = ts
            .ended_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}  {} -> {}  {} min",
            ts.id,
            ts.started_at.format("%Y-%m-%d %H:%M"),
            ended,
            ts.duration_min.unwrap_or(0)
        );
    }
    println!("total: {} min", report.total_min);
    println!("completed focus sessions: {}", report.completed.len());
    for fs in &report.completed {
        println!(
            "  {}  {} ({} min)",
            fs.started_at.format("%Y-%m-%d %H:%M"),
            fs.subject,
            fs.duration_min.unwrap_or(0)
        );
    }
    Ok(())
}

pub fn roster() -> CliResult {
    let (machine, _rx) = open_machine()?;
    for user in machine.roster()? {
        println!(
            "{}  {}  (registered {})",
            user.id,
            user.name,
            user.registered_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}
