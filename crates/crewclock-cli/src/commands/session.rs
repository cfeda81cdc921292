use super::{drain_events, open_machine, CliResult};

pub fn register(user: &str, name: &str) -> CliResult {
    let (machine, _rx) = open_machine()?;
    let registered = machine.register(user, name)?;
    println!("registered '{}' as {}", registered.id, registered.name);
    Ok(())
}

pub fn checkin(user: &str) -> CliResult {
    let (machine, mut rx) = open_machine()?;
    let timesheet_id = machine.check_in(user)?;
    println!("checked in (timesheet {timesheet_id})");
    drain_events(&mut rx);
    Ok(())
}

pub fn checkout(user: &str) -> CliResult {
    let (machine, mut rx) = open_machine()?;
    let duration_min = machine.check_out(user)?;
    println!("checked out after {duration_min} min");
    drain_events(&mut rx);
    Ok(())
}
