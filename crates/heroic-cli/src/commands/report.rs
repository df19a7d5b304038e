use super::session;

pub fn run(user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(user)?;
    println!("{}", serde_json::to_string_pretty(&session.report())?);
    Ok(())
}
