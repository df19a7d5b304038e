use serde::Serialize;

use super::session;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressView {
    level: u32,
    xp: u64,
    xp_to_next_level: u64,
    fraction: f64,
    rank: &'static str,
}

pub fn run(user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open(user)?;
    let progress = session.progress();
    let view = ProgressView {
        level: progress.level,
        xp: progress.xp,
        xp_to_next_level: progress.xp_to_next_level(),
        fraction: progress.fraction(),
        rank: progress.rank().title(),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
