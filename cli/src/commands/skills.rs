use procrelay_core::{config, skills};

/// Handle the `skills` command: same engine `list` path the HTTP endpoints
/// use, printed one name per line.
pub async fn handle_skills() -> anyhow::Result<()> {
    let cfg = config::load_default()?;
    let skills = skills::list_skills(&cfg.engine).await?;
    for name in &skills {
        println!("- {name}");
    }
    Ok(())
}
