use clustered_core::{Application, ConfigSources};
use colored::Colorize;

pub fn handle_init(app: &mut Application, sources: &ConfigSources) -> anyhow::Result<()> {
    println!("{}", "Initiating application...".blue());
    let db = app.initiate(sources)?;

    println!(
        "{} Workspace created at {}",
        "✓".green(),
        app.workspace().root().display().to_string().cyan()
    );
    println!(
        "{} Metadata store created at {}",
        "✓".green(),
        db.display().to_string().cyan()
    );
    Ok(())
}

pub fn handle_refresh(app: &mut Application, sources: &ConfigSources) -> anyhow::Result<()> {
    let refreshed = app.refresh(sources)?;
    if refreshed.is_empty() {
        println!("{}", "No optional configuration supplied; nothing refreshed".yellow());
        return Ok(());
    }
    for attribute in refreshed {
        println!("{} {} refreshed", "✓".green(), attribute.to_string().cyan());
    }
    Ok(())
}

pub fn handle_destroy(app: &mut Application, yes: bool) -> anyhow::Result<()> {
    app.workspace().ensure_initiated()?;

    let warning = format!(
        "This removes the metadata store and the workspace at {}",
        app.workspace().root().display()
    );
    if !crate::utils::confirm(yes, &warning) {
        return Ok(());
    }

    app.destroy()?;
    println!("{} Application destroyed", "✓".green());
    Ok(())
}
