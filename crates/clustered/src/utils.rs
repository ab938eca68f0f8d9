use clustered_core::{ActiveFlag, EntityKind, Listing};
use colored::Colorize;
use serde::Serialize;

/// "✓ Encryptor<'ENC1'> created successfully"
pub fn success(kind: EntityKind, name: &str, verb: &str) {
    println!(
        "{} {}<'{}'> {} successfully",
        "✓".green(),
        kind,
        name.cyan(),
        verb
    );
}

/// Destructive commands only describe what they would do unless `--yes` is given
pub fn confirm(yes: bool, warning: &str) -> bool {
    if yes {
        return true;
    }
    println!("{}", warning.yellow().bold());
    println!("{}", "→ pass --yes to proceed".yellow());
    false
}

pub fn print_count(verb: &str, count: usize, kind: EntityKind) {
    println!("{} {} {} {} row(s)", "✓".green(), verb, count, kind);
}

pub fn print_listings(kind: EntityKind, listings: &[Listing]) {
    if listings.is_empty() {
        println!("No {} records", kind);
        return;
    }

    let width = listings
        .iter()
        .map(|l| l.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    println!("{:<width$}  {}", "NAME".bold(), "ACTIVE_FLAG".bold(), width = width);
    for listing in listings {
        println!(
            "{:<width$}  {}",
            listing.name,
            flag_label(listing.active),
            width = width
        );
    }
}

fn flag_label(flag: ActiveFlag) -> colored::ColoredString {
    let text = flag.as_char().to_string();
    if flag.is_active() {
        text.green()
    } else {
        text.dimmed()
    }
}

/// `--json` output of `describe` and `list`
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Key/value block used by every `describe` command
#[derive(Default)]
pub struct Fields {
    rows: Vec<(&'static str, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn field(mut self, label: &'static str, value: impl ToString) -> Self {
        self.rows.push((label, value.to_string()));
        self
    }

    pub fn optional(self, label: &'static str, value: Option<&str>) -> Self {
        self.field(label, value.unwrap_or("-"))
    }

    pub fn list(self, label: &'static str, values: &[String]) -> Self {
        let joined = if values.is_empty() {
            "-".to_string()
        } else {
            values.join(", ")
        };
        self.field(label, joined)
    }

    pub fn print(&self) {
        let width = self.rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (label, value) in &self.rows {
            println!("{:<width$}  {}", label.bold(), value, width = width);
        }
    }
}
