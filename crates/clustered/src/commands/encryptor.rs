use crate::EncryptorCommands;
use crate::utils::{self, Fields};
use clustered_core::model::normalize_name;
use clustered_core::{Application, EntityKind};

pub fn handle(app: &mut Application, command: EncryptorCommands) -> anyhow::Result<()> {
    let mut store = app.open_store()?;
    let mut encryptors = store.encryptors();

    match command {
        EncryptorCommands::Add { name } => {
            let record = encryptors.add(&name)?;
            utils::success(EntityKind::Encryptor, &record.name, "created");
        }
        EncryptorCommands::Describe { name, active, json } => {
            let record = encryptors.describe(&name, active)?;
            if json {
                return utils::print_json(&record);
            }
            Fields::new()
                .field("NAME", &record.name)
                .field("ACTIVE_FLAG", record.active.as_char())
                .print();
        }
        EncryptorCommands::List { all, json } => {
            let listings = encryptors.list(!all)?;
            if json {
                utils::print_json(&listings)?;
            } else {
                utils::print_listings(EntityKind::Encryptor, &listings);
            }
        }
        EncryptorCommands::Delete { name, yes } => {
            let name = normalize_name(EntityKind::Encryptor, &name)?;
            let warning = format!("Encryptor<'{}'> will be marked inactive", name);
            if utils::confirm(yes, &warning) {
                encryptors.delete(&name)?;
                utils::success(EntityKind::Encryptor, &name, "deleted");
            }
        }
        EncryptorCommands::Recover { name } => {
            let name = normalize_name(EntityKind::Encryptor, &name)?;
            encryptors.recover(&name)?;
            utils::success(EntityKind::Encryptor, &name, "recovered");
        }
        EncryptorCommands::Flush { yes } => {
            if utils::confirm(yes, "Inactive encryptors will be removed permanently") {
                let count = encryptors.flush()?;
                utils::print_count("Flushed", count, EntityKind::Encryptor);
            }
        }
        EncryptorCommands::PurgeAll { yes } => {
            if utils::confirm(yes, "Every encryptor will be removed permanently") {
                let count = encryptors.purge_all()?;
                utils::print_count("Purged", count, EntityKind::Encryptor);
            }
        }
    }

    Ok(())
}
