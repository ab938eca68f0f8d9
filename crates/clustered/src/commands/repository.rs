use crate::RepositoryCommands;
use crate::utils::{self, Fields};
use clustered_core::model::normalize_name;
use clustered_core::{Application, EntityKind, NewRepository};

pub fn handle(app: &mut Application, command: RepositoryCommands) -> anyhow::Result<()> {
    let mut store = app.open_store()?;

    match command {
        RepositoryCommands::Add {
            name,
            encryptor,
            access_key,
            secret_key,
            region,
            description,
        } => {
            let defaults = app.repository_defaults()?.unwrap_or_default();
            let access_key = access_key.or(defaults.access_key).ok_or_else(|| {
                anyhow::anyhow!(
                    "No access key supplied. Pass --access-key, set CLUSTERED__ACCESS_KEY or add ACCESS_KEY to REPOSITORY_CONFIG"
                )
            })?;
            let secret_key = secret_key.or(defaults.secret_key).ok_or_else(|| {
                anyhow::anyhow!(
                    "No secret key supplied. Pass --secret-key, set CLUSTERED__SECRET_KEY or add SECRET_KEY to REPOSITORY_CONFIG"
                )
            })?;

            let record = store.repositories().add(&NewRepository {
                name,
                encryptor,
                access_key,
                secret_key,
                region: region.or(defaults.region),
                description,
            })?;
            utils::success(EntityKind::Repository, &record.name, "created");
        }
        RepositoryCommands::Describe { name, active, json } => {
            let record = store.repositories().describe(&name, active)?;
            if json {
                return utils::print_json(&record);
            }
            Fields::new()
                .field("NAME", &record.name)
                .field("ENCRYPTOR", &record.encryptor)
                .optional("DESCRIPTION", record.description.as_deref())
                .optional("REGION", record.region.as_deref())
                .optional("VPC_ID", record.vpc_id.as_deref())
                .list("SUBNETS", &record.subnets)
                .field("STATE", record.state.as_str())
                .field("ACTIVE_FLAG", record.active.as_char())
                .print();
        }
        RepositoryCommands::List { all, json } => {
            let listings = store.repositories().list(!all)?;
            if json {
                utils::print_json(&listings)?;
            } else {
                utils::print_listings(EntityKind::Repository, &listings);
            }
        }
        RepositoryCommands::Delete { name, yes } => {
            let name = normalize_name(EntityKind::Repository, &name)?;
            let warning = format!("Repository<'{}'> will be marked inactive", name);
            if utils::confirm(yes, &warning) {
                store.repositories().delete(&name)?;
                utils::success(EntityKind::Repository, &name, "deleted");
            }
        }
        RepositoryCommands::Recover { name } => {
            let name = normalize_name(EntityKind::Repository, &name)?;
            store.repositories().recover(&name)?;
            utils::success(EntityKind::Repository, &name, "recovered");
        }
        RepositoryCommands::Flush { yes } => {
            if utils::confirm(yes, "Inactive repositories will be removed permanently") {
                let count = store.repositories().flush()?;
                utils::print_count("Flushed", count, EntityKind::Repository);
            }
        }
        RepositoryCommands::PurgeAll { yes } => {
            if utils::confirm(yes, "Every repository will be removed permanently") {
                let count = store.repositories().purge_all()?;
                utils::print_count("Purged", count, EntityKind::Repository);
            }
        }
    }

    Ok(())
}
