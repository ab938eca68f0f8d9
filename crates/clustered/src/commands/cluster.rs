use crate::ClusterCommands;
use crate::utils::{self, Fields};
use clustered_core::model::normalize_name;
use clustered_core::{Application, ClusterRef, ClusterSpec, EntityKind};

pub fn handle(app: &mut Application, command: ClusterCommands) -> anyhow::Result<()> {
    let mut store = app.open_store()?;

    match command {
        ClusterCommands::Add {
            name,
            repository,
            description,
            security_group_id,
            whitelisted_ips,
        } => {
            let defaults = app.cluster_defaults()?;
            let whitelisted_ips = if whitelisted_ips.is_empty() {
                defaults.whitelisted_ips
            } else {
                whitelisted_ips
            };
            let record = store.clusters().add(&ClusterSpec {
                name,
                repository,
                description: description.or(defaults.description),
                security_group_id: security_group_id.or(defaults.security_group_id),
                whitelisted_ips,
            })?;
            utils::success(EntityKind::Cluster, &record.name, "created");
        }
        ClusterCommands::Describe {
            name,
            repository,
            active,
            json,
        } => {
            let record = store
                .clusters()
                .describe(&ClusterRef::new(name, repository), active)?;
            if json {
                return utils::print_json(&record);
            }
            Fields::new()
                .field("NAME", &record.name)
                .field("REPOSITORY", &record.repository)
                .optional("DESCRIPTION", record.description.as_deref())
                .optional("SECURITY_GROUP_ID", record.security_group_id.as_deref())
                .list("WHITELISTED_IPS", &record.whitelisted_ips)
                .field("STATE", record.state.as_str())
                .field("ACTIVE_FLAG", record.active.as_char())
                .print();
        }
        ClusterCommands::List { repository, all, json } => {
            let listings = store.clusters().list(repository.as_deref(), !all)?;
            if json {
                utils::print_json(&listings)?;
            } else {
                utils::print_listings(EntityKind::Cluster, &listings);
            }
        }
        ClusterCommands::Delete {
            name,
            repository,
            yes,
        } => {
            let name = normalize_name(EntityKind::Cluster, &name)?;
            let warning = format!("Cluster<'{}'> will be marked inactive", name);
            if utils::confirm(yes, &warning) {
                store.clusters().delete(&ClusterRef::new(&name, repository))?;
                utils::success(EntityKind::Cluster, &name, "deleted");
            }
        }
        ClusterCommands::Recover { name, repository } => {
            let name = normalize_name(EntityKind::Cluster, &name)?;
            store.clusters().recover(&ClusterRef::new(&name, repository))?;
            utils::success(EntityKind::Cluster, &name, "recovered");
        }
        ClusterCommands::SetState {
            name,
            repository,
            state,
        } => {
            let name = normalize_name(EntityKind::Cluster, &name)?;
            store
                .clusters()
                .set_state(&ClusterRef::new(&name, repository), state)?;
            utils::success(EntityKind::Cluster, &name, &format!("moved to {}", state));
        }
        ClusterCommands::Flush { repository, yes } => {
            if utils::confirm(yes, "Inactive clusters will be removed permanently") {
                let count = store.clusters().flush(repository.as_deref())?;
                utils::print_count("Flushed", count, EntityKind::Cluster);
            }
        }
        ClusterCommands::PurgeAll { repository, yes } => {
            if utils::confirm(yes, "Every cluster will be removed permanently") {
                let count = store.clusters().purge_all(repository.as_deref())?;
                utils::print_count("Purged", count, EntityKind::Cluster);
            }
        }
    }

    Ok(())
}
