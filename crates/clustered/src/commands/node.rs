use crate::utils::{self, Fields};
use crate::{NodeCommands, NodeScope};
use anyhow::Context;
use clustered_core::model::normalize_name;
use clustered_core::{Application, ClusterRef, EntityKind, NodeSpec};

impl NodeScope {
    fn cluster_ref(&self) -> Option<ClusterRef> {
        match (&self.cluster, &self.repository) {
            (Some(cluster), Some(repository)) => Some(ClusterRef::new(cluster, repository)),
            _ => None,
        }
    }
}

pub fn handle(app: &mut Application, command: NodeCommands) -> anyhow::Result<()> {
    let mut store = app.open_store()?;

    match command {
        NodeCommands::Add {
            name,
            cluster,
            repository,
            node_type,
            description,
            instance_type,
            key_pair_name,
            block_device_mapping,
        } => {
            let defaults = app.node_defaults(node_type)?;
            let block_device_mapping = match block_device_mapping {
                Some(raw) => Some(
                    serde_json::from_str(&raw).context("--block-device-mapping is not valid JSON")?,
                ),
                None => defaults.block_device_mapping,
            };
            let record = store.nodes().add(&NodeSpec {
                name,
                node_type,
                cluster: ClusterRef::new(cluster, repository),
                description: description.or(defaults.description),
                instance_type: instance_type.or(defaults.instance_type),
                key_pair_name: key_pair_name.or(defaults.key_pair_name),
                block_device_mapping,
            })?;
            utils::success(EntityKind::Node, &record.name, "created");
        }
        NodeCommands::Describe {
            name,
            cluster,
            repository,
            active,
            json,
        } => {
            let record = store
                .nodes()
                .describe(&name, &ClusterRef::new(cluster, repository), active)?;
            if json {
                return utils::print_json(&record);
            }
            let mapping = record.block_device_mapping.as_ref().map(|v| v.to_string());
            Fields::new()
                .field("NAME", &record.name)
                .field("CLUSTER", &record.cluster)
                .field("REPOSITORY", &record.repository)
                .field("TYPE", record.node_type)
                .optional("DESCRIPTION", record.description.as_deref())
                .optional("INSTANCE_TYPE", record.instance_type.as_deref())
                .optional("INSTANCE_ID", record.instance_id.as_deref())
                .optional("KEY_PAIR_NAME", record.key_pair_name.as_deref())
                .optional("BLOCK_DEVICE_MAPPING", mapping.as_deref())
                .field("STATE", record.state.as_str())
                .field("ACTIVE_FLAG", record.active.as_char())
                .print();
        }
        NodeCommands::List { scope, all, json } => {
            let listings = store.nodes().list(scope.cluster_ref().as_ref(), !all)?;
            if json {
                utils::print_json(&listings)?;
            } else {
                utils::print_listings(EntityKind::Node, &listings);
            }
        }
        NodeCommands::Delete {
            name,
            cluster,
            repository,
            yes,
        } => {
            let name = normalize_name(EntityKind::Node, &name)?;
            let warning = format!("Node<'{}'> will be marked inactive", name);
            if utils::confirm(yes, &warning) {
                store
                    .nodes()
                    .delete(&name, &ClusterRef::new(cluster, repository))?;
                utils::success(EntityKind::Node, &name, "deleted");
            }
        }
        NodeCommands::Recover {
            name,
            cluster,
            repository,
        } => {
            let name = normalize_name(EntityKind::Node, &name)?;
            store
                .nodes()
                .recover(&name, &ClusterRef::new(cluster, repository))?;
            utils::success(EntityKind::Node, &name, "recovered");
        }
        NodeCommands::Flush { scope, yes } => {
            if utils::confirm(yes, "Inactive nodes will be removed permanently") {
                let count = store.nodes().flush(scope.cluster_ref().as_ref())?;
                utils::print_count("Flushed", count, EntityKind::Node);
            }
        }
        NodeCommands::PurgeAll { scope, yes } => {
            if utils::confirm(yes, "Every node will be removed permanently") {
                let count = store.nodes().purge_all(scope.cluster_ref().as_ref())?;
                utils::print_count("Purged", count, EntityKind::Node);
            }
        }
    }

    Ok(())
}
