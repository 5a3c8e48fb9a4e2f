//! Bootstrap: first-start checks and hook selection.

use std::sync::Arc;

use mrp::service::{LogNotifier, NotifyOnComplete, OrderHook, ReserveOnConfirm};

use crate::config::{MrpConfig, ServerConfig};

/// Refuse to start on a config that cannot work.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.server.listen.is_empty() {
        anyhow::bail!("Server listen address is empty in configuration.");
    }
    Ok(())
}

/// Order hooks enabled by the `[mrp]` section, in run order.
pub fn order_hooks(config: &MrpConfig) -> Vec<Arc<dyn OrderHook>> {
    let mut hooks: Vec<Arc<dyn OrderHook>> = Vec::new();
    if config.reserve_on_confirm {
        hooks.push(Arc::new(ReserveOnConfirm));
    }
    if config.notify_on_complete {
        hooks.push(Arc::new(NotifyOnComplete::new(Arc::new(LogNotifier))));
    }
    hooks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListenConfig, StorageConfig};

    fn config(data_dir: &str) -> ServerConfig {
        ServerConfig {
            storage: StorageConfig {
                data_dir: data_dir.to_string(),
                sqlite_path: None,
            },
            server: ListenConfig::default(),
            mrp: MrpConfig::default(),
        }
    }

    #[test]
    fn test_verify_config_empty_data_dir() {
        assert!(verify_config(&config("")).is_err());
        assert!(verify_config(&config("/tmp")).is_ok());
    }

    #[test]
    fn test_order_hooks_follow_switches() {
        let all = order_hooks(&MrpConfig::default());
        let names: Vec<_> = all.iter().map(|h| h.name().to_string()).collect();
        assert_eq!(names, ["reserve_components", "notify_creator"]);

        let none = order_hooks(&MrpConfig {
            reserve_on_confirm: false,
            notify_on_complete: false,
        });
        assert!(none.is_empty());
    }
}
