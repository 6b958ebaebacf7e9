use stevedore_core::codes::ProcessType;

/// Per-family worker pool settings.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of long-lived dispatch workers for the family.
    pub workers: usize,
    /// Whether the family's pool is started at all.
    pub enabled: bool,
}

/// Engine configuration loaded from environment variables.
///
/// Each job family gets an independently sized worker pool so that, for
/// example, migration throughput is never starved by a burst of scans.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scan: PoolConfig,
    pub migration: PoolConfig,
    pub prerequisite: PoolConfig,
    pub monitoring: PoolConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `SCAN_WORKERS`            | `4`     |
    /// | `MIGRATION_WORKERS`       | `2`     |
    /// | `PREREQUISITE_WORKERS`    | `2`     |
    /// | `MONITORING_WORKERS`      | `2`     |
    /// | `SCAN_ENABLED`            | `true`  |
    /// | `MIGRATION_ENABLED`       | `true`  |
    /// | `PREREQUISITE_ENABLED`    | `true`  |
    /// | `MONITORING_ENABLED`      | `true`  |
    pub fn from_env() -> Self {
        Self {
            scan: PoolConfig {
                workers: env_usize("SCAN_WORKERS", 4),
                enabled: env_bool("SCAN_ENABLED", true),
            },
            migration: PoolConfig {
                workers: env_usize("MIGRATION_WORKERS", 2),
                enabled: env_bool("MIGRATION_ENABLED", true),
            },
            prerequisite: PoolConfig {
                workers: env_usize("PREREQUISITE_WORKERS", 2),
                enabled: env_bool("PREREQUISITE_ENABLED", true),
            },
            monitoring: PoolConfig {
                workers: env_usize("MONITORING_WORKERS", 2),
                enabled: env_bool("MONITORING_ENABLED", true),
            },
        }
    }

    pub fn pool(&self, family: ProcessType) -> PoolConfig {
        match family {
            ProcessType::Scan => self.scan,
            ProcessType::Migration => self.migration,
            ProcessType::Prerequisite => self.prerequisite,
            ProcessType::Monitoring => self.monitoring,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pool = |workers| PoolConfig {
            workers,
            enabled: true,
        };
        Self {
            scan: pool(4),
            migration: pool(2),
            prerequisite: pool(2),
            monitoring: pool(2),
        }
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid usize")),
        Err(_) => default,
    }
}

fn env_bool(var: &str, default: bool) -> bool {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be true or false")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_all_families() {
        let config = EngineConfig::default();
        for family in [
            ProcessType::Scan,
            ProcessType::Migration,
            ProcessType::Prerequisite,
            ProcessType::Monitoring,
        ] {
            let pool = config.pool(family);
            assert!(pool.enabled);
            assert!(pool.workers >= 1);
        }
    }
}
