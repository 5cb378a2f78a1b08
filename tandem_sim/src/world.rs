//! SimWorld - the resources and data sources a simulation run walks over.

use crate::provider::{BUCKET_KIND, IMAGE_KIND, INSTANCE_KIND};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tandem_env::{InstanceInfo, ResourceConfig};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of managed resources
    pub num_resources: usize,

    /// Number of data-source reads
    pub num_data_sources: usize,

    /// Concurrent lanes per walk
    pub lanes: usize,

    /// How long the real walk waits before starting
    pub real_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_resources: 6,
            num_data_sources: 0,
            lanes: 1,
            real_delay: Duration::ZERO,
        }
    }
}

/// A managed resource the walk diffs, applies and refreshes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub info: InstanceInfo,
    pub config: ResourceConfig,

    /// Whether the walk imports the resource after refreshing it
    pub import: bool,
}

/// A data source the walk reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceSpec {
    pub info: InstanceInfo,
    pub config: ResourceConfig,
}

/// The SimWorld - deterministic set of objects for one run.
#[derive(Debug, Clone)]
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Managed resources, in creation order
    pub resources: Vec<ResourceSpec>,

    /// Data sources, in creation order
    pub data_sources: Vec<DataSourceSpec>,
}

impl SimWorld {
    /// Builds the world described by `config`.
    pub fn new(config: SimConfig) -> Self {
        // Separate stream from the id and ordering seeds
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_mul(0x517cc1b727220a95));

        let resources = (0..config.num_resources)
            .map(|i| resource_spec(i, &mut rng))
            .collect();
        let data_sources = (0..config.num_data_sources)
            .map(|j| data_source_spec(j, &mut rng))
            .collect();

        Self {
            config,
            resources,
            data_sources,
        }
    }

    /// Returns the spec of a resource no real walk ever touches.
    pub fn orphan() -> ResourceSpec {
        ResourceSpec {
            info: InstanceInfo::new(INSTANCE_KIND, format!("{}.orphan", INSTANCE_KIND)),
            config: ResourceConfig::new().with("name", "orphan"),
            import: false,
        }
    }
}

fn resource_spec(i: usize, rng: &mut ChaCha8Rng) -> ResourceSpec {
    let kind = if i % 3 == 2 { BUCKET_KIND } else { INSTANCE_KIND };
    let mut info = InstanceInfo::new(kind, format!("{}.r{}", kind, i));
    // Every fourth resource lives in a nested module
    if i % 4 == 3 {
        info = info.in_module(["app", "net"]);
    }

    let mut config = ResourceConfig::new().with("name", format!("r{}", i));
    if kind == INSTANCE_KIND {
        const SIZES: [&str; 3] = ["small", "medium", "large"];
        if rng.gen_bool(0.7) {
            config.set("size", SIZES[rng.gen_range(0..SIZES.len())]);
        }
    } else if rng.gen_bool(0.5) {
        config.set("versioning", true);
    }

    ResourceSpec {
        info,
        config,
        import: kind == INSTANCE_KIND && i % 3 == 0,
    }
}

fn data_source_spec(j: usize, rng: &mut ChaCha8Rng) -> DataSourceSpec {
    let mut config = ResourceConfig::new().with("name", format!("image-{}", j));
    if rng.gen_bool(0.5) {
        config.set("filter", format!("family=base-{}", rng.gen_range(0..4)));
    }
    DataSourceSpec {
        info: InstanceInfo::new(IMAGE_KIND, format!("data.{}.d{}", IMAGE_KIND, j)),
        config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_world_is_deterministic() {
        let a = SimWorld::new(SimConfig::default());
        let b = SimWorld::new(SimConfig::default());
        assert_eq!(a.resources, b.resources);
    }

    #[test]
    fn test_human_ids_are_unique() {
        let world = SimWorld::new(SimConfig {
            num_resources: 40,
            num_data_sources: 8,
            ..SimConfig::default()
        });

        let ids: HashSet<_> = world
            .resources
            .iter()
            .map(|r| r.info.human_id())
            .chain(world.data_sources.iter().map(|d| d.info.human_id()))
            .collect();
        assert_eq!(ids.len(), 48);
        assert!(ids.contains("module.app.net.mock_instance.r3"));
        assert!(!ids.contains(&SimWorld::orphan().info.human_id()));
    }

    #[test]
    fn test_only_instances_are_imported() {
        let world = SimWorld::new(SimConfig {
            num_resources: 12,
            ..SimConfig::default()
        });
        for r in &world.resources {
            if r.import {
                assert_eq!(r.info.resource_type, INSTANCE_KIND);
            }
            assert!(r.config.get_str("name").is_some());
        }
        assert!(world.resources.iter().any(|r| r.import));
    }
}
