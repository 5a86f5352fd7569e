use crate::detector::network::{GroundingNetwork, Location, MemoryPolicy, NetworkLoader};
use crate::error::Result;
use crate::model::ModelDescriptor;

struct CachedModel {
    key: String,
    network: Box<dyn GroundingNetwork>,
}

/// Holds at most one loaded network at a time. Loading a different model
/// drops the resident one first, so accelerator usage stays bounded to a
/// single model's footprint.
#[derive(Default)]
pub struct ModelCache {
    slot: Option<CachedModel>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Return the network for `descriptor`, constructing it on a miss.
    /// Errors while constructing leave the cache empty rather than holding
    /// a half-built entry.
    pub fn load(
        &mut self,
        descriptor: &ModelDescriptor,
        loader: &dyn NetworkLoader,
        policy: MemoryPolicy,
    ) -> Result<&mut dyn GroundingNetwork> {
        match &mut self.slot {
            Some(cached) if cached.key == descriptor.name => {
                if policy.offload_when_idle() {
                    // The previous pass may have parked it in host memory.
                    cached.network.move_to(Location::Accelerator)?;
                }
                Ok(cached.network.as_mut())
            }
            slot => {
                if let Some(evicted) = slot.take() {
                    tracing::debug!("Evicting cached model {}", evicted.key);
                }
                tracing::info!("Initializing detection model {}", descriptor.name);
                let mut network = loader.load(descriptor)?;
                network.move_to(Location::Accelerator)?;
                let cached = slot.insert(CachedModel {
                    key: descriptor.name.to_string(),
                    network,
                });
                Ok(cached.network.as_mut())
            }
        }
    }

    /// Drop the resident network, if any, releasing its resources.
    pub fn clear(&mut self) {
        if let Some(cached) = self.slot.take() {
            tracing::debug!("Clearing cached model {}", cached.key);
        }
    }

    pub fn cached_key(&self) -> Option<&str> {
        self.slot.as_ref().map(|cached| cached.key.as_str())
    }

    pub fn len(&self) -> usize {
        usize::from(self.slot.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
