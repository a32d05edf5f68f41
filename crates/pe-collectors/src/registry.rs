//! The `Collector` contract and an explicit, builder-constructed registry
//! (§4.2, §9 Design Notes "Global mutable state"). Unlike a process-wide
//! static registry, a `CollectorRegistry` is built once in the scheduling
//! binaries and handed to the orchestrator by reference — two tests can
//! build two different registries without fighting over shared state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use pe_core::model::{CollectionResult, EntityType, Source};

use crate::CollectArgs;

#[async_trait]
pub trait Collector: Send + Sync {
    fn source_type(&self) -> Source;
    fn entity_type(&self) -> EntityType;
    async fn collect(&self, args: &CollectArgs) -> CollectionResult;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a collector is already registered for {0:?}")]
    DuplicateSource(Source),
}

impl From<RegistryError> for pe_core::error::AppError {
    fn from(err: RegistryError) -> Self {
        pe_core::error::AppError::config(err.to_string())
    }
}

pub struct CollectorRegistry {
    collectors: HashMap<Source, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn builder() -> CollectorRegistryBuilder {
        CollectorRegistryBuilder::default()
    }

    pub fn get(&self, source: Source) -> Option<&Arc<dyn Collector>> {
        self.collectors.get(&source)
    }
}

#[derive(Default)]
pub struct CollectorRegistryBuilder {
    collectors: HashMap<Source, Arc<dyn Collector>>,
}

impl CollectorRegistryBuilder {
    pub fn register(mut self, collector: Arc<dyn Collector>) -> Result<Self, RegistryError> {
        let source = collector.source_type();
        if self.collectors.contains_key(&source) {
            return Err(RegistryError::DuplicateSource(source));
        }
        self.collectors.insert(source, collector);
        Ok(self)
    }

    pub fn build(self) -> CollectorRegistry {
        CollectorRegistry {
            collectors: self.collectors,
        }
    }
}
