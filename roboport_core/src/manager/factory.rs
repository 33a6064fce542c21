//! Component factories and the type registry

use crate::communication::PortSet;
use crate::core::component::Component;
use crate::error::{RoboportError, RoboportResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates components of one type.
///
/// The factory declares the instance's ports on `ports` and returns the
/// component holding whichever typed handles it needs.
///
/// Closures `Fn(&mut PortSet) -> RoboportResult<Box<dyn Component>>`
/// implement this trait; [`factory_fn`] wraps one:
///
/// ```ignore
/// manager.register_factory("RangeSensor", factory_fn(|ports| {
///     let out = ports.add_outport::<RangeData>("range")?;
///     Ok(Box::new(RangeSensor { out }))
/// }))?;
/// ```
pub trait ComponentFactory: Send + Sync {
    fn create(&self, ports: &mut PortSet) -> RoboportResult<Box<dyn Component>>;
}

impl<F> ComponentFactory for F
where
    F: Fn(&mut PortSet) -> RoboportResult<Box<dyn Component>> + Send + Sync,
{
    fn create(&self, ports: &mut PortSet) -> RoboportResult<Box<dyn Component>> {
        self(ports)
    }
}

/// Wrap a closure as a shared factory
pub fn factory_fn<F>(f: F) -> Arc<dyn ComponentFactory>
where
    F: Fn(&mut PortSet) -> RoboportResult<Box<dyn Component>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Type name -> factory
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<BTreeMap<String, Arc<dyn ComponentFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        type_name: &str,
        factory: Arc<dyn ComponentFactory>,
    ) -> RoboportResult<()> {
        if type_name.is_empty() {
            return Err(RoboportError::invalid_input("component type name is empty"));
        }

        let mut factories = self.factories.write();
        if factories.contains_key(type_name) {
            return Err(RoboportError::DuplicateType(type_name.to_string()));
        }
        factories.insert(type_name.to_string(), factory);
        log::info!("Registered component type '{}'", type_name);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> RoboportResult<Arc<dyn ComponentFactory>> {
        self.factories
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| RoboportError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.read().contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
