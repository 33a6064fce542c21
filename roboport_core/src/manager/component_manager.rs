//! The component manager
//!
//! One [`Manager`] per process owns the factory registry, every hosted
//! instance, the execution contexts, the connections made by name and the
//! naming service. It is constructed explicitly and handed to collaborators
//! as an `Arc`; nothing here is global.

use super::factory::{ComponentFactory, FactoryRegistry};
use super::module::{ComponentModule, ModuleLoader};
use super::naming::NamingService;
use crate::communication::{
    Connection, ConnectionId, ConnectionPolicy, PortRef, PortSet, RemoteBinding, RemoteRequest,
    RemoteResponse,
};
use crate::config::DeploymentConfig;
use crate::core::{ComponentConfig, ComponentInstance, LifecycleState};
use crate::error::{RoboportError, RoboportResult};
use crate::scheduling::{ExecutionContext, TickPolicy};
use parking_lot::{Mutex, RwLock};
use roboport_types::records::RecordKind;
use roboport_types::{codec, SchemaError, SchemaId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SHUTDOWN_BUSY_RETRIES: u32 = 100;
const SHUTDOWN_BUSY_BACKOFF: Duration = Duration::from_millis(10);

/// Manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Host part of naming paths
    pub host_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
        }
    }
}

/// Liveness as reported to the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonHealth {
    Running,
    ShutDown,
}

#[derive(Default)]
struct Registry {
    by_name: HashMap<String, Arc<ComponentInstance>>,
    /// Creation order, for orderly teardown
    order: Vec<String>,
}

pub struct Manager {
    config: ManagerConfig,
    factories: FactoryRegistry,
    instances: RwLock<Registry>,
    contexts: RwLock<BTreeMap<String, Arc<ExecutionContext>>>,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    naming: NamingService,
    shut_down: AtomicBool,
    // Declared last: loaded libraries must outlive every component they created.
    modules: Mutex<ModuleLoader>,
}

fn validate_instance_name(name: &str) -> RoboportResult<()> {
    if name.is_empty() {
        return Err(RoboportError::invalid_input("instance name is empty"));
    }
    if name.contains(['.', '/']) || name.chars().any(char::is_whitespace) {
        return Err(RoboportError::invalid_input(format!(
            "instance name '{}' may not contain '.', '/' or whitespace",
            name
        )));
    }
    Ok(())
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        let naming = NamingService::new(&config.host_name);
        log::info!("Component manager up on host '{}'", config.host_name);
        Self {
            config,
            factories: FactoryRegistry::new(),
            instances: RwLock::new(Registry::default()),
            contexts: RwLock::new(BTreeMap::new()),
            connections: RwLock::new(HashMap::new()),
            naming,
            shut_down: AtomicBool::new(false),
            modules: Mutex::new(ModuleLoader::new()),
        }
    }

    /// Register `factories` and deploy everything `config` describes.
    ///
    /// Any failure tears down what was already deployed and is returned;
    /// the manager never reaches a serving state with a partial deployment.
    pub fn bootstrap(
        config: &DeploymentConfig,
        factories: Vec<(String, Arc<dyn ComponentFactory>)>,
    ) -> RoboportResult<Arc<Manager>> {
        config.validate()?;
        let manager = Arc::new(Manager::new(config.manager.clone()));

        if let Err(e) = manager.deploy(config, factories) {
            log::error!("Bootstrap failed: {}", e);
            manager.shutdown();
            return Err(e);
        }

        log::info!(
            "Bootstrap complete: {} instance(s), {} context(s), {} connection(s)",
            manager.instance_names().len(),
            manager.context_names().len(),
            manager.connections().len()
        );
        Ok(manager)
    }

    fn deploy(
        &self,
        config: &DeploymentConfig,
        factories: Vec<(String, Arc<dyn ComponentFactory>)>,
    ) -> RoboportResult<()> {
        for (type_name, factory) in factories {
            self.register_factory(&type_name, factory)?;
        }

        {
            let mut modules = self.modules.lock();
            for path in &config.modules.search_paths {
                modules.add_search_path(path);
            }
            if config.modules.default_paths {
                modules.add_default_search_paths();
            }
        }
        for id in &config.modules.preload {
            self.load_module(id)?;
        }

        for context in &config.contexts {
            let policy = match context.rate_hz {
                Some(hz) => TickPolicy::from_rate(hz)?,
                None => TickPolicy::Triggered,
            };
            self.create_context(&context.name, policy)?;
        }

        for entry in &config.instances {
            let instance =
                self.create_instance(&entry.type_name, &entry.name, entry.properties.clone())?;
            instance.bring_up()?;
            if let Some(context) = &entry.context {
                self.attach(context, &entry.name)?;
            }
        }

        for connection in &config.connections {
            self.connect(&connection.from, &connection.to, connection.policy)?;
        }

        for entry in config.instances.iter().filter(|i| i.activate) {
            self.activate(&entry.name)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn health(&self) -> DaemonHealth {
        if self.shut_down.load(Ordering::Acquire) {
            DaemonHealth::ShutDown
        } else {
            DaemonHealth::Running
        }
    }

    fn ensure_running(&self) -> RoboportResult<()> {
        match self.health() {
            DaemonHealth::Running => Ok(()),
            DaemonHealth::ShutDown => Err(RoboportError::invalid_input("manager is shut down")),
        }
    }

    pub fn naming(&self) -> &NamingService {
        &self.naming
    }

    // ---- factories and modules ----

    /// Make `type_name` creatable. Fails with `DuplicateType` if taken.
    pub fn register_factory(
        &self,
        type_name: &str,
        factory: Arc<dyn ComponentFactory>,
    ) -> RoboportResult<()> {
        self.factories.register(type_name, factory)
    }

    /// Registered component types, sorted
    pub fn factory_types(&self) -> Vec<String> {
        self.factories.types()
    }

    pub fn add_module_search_path(&self, path: impl AsRef<Path>) {
        self.modules.lock().add_search_path(path);
    }

    /// Make a compiled-in module available to [`Manager::load_module`]
    pub fn register_module(&self, module: Arc<dyn ComponentModule>) {
        self.modules.lock().register_static(module);
    }

    /// Load module `id` and register every factory it exports.
    ///
    /// Returns the module's component type names. Loading a module twice
    /// registers nothing the second time.
    pub fn load_module(&self, id: &str) -> RoboportResult<Vec<String>> {
        let mut modules = self.modules.lock();
        let already_loaded = modules.is_loaded(id);
        if !modules.is_discovered(id) {
            modules.discover();
        }
        let module = modules.load(id)?;
        drop(modules);

        let factories = module.factories();
        let types: Vec<String> = factories.iter().map(|(name, _)| name.clone()).collect();
        if !already_loaded {
            for (type_name, factory) in factories {
                self.register_factory(&type_name, factory)?;
            }
        }
        Ok(types)
    }

    // ---- instances ----

    /// Create a LOADED instance of `type_name` named `name`
    pub fn create_instance(
        &self,
        type_name: &str,
        name: &str,
        config: ComponentConfig,
    ) -> RoboportResult<Arc<ComponentInstance>> {
        self.ensure_running()?;
        let factory = self.factories.get(type_name)?;
        validate_instance_name(name)?;

        let mut registry = self.instances.write();
        if registry.by_name.contains_key(name) {
            return Err(RoboportError::DuplicateInstance(name.to_string()));
        }

        let mut ports = PortSet::new(name);
        let component = factory.create(&mut ports)?;
        let instance = Arc::new(ComponentInstance::new(
            name, type_name, component, ports, config,
        ));

        self.naming.bind(name, type_name)?;
        registry.by_name.insert(name.to_string(), instance.clone());
        registry.order.push(name.to_string());

        log::info!("Created '{}' ({})", name, type_name);
        Ok(instance)
    }

    /// Finalize and remove an instance.
    ///
    /// ACTIVE instances are deactivated first. Once the instance reaches
    /// EXITING it is detached from its context, its connections are gone and
    /// its name is free again, even if `on_finalize` failed (that failure is
    /// still returned). If it cannot reach EXITING (`Busy`), nothing is
    /// removed.
    pub fn destroy_instance(&self, name: &str) -> RoboportResult<()> {
        let instance = self.instance(name)?;

        let finalized = instance.finalize();
        if instance.state() != LifecycleState::Exiting {
            return finalized.map(|_| ());
        }

        if let Some(context) = instance.attached_context() {
            let context = self.contexts.read().get(&context).cloned();
            if let Some(context) = context {
                if let Err(e) = context.detach(name) {
                    log::warn!("{}: {}", name, e);
                }
            }
        }

        {
            let mut registry = self.instances.write();
            registry.by_name.remove(name);
            registry.order.retain(|n| n != name);
        }
        self.naming.unbind(name);
        self.connections.write().retain(|_, c| c.is_active());

        log::info!("Destroyed '{}'", name);
        finalized.map(|_| ())
    }

    /// Find a live instance; `NotFound` if absent
    pub fn lookup(&self, name: &str) -> RoboportResult<Arc<ComponentInstance>> {
        self.instances
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| RoboportError::NotFound(format!("instance '{}'", name)))
    }

    fn instance(&self, name: &str) -> RoboportResult<Arc<ComponentInstance>> {
        self.instances
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| RoboportError::UnknownInstance(name.to_string()))
    }

    /// Live instance names in creation order
    pub fn instance_names(&self) -> Vec<String> {
        self.instances.read().order.clone()
    }

    pub fn configure(&self, name: &str) -> RoboportResult<LifecycleState> {
        self.instance(name)?.configure()
    }

    pub fn activate(&self, name: &str) -> RoboportResult<LifecycleState> {
        self.instance(name)?.activate()
    }

    pub fn deactivate(&self, name: &str) -> RoboportResult<LifecycleState> {
        self.instance(name)?.deactivate()
    }

    pub fn reset(&self, name: &str) -> RoboportResult<LifecycleState> {
        self.instance(name)?.reset()
    }

    // ---- execution contexts ----

    /// Create and start a context
    pub fn create_context(
        &self,
        name: &str,
        policy: TickPolicy,
    ) -> RoboportResult<Arc<ExecutionContext>> {
        self.ensure_running()?;
        let mut contexts = self.contexts.write();
        if contexts.contains_key(name) {
            return Err(RoboportError::invalid_input(format!(
                "execution context '{}' already exists",
                name
            )));
        }

        let context = Arc::new(ExecutionContext::new(name, policy)?);
        context.start()?;
        contexts.insert(name.to_string(), context.clone());
        Ok(context)
    }

    pub fn context(&self, name: &str) -> RoboportResult<Arc<ExecutionContext>> {
        self.contexts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RoboportError::NotFound(format!("execution context '{}'", name)))
    }

    pub fn context_names(&self) -> Vec<String> {
        self.contexts.read().keys().cloned().collect()
    }

    pub fn attach(&self, context: &str, instance: &str) -> RoboportResult<()> {
        let context = self.context(context)?;
        context.attach(self.instance(instance)?)
    }

    pub fn detach(&self, context: &str, instance: &str) -> RoboportResult<()> {
        self.context(context)?.detach(instance).map(|_| ())
    }

    // ---- wiring ----

    /// Resolve a qualified port name `instance.port`
    pub fn port(&self, qualified: &str) -> RoboportResult<PortRef> {
        let (instance, port) = qualified.split_once('.').ok_or_else(|| {
            RoboportError::invalid_input(format!(
                "port name '{}' is not of the form instance.port",
                qualified
            ))
        })?;
        self.lookup(instance)?.port(port)
    }

    /// Connect two ports by qualified name; either may be the source
    pub fn connect(
        &self,
        port_a: &str,
        port_b: &str,
        policy: ConnectionPolicy,
    ) -> RoboportResult<ConnectionId> {
        let a = self.port(port_a)?;
        let b = self.port(port_b)?;
        let connection = a.connect(&b, policy)?;
        let id = connection.id();
        self.connections.write().insert(id, connection);
        Ok(id)
    }

    /// Remove a connection. Unknown or already removed ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        let removed = self.connections.write().remove(&id);
        if let Some(connection) = removed {
            connection.disconnect();
        }
    }

    pub fn connection(&self, id: ConnectionId) -> RoboportResult<Arc<Connection>> {
        self.connections
            .read()
            .get(&id)
            .filter(|c| c.is_active())
            .cloned()
            .ok_or_else(|| RoboportError::NotFound(format!("connection {}", id)))
    }

    /// Live connections; ones torn down from the far side are pruned
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        let mut connections = self.connections.write();
        connections.retain(|_, c| c.is_active());
        connections.values().cloned().collect()
    }

    /// Connect local source `outport` to `remote_inport` in the peer behind
    /// `binding`. Records written to `outport` are relayed through the
    /// binding.
    pub fn connect_remote(
        &self,
        outport: &str,
        binding: Arc<dyn RemoteBinding>,
        remote_inport: &str,
        policy: ConnectionPolicy,
    ) -> RoboportResult<ConnectionId> {
        let source = match self.port(outport)? {
            PortRef::Out(core) => core,
            PortRef::In(core) => {
                return Err(RoboportError::DirectionMismatch {
                    port_a: core.name().to_string(),
                    port_b: remote_inport.to_string(),
                    direction: "sink",
                })
            }
        };

        let schema = source.schema();
        let reply = binding.call(RemoteRequest::Connect {
            source: format!("{}/{}", self.config.host_name, source.name()),
            inport: remote_inport.to_string(),
            schema: schema.name.to_string(),
            version: schema.version,
            policy,
        })?;
        let peer = match reply {
            RemoteResponse::Connected { connection } => connection,
            other => {
                return Err(crate::roboport_internal!(
                    "unexpected reply to connect from {}: {:?}",
                    binding.peer(),
                    other
                ))
            }
        };

        let connection =
            Connection::establish_remote_source(&source, remote_inport, binding, peer, policy);
        let id = connection.id();
        self.connections.write().insert(id, connection);
        Ok(id)
    }

    /// Accept a source living in a peer process for the local sink `inport`
    pub fn accept_remote_source(
        &self,
        source: &str,
        inport: &str,
        schema: &str,
        version: u16,
        policy: ConnectionPolicy,
    ) -> RoboportResult<ConnectionId> {
        let kind = RecordKind::from_name(schema)
            .ok_or_else(|| SchemaError::UnknownSchema(schema.to_string()))?;
        let source_schema = SchemaId::new(kind.schema().name, version);

        let sink = match self.port(inport)? {
            PortRef::In(core) => core,
            PortRef::Out(core) => {
                return Err(RoboportError::DirectionMismatch {
                    port_a: source.to_string(),
                    port_b: core.name().to_string(),
                    direction: "source",
                })
            }
        };

        if sink.schema() != source_schema {
            return Err(RoboportError::SchemaMismatch {
                outport: source.to_string(),
                outport_schema: source_schema,
                inport: sink.name().to_string(),
                inport_schema: sink.schema(),
            });
        }

        let connection = Connection::establish_remote_sink(source, &sink, policy)?;
        let id = connection.id();
        self.connections.write().insert(id, connection);
        Ok(id)
    }

    /// Push an encoded record into connection `id`
    pub fn deliver(&self, id: ConnectionId, payload: &[u8]) -> RoboportResult<()> {
        let connection = self.connection(id)?;
        let record = codec::decode(payload, connection.schema())?;
        connection.deliver(record)
    }

    // ---- teardown ----

    /// Stop every context and destroy every instance, newest first.
    ///
    /// `on_finalize` runs exactly once per live instance. Calling this again
    /// does nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Shutting down component manager");

        let contexts: Vec<_> = self.contexts.read().values().cloned().collect();
        for context in &contexts {
            context.stop();
            context.detach_all();
        }

        let names: Vec<String> = self.instances.read().order.iter().rev().cloned().collect();
        for name in names {
            self.destroy_for_shutdown(&name);
        }

        let remaining: Vec<_> = self.connections.write().drain().map(|(_, c)| c).collect();
        for connection in remaining {
            connection.disconnect();
        }
        self.contexts.write().clear();
        log::info!("Component manager shut down");
    }

    fn destroy_for_shutdown(&self, name: &str) {
        for _ in 0..SHUTDOWN_BUSY_RETRIES {
            match self.destroy_instance(name) {
                Err(RoboportError::Busy { .. }) => std::thread::sleep(SHUTDOWN_BUSY_BACKOFF),
                Err(e) => {
                    log::warn!("Destroying '{}' during shutdown: {}", name, e);
                    return;
                }
                Ok(()) => return,
            }
        }
        log::error!("'{}' stayed busy through shutdown; abandoning it", name);
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("host", &self.config.host_name)
            .field("health", &self.health())
            .field("instances", &self.instance_names())
            .field("contexts", &self.context_names())
            .finish()
    }
}
