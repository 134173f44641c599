//! # Component Registry Module
//!
//! An explicitly wired dependency-injection registry: each component type
//! registers a constructor with its declared dependencies, the builder
//! topologically orders the graph, and construction happens once at
//! startup, dependency-first. There is no runtime scanning and no hidden
//! global state - the registry is an ordinary value the process owns and
//! passes down.
//!
//! ## Rules
//!
//! - Exactly one instance per registered type; `get` returns the same
//!   `Arc` on every call.
//! - Registering multiple constructors for one type keeps the one with
//!   the most declared dependencies (a warning is logged).
//! - A dependency on an unregistered type, a dependency cycle, or a
//!   constructor error is fatal to `build`, naming the culprit.
//! - `destroy_all` runs teardown hooks in reverse construction order,
//!   logging and swallowing individual failures.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

type AnyComponent = Arc<dyn Any + Send + Sync>;
type BuildFn = Box<dyn Fn(&ComponentRegistry) -> anyhow::Result<AnyComponent> + Send + Sync>;
type TeardownFn = Box<dyn Fn(&AnyComponent) -> anyhow::Result<()> + Send + Sync>;

/// A declared dependency edge: the type and its human-readable name
/// (used in fatal startup errors).
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    type_id: TypeId,
    name: &'static str,
}

impl Dependency {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// A registered way of constructing a component of type `T`.
pub struct Constructor<T: Send + Sync + 'static> {
    deps: Vec<Dependency>,
    build: Box<dyn Fn(&ComponentRegistry) -> anyhow::Result<T> + Send + Sync>,
    teardown: Option<Box<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    pub fn new(
        build: impl Fn(&ComponentRegistry) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            deps: Vec::new(),
            build: Box::new(build),
            teardown: None,
        }
    }

    /// Declare a dependency on another registered component type.
    ///
    /// Declared dependencies drive construction order and are validated at
    /// build time; the build closure reads them with
    /// [`ComponentRegistry::expect`].
    pub fn depends_on<D: 'static>(mut self) -> Self {
        self.deps.push(Dependency::of::<D>());
        self
    }

    /// Attach a teardown hook, run during `destroy_all`.
    pub fn teardown(
        mut self,
        teardown: impl Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }

    fn erase(self) -> ComponentDef {
        let build = self.build;
        let teardown = self.teardown.map(|f| -> TeardownFn {
            Box::new(move |component: &AnyComponent| match component.clone().downcast::<T>() {
                Ok(typed) => f(&typed),
                Err(_) => Ok(()),
            })
        });
        ComponentDef {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            deps: self.deps,
            build: Box::new(move |registry| {
                build(registry).map(|value| Arc::new(value) as AnyComponent)
            }),
            teardown,
        }
    }
}

struct ComponentDef {
    type_id: TypeId,
    type_name: &'static str,
    deps: Vec<Dependency>,
    build: BuildFn,
    teardown: Option<TeardownFn>,
}

/// The built object graph: one singleton instance per registered type.
pub struct ComponentRegistry {
    components: HashMap<TypeId, AnyComponent>,
    names: HashMap<TypeId, &'static str>,
    teardowns: HashMap<TypeId, TeardownFn>,
    order: Vec<TypeId>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names.values().collect::<Vec<_>>())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    /// The singleton instance for `T`, if registered. Every call returns
    /// the same `Arc`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|component| component.clone().downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), but a missing component is an error naming
    /// the type - the form constructors use for their dependencies.
    pub fn expect<T: Send + Sync + 'static>(&self) -> anyhow::Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!("no component registered for type {}", type_name::<T>())
        })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Construction order, as human-readable type names. Useful for
    /// startup diagnostics and tests.
    pub fn construction_order(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|id| self.names.get(id).copied())
            .collect()
    }

    /// Best-effort shutdown: run teardown hooks in reverse construction
    /// order, logging and swallowing individual failures, then drop every
    /// instance.
    pub fn destroy_all(&mut self) {
        for type_id in self.order.iter().rev() {
            let (Some(teardown), Some(component)) =
                (self.teardowns.get(type_id), self.components.get(type_id))
            else {
                continue;
            };
            let name = self.names.get(type_id).copied().unwrap_or("<unknown>");
            if let Err(err) = teardown(component) {
                warn!(
                    component = name,
                    error = %err,
                    "Component teardown failed - continuing shutdown"
                );
            }
        }
        self.components.clear();
        self.teardowns.clear();
        self.order.clear();
    }
}

/// Collects constructors, then builds the graph dependency-first.
pub struct ComponentRegistryBuilder {
    defs: Vec<ComponentDef>,
}

impl ComponentRegistryBuilder {
    pub fn new() -> Self {
        Self { defs: Vec::new() }
    }

    /// Register a constructor for a component type.
    pub fn component<T: Send + Sync + 'static>(mut self, constructor: Constructor<T>) -> Self {
        self.defs.push(constructor.erase());
        self
    }

    /// Build the graph.
    ///
    /// Fatal errors: a dependency on an unregistered type (named), a
    /// dependency cycle (named), or a constructor returning `Err`.
    pub fn build(self) -> anyhow::Result<ComponentRegistry> {
        // Constructor selection: most declared dependencies wins.
        let mut selected: HashMap<TypeId, ComponentDef> = HashMap::new();
        let mut declaration_order: Vec<TypeId> = Vec::new();
        for def in self.defs {
            match selected.get(&def.type_id) {
                None => {
                    declaration_order.push(def.type_id);
                    selected.insert(def.type_id, def);
                }
                Some(existing) => {
                    warn!(
                        component = def.type_name,
                        kept_deps = existing.deps.len().max(def.deps.len()),
                        "Multiple constructors registered - keeping the one with the most dependencies"
                    );
                    if def.deps.len() > existing.deps.len() {
                        selected.insert(def.type_id, def);
                    }
                }
            }
        }

        for def in selected.values() {
            for dep in &def.deps {
                if !selected.contains_key(&dep.type_id) {
                    anyhow::bail!(
                        "component {} depends on unregistered component {}",
                        def.type_name,
                        dep.name
                    );
                }
            }
        }

        let mut topo_order: Vec<TypeId> = Vec::with_capacity(selected.len());
        let mut visit_state: HashMap<TypeId, VisitState> = HashMap::new();
        for type_id in &declaration_order {
            visit(*type_id, &selected, &mut visit_state, &mut topo_order)?;
        }

        let mut registry = ComponentRegistry {
            components: HashMap::new(),
            names: HashMap::new(),
            teardowns: HashMap::new(),
            order: Vec::with_capacity(topo_order.len()),
        };
        for type_id in topo_order {
            let Some(def) = selected.remove(&type_id) else {
                continue;
            };
            let component = (def.build)(&registry)
                .map_err(|err| err.context(format!("failed to construct component {}", def.type_name)))?;
            info!(
                component = def.type_name,
                dependencies = def.deps.len(),
                "Component constructed"
            );
            registry.components.insert(type_id, component);
            registry.names.insert(type_id, def.type_name);
            if let Some(teardown) = def.teardown {
                registry.teardowns.insert(type_id, teardown);
            }
            registry.order.push(type_id);
        }
        Ok(registry)
    }
}

impl Default for ComponentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Visiting,
    Done,
}

fn visit(
    type_id: TypeId,
    defs: &HashMap<TypeId, ComponentDef>,
    state: &mut HashMap<TypeId, VisitState>,
    out: &mut Vec<TypeId>,
) -> anyhow::Result<()> {
    let Some(def) = defs.get(&type_id) else {
        return Ok(());
    };
    match state.get(&type_id) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::Visiting) => {
            anyhow::bail!("dependency cycle involving component {}", def.type_name);
        }
        None => {}
    }
    state.insert(type_id, VisitState::Visiting);
    for dep in &def.deps {
        visit(dep.type_id, defs, state, out)?;
    }
    state.insert(type_id, VisitState::Done);
    out.push(type_id);
    Ok(())
}
