#![forbid(unsafe_code)]

//! Definition registry.
//!
//! [`Registry::define`] binds an element name to a descriptor map, producing
//! one [`ComponentClass`] per name. A registry is tied to one [`Document`]
//! and owns the [`InstanceCache`] its classes share.
//!
//! # Invariants
//!
//! 1. A name maps to at most one class for the lifetime of the registry.
//! 2. Defining a name again with the same map handle returns the existing
//!    class without recompiling.
//! 3. In development mode a different map recompiles the existing class in
//!    place and queues its live instances for reconciliation; in production
//!    mode it fails with [`Error::DuplicateDefinition`].
//! 4. Compilation finishes before anything is registered or replaced, so a
//!    malformed map leaves the registry unchanged.
//!
//! # Failure Modes
//!
//! - With the `production` feature the reconciler is not compiled in and a
//!   new map for a defined name always fails with
//!   [`Error::DuplicateDefinition`], whatever the configured mode.
//! - A name taken by a definition that is not one of this registry's classes
//!   fails with [`Error::DuplicateDefinition`] in every mode.
//! - Errors raised while upgrading already-present elements are returned, but
//!   the class stays registered.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;
use trellis_core::{Document, ElementDefinition, Error, Node, Result};

use crate::cache::InstanceCache;
use crate::compile::compile;
use crate::component::ComponentClass;
use crate::config::RuntimeConfig;
use crate::descriptor::DescriptorMap;
#[cfg(not(feature = "production"))]
use crate::reconcile::UpdateReconciler;

pub struct Registry {
    document: Document,
    config: RuntimeConfig,
    cache: Rc<InstanceCache>,
    classes: RefCell<AHashMap<Rc<str>, Rc<ComponentClass>>>,
    #[cfg(not(feature = "production"))]
    reconciler: Option<Rc<UpdateReconciler>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let classes = self.classes.borrow();
        let mut names: Vec<&str> = classes.keys().map(|k| &**k).collect();
        names.sort_unstable();
        f.debug_struct("Registry")
            .field("mode", &self.config.mode)
            .field("classes", &names)
            .finish()
    }
}

impl Registry {
    #[must_use]
    pub fn new(document: &Document, mut config: RuntimeConfig) -> Self {
        config.mode = config.mode.permitted();
        debug!(mode = %config.mode, "registry created");
        Self {
            document: document.clone(),
            cache: Rc::new(InstanceCache::new()),
            classes: RefCell::new(AHashMap::new()),
            #[cfg(not(feature = "production"))]
            reconciler: config
                .mode
                .allows_redefinition()
                .then(|| UpdateReconciler::new(document)),
            config,
        }
    }

    /// Registry configured from the build and `TRELLIS_MODE`.
    #[must_use]
    pub fn from_env(document: &Document) -> Self {
        Self::new(document, RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Rc<InstanceCache> {
        &self.cache
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<ComponentClass>> {
        self.classes.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }

    /// Bind `name` to `descriptors`; see the module docs for the rules.
    pub fn define(&self, name: &str, descriptors: &DescriptorMap) -> Result<Rc<ComponentClass>> {
        if self.document.registry().contains(name) {
            return self.redefine(name, descriptors);
        }

        trellis_core::registry::validate_name(name)?;
        let compiled = compile(&self.cache, descriptors)?;
        let class = Rc::new(ComponentClass::new(
            name,
            Rc::clone(&self.cache),
            compiled,
            self.config.mode.allows_redefinition(),
        ));
        let definition = Rc::clone(&class) as Rc<dyn ElementDefinition>;
        self.document.registry().define(name, definition)?;
        self.classes
            .borrow_mut()
            .insert(Rc::from(name), Rc::clone(&class));
        debug!(name, properties = descriptors.len(), "component defined");

        self.document.upgrade(name)?;
        Ok(class)
    }

    /// Create an element; registered names come back as live instances.
    pub fn create(&self, name: &str) -> Result<Node> {
        self.document.create_element(name)
    }

    /// Redefinitions waiting for the next microtask checkpoint.
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        #[cfg(not(feature = "production"))]
        if let Some(reconciler) = &self.reconciler {
            return reconciler.pending();
        }
        0
    }

    /// Reconciliation batches completed so far.
    #[must_use]
    pub fn reconciled_batches(&self) -> u64 {
        #[cfg(not(feature = "production"))]
        if let Some(reconciler) = &self.reconciler {
            return reconciler.batches();
        }
        0
    }

    /// Run the document's pending microtasks, reconciliation included.
    pub fn flush(&self) -> Result<usize> {
        self.document.perform_microtask_checkpoint()
    }

    fn redefine(&self, name: &str, descriptors: &DescriptorMap) -> Result<Rc<ComponentClass>> {
        let class = self.get(name).ok_or_else(|| duplicate(name))?;
        if class.descriptors().ptr_eq(descriptors) {
            return Ok(class);
        }
        self.replace(class, name, descriptors)
    }

    #[cfg(not(feature = "production"))]
    fn replace(
        &self,
        class: Rc<ComponentClass>,
        name: &str,
        descriptors: &DescriptorMap,
    ) -> Result<Rc<ComponentClass>> {
        let Some(reconciler) = &self.reconciler else {
            return Err(duplicate(name));
        };
        let compiled = compile(&self.cache, descriptors)?;
        let previous = class.recompile(compiled)?;
        debug!(name, properties = descriptors.len(), "component redefined");
        reconciler.enqueue(&class, previous);
        Ok(class)
    }

    #[cfg(feature = "production")]
    fn replace(
        &self,
        _class: Rc<ComponentClass>,
        name: &str,
        _descriptors: &DescriptorMap,
    ) -> Result<Rc<ComponentClass>> {
        Err(duplicate(name))
    }
}

fn duplicate(name: &str) -> Error {
    Error::DuplicateDefinition {
        name: name.to_owned(),
    }
}
