//! Hierarchical name → object directory.
//!
//! Replications carry a [`Context`] in which collaborators (statistics
//! observers, exporters, UIs) bind themselves by name — typically under
//! a `statistics/` sub-context. Contexts are shared (`Arc`) and
//! internally locked, so binding is safe from model actions and from
//! external threads alike. Entries keep insertion order.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::ContextError;

/// An object bound in a context.
pub type ContextObject = Arc<dyn Any + Send + Sync>;

enum Entry {
    Object(ContextObject),
    Sub(Arc<Context>),
}

/// One level of the naming directory.
pub struct Context {
    name: String,
    entries: Mutex<IndexMap<String, Entry>>,
}

// A panicked binder must not wedge the directory for everyone else.
fn entries_of(context: &Context) -> MutexGuard<'_, IndexMap<String, Entry>> {
    context
        .entries
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn validate_name(name: &str) -> Result<(), ContextError> {
    if name.is_empty() || name.contains('/') {
        return Err(ContextError::InvalidName { name: name.into() });
    }
    Ok(())
}

impl Context {
    /// Create a root context.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            entries: Mutex::new(IndexMap::new()),
        })
    }

    /// The name of this context level; empty for a root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `path` (components separated by `/`) to a sub-context,
    /// creating any missing levels.
    ///
    /// Fails with [`ContextError::NotAContext`] when a component is
    /// already bound to a plain object, and with
    /// [`ContextError::InvalidName`] on empty components.
    pub fn lookup_or_create_sub_context(
        self: &Arc<Self>,
        path: &str,
    ) -> Result<Arc<Context>, ContextError> {
        let components: SmallVec<[&str; 4]> = path.split('/').collect();
        let mut current = Arc::clone(self);
        for component in components {
            validate_name(component)?;
            let next = {
                let mut entries = entries_of(&current);
                match entries.get(component) {
                    Some(Entry::Sub(sub)) => Arc::clone(sub),
                    Some(Entry::Object(_)) => {
                        return Err(ContextError::NotAContext {
                            name: component.into(),
                        })
                    }
                    None => {
                        let sub = Arc::new(Context {
                            name: component.to_string(),
                            entries: Mutex::new(IndexMap::new()),
                        });
                        entries.insert(component.to_string(), Entry::Sub(Arc::clone(&sub)));
                        sub
                    }
                }
            };
            current = next;
        }
        Ok(current)
    }

    /// Bind `object` under `name` in this context.
    ///
    /// Fails with [`ContextError::AlreadyBound`] when the name is taken
    /// (by an object or a sub-context).
    pub fn bind(&self, name: &str, object: ContextObject) -> Result<(), ContextError> {
        validate_name(name)?;
        let mut entries = entries_of(self);
        if entries.contains_key(name) {
            return Err(ContextError::AlreadyBound { name: name.into() });
        }
        entries.insert(name.to_string(), Entry::Object(object));
        Ok(())
    }

    /// Remove the object bound under `name`. Returns true iff something
    /// was bound. Sub-contexts are not unbindable through this method.
    pub fn unbind(&self, name: &str) -> bool {
        let mut entries = entries_of(self);
        match entries.get(name) {
            Some(Entry::Object(_)) => entries.shift_remove(name).is_some(),
            _ => false,
        }
    }

    /// Look up the object bound under `name`.
    pub fn lookup(&self, name: &str) -> Option<ContextObject> {
        match entries_of(self).get(name) {
            Some(Entry::Object(object)) => Some(Arc::clone(object)),
            _ => None,
        }
    }

    /// Look up an existing sub-context without creating it.
    pub fn sub_context(&self, name: &str) -> Option<Arc<Context>> {
        match entries_of(self).get(name) {
            Some(Entry::Sub(sub)) => Some(Arc::clone(sub)),
            _ => None,
        }
    }

    /// The names bound at this level, in insertion order.
    pub fn bound_names(&self) -> Vec<String> {
        entries_of(self).keys().cloned().collect()
    }

    /// Number of entries (objects and sub-contexts) at this level.
    pub fn len(&self) -> usize {
        entries_of(self).len()
    }

    /// True when nothing is bound at this level.
    pub fn is_empty(&self) -> bool {
        entries_of(self).is_empty()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("entries", &self.bound_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: u32) -> ContextObject {
        Arc::new(value)
    }

    #[test]
    fn bind_and_lookup() {
        let root = Context::root();
        root.bind("queue length", object(7)).unwrap();

        let found = root.lookup("queue length").unwrap();
        assert_eq!(*found.downcast::<u32>().unwrap(), 7);
        assert!(root.lookup("missing").is_none());
    }

    #[test]
    fn double_bind_fails() {
        let root = Context::root();
        root.bind("x", object(1)).unwrap();
        assert_eq!(
            root.bind("x", object(2)),
            Err(ContextError::AlreadyBound { name: "x".into() })
        );
    }

    #[test]
    fn sub_context_creation_is_idempotent() {
        let root = Context::root();
        let a = root.lookup_or_create_sub_context("statistics").unwrap();
        let b = root.lookup_or_create_sub_context("statistics").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "statistics");
    }

    #[test]
    fn nested_paths_create_each_level() {
        let root = Context::root();
        let deep = root.lookup_or_create_sub_context("a/b/c").unwrap();
        assert_eq!(deep.name(), "c");
        let b = root
            .sub_context("a")
            .and_then(|a| a.sub_context("b"))
            .unwrap();
        assert!(b.sub_context("c").is_some());
    }

    #[test]
    fn object_entry_blocks_sub_context() {
        let root = Context::root();
        root.bind("stats", object(0)).unwrap();
        assert_eq!(
            root.lookup_or_create_sub_context("stats"),
            Err(ContextError::NotAContext {
                name: "stats".into()
            })
        );
    }

    #[test]
    fn invalid_names_rejected() {
        let root = Context::root();
        assert!(matches!(
            root.bind("", object(0)),
            Err(ContextError::InvalidName { .. })
        ));
        assert!(matches!(
            root.bind("a/b", object(0)),
            Err(ContextError::InvalidName { .. })
        ));
        assert!(matches!(
            root.lookup_or_create_sub_context("a//b"),
            Err(ContextError::InvalidName { .. })
        ));
    }

    #[test]
    fn unbind_removes_objects_only() {
        let root = Context::root();
        root.bind("x", object(1)).unwrap();
        root.lookup_or_create_sub_context("sub").unwrap();

        assert!(root.unbind("x"));
        assert!(!root.unbind("x"));
        assert!(!root.unbind("sub"));
        assert!(root.sub_context("sub").is_some());
    }

    #[test]
    fn bound_names_keep_insertion_order() {
        let root = Context::root();
        root.bind("c", object(1)).unwrap();
        root.bind("a", object(2)).unwrap();
        root.bind("b", object(3)).unwrap();
        assert_eq!(root.bound_names(), vec!["c", "a", "b"]);
    }
}
