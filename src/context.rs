//! Type-indexed service environment.
//!
//! A [`Context`] maps service slots to service values. Slots are named by
//! [`Tag`]s: small value objects carrying a stable string key and the service
//! type as a phantom parameter. Contexts are immutable — [`Context::add`] and
//! [`Context::merge`] return new contexts, and services are shared behind
//! `Arc`, so copying a context is cheap.
//!
//! # Examples
//!
//! ```rust
//! use effectio::context::{Context, Tag};
//!
//! struct Config {
//!     value: &'static str,
//! }
//!
//! let tag: Tag<Config> = Tag::new("app.config");
//! let context = Context::new().add(&tag, Config { value: "hello" });
//! let config = context.get(&tag).expect("config is bound");
//! assert_eq!(config.value, "hello");
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type Service = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Tag
// =============================================================================

/// A unique, type-indexed key naming a service slot.
///
/// Two tags compare equal iff their keys match; the phantom type parameter
/// pins the service type a slot holds. Keys must be stable for the lifetime
/// of a program.
pub struct Tag<S> {
    key: Arc<str>,
    _service: PhantomData<fn() -> S>,
}

impl<S> Tag<S> {
    /// Creates a tag with an explicit key.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self {
            key: key.into(),
            _service: PhantomData,
        }
    }

    /// Creates a tag keyed by the service type's name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effectio::context::Tag;
    ///
    /// struct Clock;
    ///
    /// assert_eq!(Tag::<Clock>::of(), Tag::<Clock>::of());
    /// ```
    #[must_use]
    pub fn of() -> Self {
        Self::new(type_name::<S>())
    }

    /// The tag's key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn key_arc(&self) -> Arc<str> {
        Arc::clone(&self.key)
    }
}

impl<S> Clone for Tag<S> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            _service: PhantomData,
        }
    }
}

impl<S> PartialEq for Tag<S> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<S> Eq for Tag<S> {}

impl<S> Hash for Tag<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<S> fmt::Debug for Tag<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Tag").field(&self.key).finish()
    }
}

impl<S> fmt::Display for Tag<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.key)
    }
}

// =============================================================================
// Context
// =============================================================================

/// An immutable mapping from tags to service values.
///
/// The backing map is shared behind an `Arc`, so cloning a context — which
/// the interpreters do at every continuation boundary — is a reference-count
/// bump.
#[derive(Clone, Default)]
pub struct Context {
    services: Arc<HashMap<Arc<str>, Service>>,
}

impl Context {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `service` bound under `tag`.
    ///
    /// An existing binding for the same key is replaced in the returned
    /// context; `self` is left untouched.
    #[must_use]
    pub fn add<S>(&self, tag: &Tag<S>, service: S) -> Self
    where
        S: Send + Sync + 'static,
    {
        let mut services = (*self.services).clone();
        services.insert(Arc::clone(&tag.key), Arc::new(service));
        Self {
            services: Arc::new(services),
        }
    }

    /// Returns a new context containing the bindings of both; bindings of
    /// `other` win on key collisions.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if other.services.is_empty() {
            return self.clone();
        }
        let mut services = (*self.services).clone();
        for (key, service) in other.services.iter() {
            services.insert(Arc::clone(key), Arc::clone(service));
        }
        Self {
            services: Arc::new(services),
        }
    }

    /// Looks up the service bound under `tag`.
    ///
    /// # Errors
    ///
    /// [`ContextError::ServiceNotFound`] when the key is unbound,
    /// [`ContextError::ServiceTypeMismatch`] when a value of a different type
    /// was bound under the same key.
    pub fn get<S>(&self, tag: &Tag<S>) -> Result<Arc<S>, ContextError>
    where
        S: Send + Sync + 'static,
    {
        let service = self
            .services
            .get(tag.key())
            .ok_or_else(|| ContextError::ServiceNotFound {
                key: tag.key().to_string(),
            })?;
        Arc::clone(service)
            .downcast::<S>()
            .map_err(|_| ContextError::ServiceTypeMismatch {
                key: tag.key().to_string(),
            })
    }

    /// Whether a service is bound under `tag`.
    #[must_use]
    pub fn contains<S>(&self, tag: &Tag<S>) -> bool {
        self.services.contains_key(tag.key())
    }

    /// Number of bound services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no services are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub(crate) fn lookup_raw(&self, key: &str) -> Option<Service> {
        self.services.get(key).map(Arc::clone)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.services.keys().map(AsRef::as_ref).collect();
        keys.sort_unstable();
        formatter.debug_tuple("Context").field(&keys).finish()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure to retrieve a service from a [`Context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// No service is bound under the requested key.
    ServiceNotFound {
        /// The key that was looked up.
        key: String,
    },
    /// A service is bound under the key, but with a different type.
    ServiceTypeMismatch {
        /// The key that was looked up.
        key: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceNotFound { key } => write!(formatter, "Service not found: {key}"),
            Self::ServiceTypeMismatch { key } => {
                write!(formatter, "Service bound under {key} has an unexpected type")
            }
        }
    }
}

impl Error for ContextError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct Config {
        value: &'static str,
    }

    struct Counter(u64);

    #[rstest]
    fn add_returns_new_context() {
        let tag: Tag<Config> = Tag::new("config");
        let empty = Context::new();
        let bound = empty.add(&tag, Config { value: "hello" });

        assert!(empty.is_empty());
        assert_eq!(bound.get(&tag).expect("bound").value, "hello");
    }

    #[rstest]
    fn merge_prefers_right_side() {
        let tag: Tag<Counter> = Tag::new("counter");
        let left = Context::new().add(&tag, Counter(1));
        let right = Context::new().add(&tag, Counter(2));

        assert_eq!(left.merge(&right).get(&tag).expect("bound").0, 2);
        assert_eq!(right.merge(&left).get(&tag).expect("bound").0, 1);
    }

    #[rstest]
    fn get_reports_missing_service() {
        let tag: Tag<Config> = Tag::new("config");
        let error = Context::new().get(&tag).expect_err("unbound");
        assert_eq!(
            error,
            ContextError::ServiceNotFound {
                key: "config".to_string(),
            },
        );
    }

    #[rstest]
    fn get_reports_type_mismatch() {
        let config_tag: Tag<Config> = Tag::new("slot");
        let counter_tag: Tag<Counter> = Tag::new("slot");
        let context = Context::new().add(&config_tag, Config { value: "hello" });

        assert!(matches!(
            context.get(&counter_tag),
            Err(ContextError::ServiceTypeMismatch { .. }),
        ));
    }

    #[rstest]
    fn tags_compare_by_key() {
        let by_name: Tag<Config> = Tag::new("app.config");
        let same: Tag<Config> = Tag::new("app.config");
        let other: Tag<Config> = Tag::new("app.other");

        assert_eq!(by_name, same);
        assert_ne!(by_name, other);
    }

    #[rstest]
    fn typed_tags_share_a_key_per_type() {
        assert_eq!(Tag::<Config>::of().key(), Tag::<Config>::of().key());
        assert_ne!(Tag::<Config>::of().key(), Tag::<Counter>::of().key());
    }
}
