//! Shorthand registry and context composition.
//!
//! A [`ShortHand`] is a named factory. For every update the registry invokes each factory with
//! `(update, api)` and merges the bound functions into one [`Context`], in registration order,
//! so a later shorthand with the same name replaces an earlier one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};
use yatbl_core::{Result, TelegramApi, Update, YatblError};

use crate::context::Context;

/// Function bound to one update and the API client. Takes JSON arguments, yields a JSON value.
#[derive(Clone)]
pub struct BoundShortHand(Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>);

impl BoundShortHand {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |args: Value| -> BoxFuture<'static, Result<Value>> {
            f(args).boxed()
        }))
    }

    /// Getter-style shorthand: the value is computed at bind time and returned on every call.
    pub fn value(value: Value) -> Self {
        Self::new(move |_args| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    pub async fn call(&self, args: Value) -> Result<Value> {
        (self.0)(args).await
    }

    /// True when both handles point at the same bound function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

type Factory = Arc<dyn Fn(&Arc<Update>, &Arc<dyn TelegramApi>) -> BoundShortHand + Send + Sync>;

/// Named shorthand factory.
#[derive(Clone)]
pub struct ShortHand {
    name: String,
    factory: Factory,
}

impl ShortHand {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Arc<Update>, &Arc<dyn TelegramApi>) -> BoundShortHand + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Same factory under another name, e.g. to sidestep a conflict with an existing shorthand.
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: self.factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind(&self, update: &Arc<Update>, api: &Arc<dyn TelegramApi>) -> BoundShortHand {
        (self.factory)(update, api)
    }
}

/// Outcome of [`ShortHandRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Name was free.
    New,
    /// Name was taken; the new shorthand wins when contexts are composed.
    Overrides,
}

/// Shorthands in registration order.
#[derive(Clone, Default)]
pub struct ShortHandRegistry {
    shorthands: Vec<ShortHand>,
}

impl ShortHandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shorthand. A malformed name is rejected here, never at dispatch time; a taken name
    /// is accepted with a warning.
    pub fn register(&mut self, shorthand: ShortHand) -> Result<Registration> {
        validate_name(shorthand.name())?;

        let registration = if self.has_conflict(shorthand.name()) {
            warn!(
                shorthand = %shorthand.name(),
                "Shorthand name is taken; rename it or it overrides the previous shorthand"
            );
            Registration::Overrides
        } else {
            Registration::New
        };

        debug!(shorthand = %shorthand.name(), "Shorthand registered");
        self.shorthands.push(shorthand);
        Ok(registration)
    }

    /// Registers several shorthands, stopping at the first invalid one.
    pub fn register_all<I>(&mut self, shorthands: I) -> Result<()>
    where
        I: IntoIterator<Item = ShortHand>,
    {
        for shorthand in shorthands {
            self.register(shorthand)?;
        }
        Ok(())
    }

    /// Whether `name` is already registered. Callers can use this to pre-check a name.
    pub fn has_conflict(&self, name: &str) -> bool {
        self.shorthands.iter().any(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.shorthands.iter().map(ShortHand::name).collect()
    }

    pub fn len(&self) -> usize {
        self.shorthands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shorthands.is_empty()
    }

    /// Builds a fresh context for one update.
    pub fn compose(&self, update: Arc<Update>, api: Arc<dyn TelegramApi>) -> Context {
        let mut bound = HashMap::with_capacity(self.shorthands.len());
        for shorthand in &self.shorthands {
            bound.insert(shorthand.name().to_string(), shorthand.bind(&update, &api));
        }
        Context::new(update, api, bound)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(YatblError::InvalidShortHandConfiguration(
            "shorthand name must not be empty".to_string(),
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(YatblError::InvalidShortHandConfiguration(format!(
            "shorthand name {:?} contains whitespace",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yatbl_core::MockApi;

    fn constant(name: &str, value: Value) -> ShortHand {
        ShortHand::new(name, move |_update, _api| BoundShortHand::value(value.clone()))
    }

    fn api() -> Arc<dyn TelegramApi> {
        Arc::new(MockApi::new())
    }

    #[test]
    fn test_register_reports_conflict() {
        let mut registry = ShortHandRegistry::new();
        assert_eq!(
            registry.register(constant("foo", json!(1))).unwrap(),
            Registration::New
        );
        assert!(registry.has_conflict("foo"));
        assert_eq!(
            registry.register(constant("foo", json!(2))).unwrap(),
            Registration::Overrides
        );
        assert_eq!(registry.len(), 2);
    }

    /// Collects the fields of every WARN event.
    #[derive(Clone, Default)]
    struct WarnCapture(Arc<std::sync::Mutex<Vec<String>>>);

    struct FieldText<'a>(&'a mut String);

    impl tracing::field::Visit for FieldText<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut text = String::new();
                event.record(&mut FieldText(&mut text));
                self.0.lock().unwrap().push(text);
            }
        }
    }

    #[test]
    fn test_register_warns_on_conflict() {
        use tracing_subscriber::layer::SubscriberExt;

        let capture = WarnCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        let mut registry = ShortHandRegistry::new();
        tracing::subscriber::with_default(subscriber, || {
            registry.register(constant("foo", json!(1))).unwrap();
            assert!(capture.0.lock().unwrap().is_empty());
            registry.register(constant("foo", json!(2))).unwrap();
        });

        let warnings = capture.0.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Shorthand name is taken"));
        assert!(warnings[0].contains("shorthand=foo"));
    }

    #[test]
    fn test_register_rejects_malformed_names() {
        let mut registry = ShortHandRegistry::new();
        let err = registry.register(constant("", json!(1))).unwrap_err();
        assert!(matches!(err, YatblError::InvalidShortHandConfiguration(_)));
        let err = registry.register(constant("reply message", json!(1))).unwrap_err();
        assert!(matches!(err, YatblError::InvalidShortHandConfiguration(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_renamed_keeps_factory() {
        let mut registry = ShortHandRegistry::new();
        registry
            .register_all(vec![
                constant("foo", json!(1)),
                constant("foo", json!(2)).renamed("bar"),
            ])
            .unwrap();
        assert_eq!(registry.names(), vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn test_compose_last_registered_wins() {
        let mut registry = ShortHandRegistry::new();
        registry.register(constant("foo", json!("fn1"))).unwrap();
        registry.register(constant("foo", json!("fn2"))).unwrap();

        let ctx = registry.compose(Arc::new(Update::empty(1)), api());
        assert_eq!(ctx.call("foo", Value::Null).await.unwrap(), json!("fn2"));
        assert_eq!(ctx.names(), vec!["foo"]);
    }

    #[tokio::test]
    async fn test_compose_binds_each_update() {
        let mut registry = ShortHandRegistry::new();
        registry
            .register(ShortHand::new("update_id", |update, _api| {
                BoundShortHand::value(json!(update.update_id))
            }))
            .unwrap();

        let first = registry.compose(Arc::new(Update::empty(10)), api());
        let second = registry.compose(Arc::new(Update::empty(11)), api());

        assert_eq!(first.call("update_id", Value::Null).await.unwrap(), json!(10));
        assert_eq!(second.call("update_id", Value::Null).await.unwrap(), json!(11));
        assert!(!first
            .get("update_id")
            .unwrap()
            .ptr_eq(second.get("update_id").unwrap()));
    }
}
