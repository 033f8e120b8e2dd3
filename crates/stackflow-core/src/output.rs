//! Deferred outputs
//!
//! An [`Output<T>`] is a value that is not known yet. It is settled exactly
//! once, either resolved with a value or rejected with an [`OutputError`],
//! and can be composed with [`Output::map`], [`Output::combine`] and
//! [`Output::all`] before it settles.
//!
//! Each output carries:
//!
//! - a **secret** bit. Derived outputs are secret whenever any source is
//!   secret; only [`Output::declassify`] clears it.
//! - the set of resources it was produced by. The dependency graph is built
//!   from these sets, not from side effects at runtime.
//!
//! Callbacks queued before settlement run once, in registration order, on the
//! thread that settles the output. Callbacks registered afterwards run
//! immediately on the registering thread.

use crate::error::{ConfigurationError, DoubleResolutionError, OutputError};
use crate::resource::ResourceId;
use crate::secret::Revealed;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Settled state of an output
pub type Settled<T> = std::result::Result<T, OutputError>;

type Callback<T> = Box<dyn FnOnce(&Settled<T>) + Send>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Settled(Arc<Settled<T>>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panicking callback never runs under the lock, so a poisoned
        // guard still holds a consistent state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A single-assignment value with secret taint and dependency tracking
pub struct Output<T> {
    shared: Arc<Shared<T>>,
    secret: bool,
    dependencies: Arc<BTreeSet<ResourceId>>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            secret: self.secret,
            dependencies: Arc::clone(&self.dependencies),
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("secret", &self.secret)
            .field("settled", &self.is_settled())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl<T> Output<T> {
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.shared.lock(), State::Settled(_))
    }

    /// Resources whose realization this value waits on
    pub fn dependencies(&self) -> &BTreeSet<ResourceId> {
        &self.dependencies
    }
}

impl<T: Send + Sync + 'static> Output<T> {
    fn with(dependencies: BTreeSet<ResourceId>, secret: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                notify: Notify::new(),
            }),
            secret,
            dependencies: Arc::new(dependencies),
        }
    }

    /// A pending output with no resource dependencies.
    ///
    /// The caller is responsible for settling it.
    pub fn pending() -> Self {
        Self::with(BTreeSet::new(), false)
    }

    /// A pending output produced by the given resource
    pub fn for_resource(resource: ResourceId, secret: bool) -> Self {
        Self::with(BTreeSet::from([resource]), secret)
    }

    /// An already known, non-secret value
    pub fn resolved(value: T) -> Self {
        let output = Self::pending();
        let _ = output.settle(Ok(value));
        output
    }

    /// An already known secret value
    pub fn secret(value: T) -> Self {
        Self::resolved(value).into_secret()
    }

    /// An output that is already rejected
    pub fn rejected(error: impl Into<OutputError>) -> Self {
        let output = Self::pending();
        let _ = output.settle(Err(error.into()));
        output
    }

    /// Set the value. Fails if the output has already settled.
    pub fn resolve(&self, value: T) -> Result<(), DoubleResolutionError> {
        self.settle(Ok(value))
    }

    /// Settle the output as failed. Fails if the output has already settled.
    pub fn reject(&self, error: impl Into<OutputError>) -> Result<(), DoubleResolutionError> {
        self.settle(Err(error.into()))
    }

    fn settle(&self, outcome: Settled<T>) -> Result<(), DoubleResolutionError> {
        let settled = Arc::new(outcome);
        let callbacks = {
            let mut state = self.shared.lock();
            match &mut *state {
                State::Settled(_) => return Err(DoubleResolutionError),
                State::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = State::Settled(Arc::clone(&settled));
                    callbacks
                }
            }
        };

        for callback in callbacks {
            callback(&settled);
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Run `callback` once the output settles.
    ///
    /// If it has already settled the callback runs before this returns.
    pub fn on_settle(&self, callback: impl FnOnce(&Settled<T>) + Send + 'static) {
        let settled = {
            let mut state = self.shared.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Settled(settled) => Arc::clone(settled),
            }
        };
        callback(&settled);
    }

    /// Same value, marked secret
    pub fn into_secret(&self) -> Output<T> {
        Output {
            shared: Arc::clone(&self.shared),
            secret: true,
            dependencies: Arc::clone(&self.dependencies),
        }
    }

    /// Same value with the secret bit cleared
    pub fn declassify(&self) -> Output<T> {
        Output {
            shared: Arc::clone(&self.shared),
            secret: false,
            dependencies: Arc::clone(&self.dependencies),
        }
    }

    /// Transform the value once it resolves
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Transform the value with a check that may reject the derived output
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, ConfigurationError> + Send + 'static,
    {
        let derived = Output::with((*self.dependencies).clone(), self.secret);
        let target = derived.clone();
        self.on_settle(move |settled| {
            let outcome = match settled {
                Ok(value) => f(value).map_err(OutputError::from),
                Err(e) => Err(e.clone()),
            };
            settle_derived(&target, outcome);
        });
        derived
    }

    /// Wait for the value, then hand back a taint-aware copy of it
    pub async fn wait(&self) -> Settled<Revealed<T>>
    where
        T: Clone,
    {
        loop {
            let mut notified = std::pin::pin!(self.shared.notify.notified());
            notified.as_mut().enable();

            if let Some(settled) = self.peek() {
                return settled;
            }
            notified.await;
        }
    }

    /// The settled value, if any, without waiting
    pub fn peek(&self) -> Option<Settled<Revealed<T>>>
    where
        T: Clone,
    {
        let settled = match &*self.shared.lock() {
            State::Pending(_) => return None,
            State::Settled(settled) => Arc::clone(settled),
        };
        Some(match &*settled {
            Ok(value) => Ok(Revealed::new(value.clone(), self.secret)),
            Err(e) => Err(e.clone()),
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Output<T> {
    /// Join with another output.
    ///
    /// `f` runs only after both sides resolve. A rejection on either side
    /// rejects the result.
    pub fn combine<U, V, F>(&self, other: &Output<U>, f: F) -> Output<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        let mut dependencies = (*self.dependencies).clone();
        dependencies.extend(other.dependencies.iter().copied());
        let derived = Output::with(dependencies, self.secret || other.secret);

        let target = derived.clone();
        let other = other.clone();
        self.on_settle(move |left| match left {
            Err(e) => settle_derived(&target, Err(e.clone())),
            Ok(left) => {
                let left = left.clone();
                other.on_settle(move |right| {
                    let outcome = match right {
                        Ok(right) => Ok(f(&left, right)),
                        Err(e) => Err(e.clone()),
                    };
                    settle_derived(&target, outcome);
                });
            }
        });
        derived
    }

    /// Join a list of outputs into one output of a list, keeping order
    pub fn all(outputs: impl IntoIterator<Item = Output<T>>) -> Output<Vec<T>> {
        let outputs: Vec<Output<T>> = outputs.into_iter().collect();
        let dependencies: BTreeSet<ResourceId> = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().copied())
            .collect();
        let secret = outputs.iter().any(|o| o.secret);
        let derived = Output::with(dependencies, secret);

        if outputs.is_empty() {
            settle_derived(&derived, Ok(Vec::new()));
            return derived;
        }

        let gather = Arc::new(Mutex::new(Gather {
            values: vec![None; outputs.len()],
            remaining: outputs.len(),
            done: false,
        }));

        for (index, output) in outputs.iter().enumerate() {
            let gather = Arc::clone(&gather);
            let target = derived.clone();
            output.on_settle(move |settled| {
                let outcome = {
                    let mut gather = gather.lock().unwrap_or_else(|e| e.into_inner());
                    gather.accept(index, settled)
                };
                if let Some(outcome) = outcome {
                    settle_derived(&target, outcome);
                }
            });
        }
        derived
    }
}

struct Gather<T> {
    values: Vec<Option<T>>,
    remaining: usize,
    done: bool,
}

impl<T: Clone> Gather<T> {
    fn accept(&mut self, index: usize, settled: &Settled<T>) -> Option<Settled<Vec<T>>> {
        if self.done {
            return None;
        }
        match settled {
            Err(e) => {
                self.done = true;
                Some(Err(e.clone()))
            }
            Ok(value) => {
                self.values[index] = Some(value.clone());
                self.remaining -= 1;
                if self.remaining > 0 {
                    return None;
                }
                self.done = true;
                Some(Ok(self.values.drain(..).flatten().collect()))
            }
        }
    }
}

fn settle_derived<T: Send + Sync + 'static>(target: &Output<T>, outcome: Settled<T>) {
    if target.settle(outcome).is_err() {
        tracing::debug!("derived output was settled externally, dropping computed value");
    }
}

/// A property that is either known up front or produced by another resource
#[derive(Clone, Debug)]
pub enum Input<T> {
    Literal(T),
    Deferred(Output<T>),
}

impl<T: Send + Sync + 'static> Input<T> {
    pub fn into_output(self) -> Output<T> {
        match self {
            Input::Literal(value) => Output::resolved(value),
            Input::Deferred(output) => output,
        }
    }

    pub fn is_secret(&self) -> bool {
        match self {
            Input::Literal(_) => false,
            Input::Deferred(output) => output.is_secret(),
        }
    }
}

impl<T> From<Output<T>> for Input<T> {
    fn from(output: Output<T>) -> Self {
        Input::Deferred(output)
    }
}

impl<T> From<&Output<T>> for Input<T> {
    fn from(output: &Output<T>) -> Self {
        Input::Deferred(output.clone())
    }
}

impl From<String> for Input<String> {
    fn from(value: String) -> Self {
        Input::Literal(value)
    }
}

impl From<&str> for Input<String> {
    fn from(value: &str) -> Self {
        Input::Literal(value.to_string())
    }
}

impl From<&String> for Input<String> {
    fn from(value: &String) -> Self {
        Input::Literal(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_resolve_twice_fails() {
        let output = Output::<String>::pending();
        assert!(output.resolve("a".to_string()).is_ok());
        assert_eq!(output.resolve("b".to_string()), Err(DoubleResolutionError));
        assert_eq!(
            output.reject(OutputError::Abandoned {
                resource: "x".to_string()
            }),
            Err(DoubleResolutionError)
        );
        assert_eq!(output.peek().unwrap().unwrap().expose(), "a");
    }

    #[test]
    fn test_map_before_and_after_resolution_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let source = Output::<u32>::pending();
        let before = {
            let calls = Arc::clone(&calls);
            source.map(move |v| {
                calls.fetch_add(1, Ordering::SeqCst);
                v + 1
            })
        };
        assert!(before.peek().is_none());

        source.resolve(41).unwrap();
        let after = {
            let calls = Arc::clone(&calls);
            source.map(move |v| {
                calls.fetch_add(1, Ordering::SeqCst);
                v * 2
            })
        };

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(before.peek().unwrap().unwrap().expose(), 42);
        assert_eq!(after.peek().unwrap().unwrap().expose(), 82);

        // A second resolution attempt must not re-run anything
        let _ = source.resolve(0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_queued_callbacks_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let source = Output::<u32>::pending();
        for i in 0..5 {
            let order = Arc::clone(&order);
            source.on_settle(move |_| order.lock().unwrap().push(i));
        }
        source.resolve(1).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_secret_taint_is_monotonic() {
        let key = Output::secret("k1".to_string());
        let upper = key.map(|k| k.to_uppercase());
        assert!(upper.is_secret());

        let name = Output::resolved("acct1".to_string());
        let joined = name.combine(&key, |n, k| format!("{n}:{k}"));
        assert!(joined.is_secret());

        let listed = Output::all(vec![name.clone(), key.clone()]);
        assert!(listed.is_secret());

        assert!(!name.map(|n| n.len()).is_secret());
        assert!(!upper.declassify().is_secret());
        assert!(upper.peek().unwrap().unwrap().is_secret());
    }

    #[test]
    fn test_combine_waits_for_both_sides() {
        let left = Output::<String>::pending();
        let right = Output::<String>::pending();
        let joined = left.combine(&right, |l, r| format!("{l}/{r}"));

        right.resolve("blob".to_string()).unwrap();
        assert!(joined.peek().is_none());
        left.resolve("container".to_string()).unwrap();
        assert_eq!(joined.peek().unwrap().unwrap().expose(), "container/blob");
    }

    #[test]
    fn test_rejection_propagates() {
        let source = Output::<String>::pending();
        let derived = source.map(|s| s.len());
        let joined = Output::all(vec![Output::resolved(1usize), derived.clone()]);

        source
            .reject(OutputError::ResourceFailed {
                resource: "storage".to_string(),
                reason: "quota".to_string(),
            })
            .unwrap();

        assert!(matches!(
            derived.peek(),
            Some(Err(OutputError::ResourceFailed { .. }))
        ));
        assert!(matches!(
            joined.peek(),
            Some(Err(OutputError::ResourceFailed { .. }))
        ));
    }

    #[test]
    fn test_try_map_rejects_with_configuration_error() {
        let principal = Output::<String>::pending();
        let checked = principal.try_map(|p| {
            if p.is_empty() {
                Err(ConfigurationError::MissingIdentity("empty".to_string()))
            } else {
                Ok(p.clone())
            }
        });
        principal.resolve(String::new()).unwrap();
        assert!(matches!(
            checked.peek(),
            Some(Err(OutputError::Configuration(
                ConfigurationError::MissingIdentity(_)
            )))
        ));
    }

    #[test]
    fn test_dependencies_are_unioned() {
        let a = Output::<String>::for_resource(ResourceId::new(1), false);
        let b = Output::<String>::for_resource(ResourceId::new(2), false);
        let literal = Output::resolved("x".to_string());

        let joined = a.combine(&b, |a, b| format!("{a}{b}"));
        let all = Output::all(vec![joined.clone(), literal.clone()]);

        assert_eq!(
            joined.dependencies().iter().copied().collect::<Vec<_>>(),
            vec![ResourceId::new(1), ResourceId::new(2)]
        );
        assert_eq!(all.dependencies().len(), 2);
        assert!(literal.dependencies().is_empty());
    }

    #[test]
    fn test_all_of_nothing_resolves_immediately() {
        let all = Output::<u8>::all(Vec::new());
        assert_eq!(all.peek().unwrap().unwrap().expose(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_wait_across_tasks() {
        let output = Output::<String>::pending();
        let waiter = {
            let output = output.clone();
            tokio::spawn(async move { output.wait().await })
        };
        tokio::task::yield_now().await;
        output.resolve("ready".to_string()).unwrap();

        let value = waiter.await.unwrap().unwrap();
        assert_eq!(value.expose(), "ready");
    }

    #[tokio::test]
    async fn test_concurrent_registration_fires_exactly_once() {
        for _ in 0..50 {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = Output::<u32>::pending();

            let registrar = {
                let source = source.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    for _ in 0..10 {
                        let calls = Arc::clone(&calls);
                        source.on_settle(move |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                        });
                        tokio::task::yield_now().await;
                    }
                })
            };
            let resolver = {
                let source = source.clone();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    source.resolve(7).unwrap();
                })
            };

            registrar.await.unwrap();
            resolver.await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 10);
        }
    }
}
