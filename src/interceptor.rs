//! Ordered interceptor chains for outgoing requests and incoming responses.
//!
//! An [`InterceptorChain`] holds callbacks that run, in the order they were
//! added, against one mutable payload. Every stage sees the changes made by
//! the stages before it. The first stage that fails stops the chain and its
//! error becomes the result of [`InterceptorChain::run`], unchanged.
//!
//! A [`Client`](crate::Client) owns two chains: a [`RequestChain`] that runs
//! after a request is built and before it is dispatched, and a
//! [`ResponseChain`] that runs after a response arrives and before it is
//! returned.
//!
//! ```rust
//! use requests_kit::{bail, header, interceptor::RequestChain, HeaderValue, Method, Request, Uri};
//!
//! let chain = RequestChain::new();
//! chain.add(|request: &mut Request| {
//!     request.insert_header(header::USER_AGENT, HeaderValue::from_static("requests-kit"));
//!     Ok(())
//! });
//! chain.add(|request: &mut Request| {
//!     if request.uri().scheme_str() != Some("https") {
//!         bail!(400, "plain http is not allowed");
//!     }
//!     Ok(())
//! });
//!
//! let mut request = Request::new(Method::GET, Uri::from_static("http://example.com/"));
//! let err = chain.run(&mut request).unwrap_err();
//! assert_eq!(err.to_string(), "plain http is not allowed");
//! assert!(request.headers().contains_key(header::USER_AGENT));
//! ```
use core::any::type_name;
use core::fmt::{self, Debug};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Request, Response, Result};

/// A stage of an [`InterceptorChain`].
///
/// Closures `Fn(&mut P) -> Result<()>` implement this trait; implement it
/// directly for stages that carry configuration.
///
/// ```rust
/// use requests_kit::{interceptor::Interceptor, header, HeaderValue, Request, Result};
///
/// struct BearerAuth(HeaderValue);
///
/// impl Interceptor<Request> for BearerAuth {
///     fn intercept(&self, request: &mut Request) -> Result<()> {
///         request.insert_header(header::AUTHORIZATION, self.0.clone());
///         Ok(())
///     }
/// }
/// ```
pub trait Interceptor<P>: Send + Sync {
    /// Inspects or modifies `payload`. An error stops the chain.
    fn intercept(&self, payload: &mut P) -> Result<()>;

    /// Whether this stage does nothing. No-op stages are never added to a chain.
    fn is_noop(&self) -> bool {
        false
    }

    /// Type name of the stage, used in logs and `Debug` output.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<P, F> Interceptor<P> for F
where
    F: Fn(&mut P) -> Result<()> + Send + Sync,
{
    fn intercept(&self, payload: &mut P) -> Result<()> {
        self(payload)
    }
}

/// The empty stage. Chains refuse to store it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl<P> Interceptor<P> for Noop {
    fn intercept(&self, _payload: &mut P) -> Result<()> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Type-erased, cheaply cloneable interceptor.
pub struct AnyInterceptor<P> {
    inner: Arc<dyn Interceptor<P>>,
    name: &'static str,
}

impl<P> AnyInterceptor<P> {
    /// Wraps any interceptor implementation.
    pub fn new(interceptor: impl Interceptor<P> + 'static) -> Self {
        let name = interceptor.name();
        Self {
            inner: Arc::new(interceptor),
            name,
        }
    }

    /// Returns the type name of the wrapped interceptor.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P> Clone for AnyInterceptor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: self.name,
        }
    }
}

impl<P> Debug for AnyInterceptor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyInterceptor[{}]", self.name)
    }
}

impl<P> Interceptor<P> for AnyInterceptor<P> {
    fn intercept(&self, payload: &mut P) -> Result<()> {
        self.inner.intercept(payload)
    }

    fn is_noop(&self) -> bool {
        self.inner.is_noop()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Handle identifying a stage inside one chain, returned by `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

struct Stage<P> {
    id: InterceptorId,
    interceptor: AnyInterceptor<P>,
}

impl<P> Clone for Stage<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// An ordered, thread-safe sequence of interceptors over payload `P`.
///
/// Mutations (`add`, `remove`, `clear`) are serialized by a lock and publish a
/// new stage list. `run` clones the current list under a shared lock and
/// executes it without holding the lock, so runs proceed in parallel and a
/// stage may modify its own chain; such a change applies to later runs.
pub struct InterceptorChain<P> {
    stages: RwLock<Arc<[Stage<P>]>>,
    next_id: AtomicU64,
}

/// Chain run on every outgoing request.
pub type RequestChain = InterceptorChain<Request>;

/// Chain run on every incoming response.
pub type ResponseChain = InterceptorChain<Response>;

impl<P> InterceptorChain<P> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            stages: RwLock::new(Arc::from(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Appends a closure stage.
    ///
    /// Returns the stage id, usable with [`remove`](Self::remove).
    pub fn add<F>(&self, stage: F) -> Option<InterceptorId>
    where
        F: Fn(&mut P) -> Result<()> + Send + Sync + 'static,
    {
        self.add_interceptor(stage)
    }

    /// Appends an [`Interceptor`] implementation.
    ///
    /// Returns `None` and leaves the chain untouched if the interceptor is a
    /// no-op (see [`Noop`]).
    pub fn add_interceptor(&self, interceptor: impl Interceptor<P> + 'static) -> Option<InterceptorId> {
        if interceptor.is_noop() {
            tracing::debug!(interceptor = interceptor.name(), "rejected no-op interceptor");
            return None;
        }
        let interceptor = AnyInterceptor::new(interceptor);
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut stages = self.stages.write();
        let mut next = Vec::with_capacity(stages.len() + 1);
        next.extend(stages.iter().cloned());
        next.push(Stage { id, interceptor });
        *stages = next.into();
        Some(id)
    }

    /// Removes the stage with `id`. Returns whether a stage was removed.
    pub fn remove(&self, id: InterceptorId) -> bool {
        let mut stages = self.stages.write();
        if !stages.iter().any(|stage| stage.id == id) {
            return false;
        }
        let next: Vec<_> = stages.iter().filter(|stage| stage.id != id).cloned().collect();
        *stages = next.into();
        true
    }

    /// Discards every stage.
    pub fn clear(&self) {
        *self.stages.write() = Arc::from(Vec::new());
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.read().len()
    }

    /// Whether the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.read().is_empty()
    }

    /// Runs every stage in order against `payload`.
    ///
    /// Stops at the first failing stage and returns its error as is; later
    /// stages do not run. An empty chain succeeds immediately.
    pub fn run(&self, payload: &mut P) -> Result<()> {
        let stages = self.stages.read().clone();
        for stage in stages.iter() {
            let name = stage.interceptor.name();
            tracing::trace!(interceptor = name, "running interceptor");
            if let Err(error) = stage.interceptor.intercept(payload) {
                tracing::debug!(interceptor = name, status = %error.status(), %error, "interceptor failed");
                return Err(error);
            }
        }
        Ok(())
    }
}

impl<P> Default for InterceptorChain<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Debug for InterceptorChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages = self.stages.read().clone();
        f.debug_list()
            .entries(stages.iter().map(|stage| stage.interceptor.name()))
            .finish()
    }
}
