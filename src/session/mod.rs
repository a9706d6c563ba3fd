//! Bounded pool of render sessions.
//!
//! The pool gates all concurrent browser-driven work: at most `capacity`
//! sessions exist, and a session is owned by exactly one worker at a time.
//! Sessions are created lazily on first demand beyond the free list; when
//! auth parameters are configured, each new session replays the login
//! sequence once before being handed to its first caller.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::AuthParams;
use crate::render::{RenderError, RenderSession, SessionFactory};

/// Settle interval after submitting the login form.
const AUTH_SETTLE: Duration = Duration::from_secs(1);

/// Errors raised by pool operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session creation failed in the underlying engine.
    #[error("failed to create render session: {source}")]
    Create {
        /// The underlying render error.
        #[source]
        source: RenderError,
    },

    /// The login replay failed. Startup-fatal: the run cannot proceed
    /// with unauthenticated sessions.
    #[error("login replay failed at {url}: {source}")]
    Auth {
        /// The auth page URL.
        url: String,
        /// The underlying render error.
        #[source]
        source: RenderError,
    },

    /// The pool was shut down while a caller was waiting.
    #[error("session pool is closed")]
    PoolClosed,
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    free: Mutex<Vec<Box<dyn RenderSession>>>,
    factory: Box<dyn SessionFactory>,
    auth: Option<AuthParams>,
    capacity: usize,
    created: AtomicUsize,
    in_use: AtomicUsize,
    closed: AtomicBool,
}

impl PoolInner {
    fn lock_free(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn RenderSession>>> {
        // A poisoned free list only means a worker panicked mid-release;
        // the sessions themselves are still sound.
        self.free.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Bounded pool of [`RenderSession`] instances.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("capacity", &self.inner.capacity)
            .field("in_use", &self.in_use())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl SessionPool {
    /// Creates a pool with the given capacity and session factory.
    ///
    /// When `auth` is provided, every session the factory creates replays
    /// the login sequence before first use.
    #[must_use]
    pub fn new(
        capacity: usize,
        factory: Box<dyn SessionFactory>,
        auth: Option<AuthParams>,
    ) -> Self {
        debug!(capacity, authenticated = auth.is_some(), "creating session pool");
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                free: Mutex::new(Vec::with_capacity(capacity)),
                factory,
                auth,
                capacity,
                created: AtomicUsize::new(0),
                in_use: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The fixed capacity set at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Sessions currently checked out. Never exceeds capacity.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::SeqCst)
    }

    /// Total sessions created so far. Never exceeds capacity.
    #[must_use]
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// Checks out a session, waiting until one is free or can be created.
    ///
    /// The returned lease grants exclusive ownership; dropping it returns
    /// the session to the free list and unblocks one waiter.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PoolClosed`] after shutdown, or a creation /
    /// auth error when a new session cannot be brought up.
    pub async fn acquire(&self) -> Result<SessionLease, SessionError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SessionError::PoolClosed)?;

        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SessionError::PoolClosed);
        }

        let pooled = self.inner.lock_free().pop();
        let session = match pooled {
            Some(session) => session,
            None => self.create_session().await?,
        };

        self.inner.in_use.fetch_add(1, Ordering::SeqCst);
        Ok(SessionLease {
            session: Some(session),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Eagerly creates (and authenticates) one session, then pools it.
    ///
    /// Called at startup so that an unreachable or malformed auth target
    /// aborts the run before any crawl work begins.
    ///
    /// # Errors
    ///
    /// Same errors as [`acquire`](Self::acquire).
    pub async fn warm_up(&self) -> Result<(), SessionError> {
        let lease = self.acquire().await?;
        drop(lease);
        info!("session pool warmed up");
        Ok(())
    }

    /// Shuts the pool down: every pooled session is disposed exactly once,
    /// and sessions still checked out are disposed when their lease drops.
    ///
    /// Never blocks on in-flight acquires; waiting callers get
    /// [`SessionError::PoolClosed`].
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut free = self.inner.lock_free();
        let disposed = free.len();
        for session in free.iter_mut() {
            session.dispose();
        }
        free.clear();
        drop(free);
        self.inner.semaphore.close();
        debug!(disposed, "session pool shut down");
    }

    async fn create_session(&self) -> Result<Box<dyn RenderSession>, SessionError> {
        let mut session = self
            .inner
            .factory
            .create()
            .await
            .map_err(|source| SessionError::Create { source })?;

        if let Some(auth) = &self.inner.auth {
            // A half-authenticated session must not outlive the failure.
            if let Err(e) = replay_login(session.as_mut(), auth).await {
                session.dispose();
                return Err(e);
            }
        }

        let created = self.inner.created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(created, capacity = self.inner.capacity, "render session created");
        Ok(session)
    }
}

/// Replays the login sequence on a fresh session: navigate to the auth
/// page, fill login and password, click submit, then wait a fixed settle
/// interval for the server to establish the session.
async fn replay_login(
    session: &mut dyn RenderSession,
    auth: &AuthParams,
) -> Result<(), SessionError> {
    let auth_err = |source| SessionError::Auth {
        url: auth.url.as_str().to_string(),
        source,
    };

    session.navigate(auth.url.as_str()).await.map_err(auth_err)?;
    session
        .fill(&auth.login.selector, &auth.login.value)
        .map_err(auth_err)?;
    session
        .fill(&auth.password.selector, &auth.password.value)
        .map_err(auth_err)?;
    session.click(&auth.submit_selector).await.map_err(auth_err)?;
    tokio::time::sleep(AUTH_SETTLE).await;

    debug!(url = %auth.url, "login replay complete");
    Ok(())
}

/// Exclusive ownership of one pooled session.
///
/// Dereferences to the session. On drop the session returns to the pool's
/// free list (or is disposed if the pool has shut down meanwhile) and the
/// capacity permit is released.
pub struct SessionLease {
    session: Option<Box<dyn RenderSession>>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease").finish_non_exhaustive()
    }
}

impl Deref for SessionLease {
    type Target = dyn RenderSession;

    fn deref(&self) -> &Self::Target {
        match &self.session {
            Some(session) => session.as_ref(),
            None => unreachable!("session is only taken in Drop"),
        }
    }
}

impl DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.session {
            Some(session) => session.as_mut(),
            None => unreachable!("session is only taken in Drop"),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if self.pool.closed.load(Ordering::SeqCst) {
                session.dispose();
            } else {
                self.pool
                    .free
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(session);
            }
            let previous = self.pool.in_use.fetch_sub(1, Ordering::SeqCst);
            if previous == 0 {
                warn!("session lease dropped with in_use already zero");
            }
        }
        // _permit drops here, releasing one capacity slot.
    }
}
