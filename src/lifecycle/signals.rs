//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Dispatch the first termination signal to the orchestrator, once
//! - Defer SIGINT while a critical section runs, replaying it on exit
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handler state is process-wide: only one guard may be active at a time,
//!   a second `install` fails with `SignalError::AlreadyInstalled`
//! - A repeated termination signal forces an immediate exit (code 130)
//!   unless disabled; Tokio keeps its handlers registered for the life of
//!   the process, so this replaces "restore the default disposition"

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::error::SignalError;

/// Exit code used when a repeated signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// The termination signals the runtime recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Interrupt => f.write_str("SIGINT"),
            SignalKind::Terminate => f.write_str("SIGTERM"),
        }
    }
}

type Callback = Box<dyn Fn(SignalKind) + Send + Sync>;

#[derive(Default)]
struct Deferral {
    depth: usize,
    pending: Option<SignalKind>,
}

/// Shared between the listener task and deferral scopes.
struct Dispatch {
    on_terminate: Callback,
    fired: AtomicBool,
    deferral: Mutex<Deferral>,
    force_exit_on_repeat: bool,
}

impl Dispatch {
    fn new(on_terminate: Callback, force_exit_on_repeat: bool) -> Self {
        Self {
            on_terminate,
            fired: AtomicBool::new(false),
            deferral: Mutex::new(Deferral::default()),
            force_exit_on_repeat,
        }
    }

    fn deferral(&self) -> std::sync::MutexGuard<'_, Deferral> {
        self.deferral.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Entry point for every received signal.
    fn receive(&self, kind: SignalKind) {
        if kind == SignalKind::Interrupt {
            let mut deferral = self.deferral();
            if deferral.depth > 0 {
                if deferral.pending.replace(kind).is_none() {
                    tracing::info!(signal = %kind, "Signal deferred until critical section ends");
                }
                return;
            }
        }
        self.deliver(kind);
    }

    fn deliver(&self, kind: SignalKind) {
        if self.fired.swap(true, Ordering::SeqCst) {
            if self.force_exit_on_repeat {
                tracing::error!(signal = %kind, "Repeated termination signal, forcing exit");
                std::process::exit(FORCED_EXIT_CODE);
            }
            tracing::warn!(signal = %kind, "Repeated termination signal ignored");
            return;
        }
        tracing::info!(signal = %kind, "Termination signal received");
        (self.on_terminate)(kind);
    }

    fn enter(&self) {
        self.deferral().depth += 1;
    }

    fn exit(&self) {
        let pending = {
            let mut deferral = self.deferral();
            deferral.depth = deferral.depth.saturating_sub(1);
            if deferral.depth == 0 {
                deferral.pending.take()
            } else {
                None
            }
        };
        if let Some(kind) = pending {
            tracing::info!(signal = %kind, "Replaying deferred signal");
            self.deliver(kind);
        }
    }
}

/// Leaves the critical section when dropped, on every exit path.
struct DeferScope {
    dispatch: Arc<Dispatch>,
}

impl DeferScope {
    fn enter(dispatch: &Arc<Dispatch>) -> Self {
        dispatch.enter();
        Self {
            dispatch: dispatch.clone(),
        }
    }
}

impl Drop for DeferScope {
    fn drop(&mut self) {
        self.dispatch.exit();
    }
}

/// Bridges OS termination signals into the orchestrator.
///
/// Handlers stay active until the guard is dropped.
pub struct SignalGuard {
    dispatch: Arc<Dispatch>,
    listener: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Install handlers; `on_terminate` runs once, on the first signal.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install<F>(on_terminate: F) -> Result<Self, SignalError>
    where
        F: Fn(SignalKind) + Send + Sync + 'static,
    {
        Self::install_with(on_terminate, true)
    }

    /// Like [`SignalGuard::install`], choosing whether a repeated signal
    /// forces the process to exit.
    pub fn install_with<F>(on_terminate: F, force_exit_on_repeat: bool) -> Result<Self, SignalError>
    where
        F: Fn(SignalKind) + Send + Sync + 'static,
    {
        if ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SignalError::AlreadyInstalled);
        }

        let dispatch = Arc::new(Dispatch::new(Box::new(on_terminate), force_exit_on_repeat));
        let listener = match spawn_listener(dispatch.clone()) {
            Ok(listener) => listener,
            Err(e) => {
                ACTIVE.store(false, Ordering::SeqCst);
                return Err(SignalError::Register(e));
            }
        };

        tracing::debug!("Signal handlers installed");
        Ok(Self {
            dispatch,
            listener: Some(listener),
        })
    }

    /// Run `fut` with SIGINT deferred; a SIGINT received meanwhile is
    /// delivered once `fut` completes, fails, or is dropped.
    pub async fn defer_during<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        let _scope = DeferScope::enter(&self.dispatch);
        fut.await
    }

    /// A guard with no OS registration, driven by hand.
    #[cfg(test)]
    fn detached<F>(on_terminate: F, force_exit_on_repeat: bool) -> Self
    where
        F: Fn(SignalKind) + Send + Sync + 'static,
    {
        Self {
            dispatch: Arc::new(Dispatch::new(Box::new(on_terminate), force_exit_on_repeat)),
            listener: None,
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            ACTIVE.store(false, Ordering::SeqCst);
            tracing::debug!("Signal handlers released");
        }
    }
}

#[cfg(unix)]
fn spawn_listener(dispatch: Arc<Dispatch>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind as UnixSignal};

    let mut interrupt = signal(UnixSignal::interrupt())?;
    let mut terminate = signal(UnixSignal::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = interrupt.recv() => dispatch.receive(SignalKind::Interrupt),
                Some(()) = terminate.recv() => dispatch.receive(SignalKind::Terminate),
                else => break,
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_listener(dispatch: Arc<Dispatch>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            dispatch.receive(SignalKind::Interrupt);
        }
    }))
}
