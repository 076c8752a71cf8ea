// ── Live state watch ──
//
// One consumer's window onto device state: a listener on the shared socket
// feeding a private `EntityStore`, plus a supervisor that empties the store
// whenever the device goes away or the session stops being valid.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

use crate::auth::AuthState;
use crate::availability::AvailabilityState;
use crate::connection::{ConnectionEvent, ConnectionManager, Subscription};
use crate::store::{EntityStore, EntityTables};

/// Live entity tables for one consumer.
///
/// Holds a subscription on the shared socket for as long as it lives;
/// dropping the last `StateWatch` (and every other listener) closes the
/// socket.
pub struct StateWatch {
    store: Arc<EntityStore>,
    receiver: watch::Receiver<EntityTables>,
    current: EntityTables,
    errors: watch::Receiver<Option<String>>,
    guards: Guards,
}

struct Guards {
    _subscription: Subscription,
    _supervisor: DropGuard,
}

impl StateWatch {
    /// Subscribe to `manager` and start the clearing supervisor. Must be
    /// called inside a Tokio runtime.
    pub fn new(
        manager: &ConnectionManager,
        availability: watch::Receiver<AvailabilityState>,
        auth: watch::Receiver<AuthState>,
    ) -> Self {
        let store = Arc::new(EntityStore::new());

        let sink = Arc::clone(&store);
        let (gate_availability, gate_auth) = (availability.clone(), auth.clone());
        let subscription = manager.subscribe(move |event| {
            if let ConnectionEvent::Update(update) = event {
                if is_open(&gate_availability.borrow(), &gate_auth.borrow()) {
                    sink.apply(update);
                } else {
                    trace!(kind = update.kind(), "ignoring update while gated");
                }
            }
        });

        let cancel = CancellationToken::new();
        tokio::spawn(supervise_clearing(
            Arc::downgrade(&store),
            availability,
            auth,
            cancel.clone(),
        ));

        let receiver = store.subscribe();
        let current = receiver.borrow().clone();
        Self {
            store,
            receiver,
            current,
            errors: manager.error(),
            guards: Guards {
                _subscription: subscription,
                _supervisor: cancel.drop_guard(),
            },
        }
    }

    /// Tables as of the last [`changed`](Self::changed) call (or creation).
    pub fn current(&self) -> &EntityTables {
        &self.current
    }

    /// The latest tables, which may be newer than [`current`](Self::current).
    pub fn latest(&self) -> EntityTables {
        self.store.snapshot()
    }

    /// Wait for the tables to change. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<EntityTables> {
        self.receiver.changed().await.ok()?;
        let tables = self.receiver.borrow_and_update().clone();
        self.current = tables.clone();
        Some(tables)
    }

    /// Terminal connection error, if the retry budget ran out.
    pub fn error(&self) -> Option<String> {
        self.errors.borrow().clone()
    }

    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.errors.clone()
    }

    /// Convert into a `Stream` of table snapshots. The first item is the
    /// current value.
    pub fn into_stream(self) -> StateStream {
        StateStream {
            inner: WatchStream::new(self.receiver),
            _store: self.store,
            _guards: self.guards,
        }
    }
}

/// `Stream` adapter for [`StateWatch`]. Keeps the subscription alive.
pub struct StateStream {
    inner: WatchStream<EntityTables>,
    _store: Arc<EntityStore>,
    _guards: Guards,
}

impl Stream for StateStream {
    type Item = EntityTables;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

fn is_open(availability: &AvailabilityState, auth: &AuthState) -> bool {
    availability.is_available && auth.is_satisfied()
}

async fn supervise_clearing(
    store: Weak<EntityStore>,
    mut availability: watch::Receiver<AvailabilityState>,
    mut auth: watch::Receiver<AuthState>,
    cancel: CancellationToken,
) {
    loop {
        let open = is_open(&availability.borrow_and_update(), &auth.borrow_and_update());
        if !open {
            let Some(store) = store.upgrade() else {
                break;
            };
            store.clear();
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = availability.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
