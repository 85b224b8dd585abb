//! Event ledger — the append-only issuance log and cascade trigger.
//!
//! Every append is persisted first and then dispatched, synchronously and
//! in registration order, to the subscribed observers. A caller that sees
//! `append` return has also seen every reaction to the event, including
//! events the observers appended in turn.

pub mod types;

pub use types::{LedgerEvent, LedgerEventKind, SubjectKind};

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::progress::LearnerId;
use crate::store::ProgressionStore;

/// Reacts to ledger events.
///
/// Observers must not fail the append: they log and swallow their own
/// errors. The ledger is handed back so observers can append follow-up
/// events without holding a reference to it.
pub trait LedgerObserver: Send + Sync {
    fn on_event(&self, event: &LedgerEvent, ledger: &EventLedger);
}

/// Append-only ledger with synchronous observer dispatch.
pub struct EventLedger {
    store: Arc<dyn ProgressionStore>,
    observers: RwLock<Vec<Arc<dyn LedgerObserver>>>,
}

impl EventLedger {
    /// Create a ledger over `store` with no observers.
    pub fn new(store: Arc<dyn ProgressionStore>) -> Self {
        Self {
            store,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer. Observers run in registration order.
    pub fn subscribe(&self, observer: Arc<dyn LedgerObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Persist `event` and dispatch it to every observer.
    pub fn append(&self, event: LedgerEvent) -> Result<LedgerEvent> {
        let stored = self.store.append_event(event)?;
        log::debug!(
            "ledger #{} {} for {} ({})",
            stored.sequence,
            stored.kind.as_tag(),
            stored.learner,
            stored.subject_id
        );

        // Snapshot so no lock is held while observers re-enter the ledger.
        let observers: Vec<Arc<dyn LedgerObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_event(&stored, self);
        }
        Ok(stored)
    }

    /// Events concerning `learner`, in append order.
    pub fn events_for(&self, learner: &LearnerId) -> Result<Vec<LedgerEvent>> {
        self.store.events_for(learner)
    }

    /// Every event, in append order.
    pub fn all_events(&self) -> Result<Vec<LedgerEvent>> {
        self.store.events()
    }
}
