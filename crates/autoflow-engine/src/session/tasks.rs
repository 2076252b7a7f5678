//! Background tasks owned by the active session.
//!
//! One task advances receipts, one posts yield. Both are cancelled through
//! a shared token and aborted on shutdown, so stopping them is a structural
//! guarantee of the session lifecycle rather than a cleanup step that can
//! be forgotten.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::provider::WalletProvider;
use crate::session::SessionEngine;

pub(super) struct SessionTasks {
    cancel: CancellationToken,
    receipt_task: JoinHandle<()>,
    yield_task: JoinHandle<()>,
}

impl SessionTasks {
    pub(super) fn spawn<P: WalletProvider>(
        engine: SessionEngine<P>,
        receipt_interval: Duration,
        accrual_interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();

        let receipt_task = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut timer = interval(receipt_interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first interval tick completes immediately.
                timer.tick().await;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = timer.tick() => engine.tick_receipts().await,
                    }
                }
            })
        };

        let yield_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut timer = interval(accrual_interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                timer.tick().await;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = timer.tick() => engine.tick_yield().await,
                    }
                }
            })
        };

        Self {
            cancel,
            receipt_task,
            yield_task,
        }
    }

    /// Stops both tasks; after this returns neither will tick again.
    pub(super) fn shutdown(self) {
        self.cancel.cancel();
        self.receipt_task.abort();
        self.yield_task.abort();
    }
}
