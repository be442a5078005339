use tokio::sync::mpsc;

use crate::transaction::TransactionMessage;
use crate::transaction::fsm::{State, TransactionContext, TransactionFsm, fail_transaction};

/// Drives one transaction: a lightweight task owning the state machine, its
/// inbox and its timer wheel.
///
/// All events of a transaction are processed strictly sequentially here;
/// producers only ever touch the inbox sender.
pub(crate) struct TransactionRunner<M> {
    rx: mpsc::Receiver<TransactionMessage>,
    /// Our own registry entry, for the compare-and-remove at teardown.
    entry: mpsc::Sender<TransactionMessage>,
    machine: M,
    ctx: TransactionContext,
}

impl<M: TransactionFsm> TransactionRunner<M> {
    pub(crate) fn new(
        rx: mpsc::Receiver<TransactionMessage>,
        entry: mpsc::Sender<TransactionMessage>,
        machine: M,
        ctx: TransactionContext,
    ) -> Self {
        Self {
            rx,
            entry,
            machine,
            ctx,
        }
    }

    /// Spawns the runner; the machine's start actions already ran.
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run(false));
    }

    /// Spawns the runner and runs the machine's start actions first.
    pub(crate) fn spawn_and_start(self) {
        tokio::spawn(self.run(true));
    }

    async fn run(mut self, start: bool) {
        if start && let Err(err) = self.machine.start(&mut self.ctx).await {
            log::warn!("Transaction {}: failed to start: {}", self.ctx.key, err);
            self.ctx.set_state(State::Terminated);
        }

        while self.ctx.state() != State::Terminated {
            tokio::select! {
                biased;

                msg = self.rx.recv() => match msg {
                    Some(TransactionMessage::Terminate) | None => {
                        self.ctx.set_state(State::Terminated);
                    }
                    Some(TransactionMessage::TransportError(reason)) => {
                        fail_transaction(&mut self.ctx, reason).await;
                    }
                    Some(msg) => {
                        if let Err(err) = self.machine.on_message(&mut self.ctx, msg).await {
                            log::warn!("Transaction {}: {}", self.ctx.key, err);
                        }
                    }
                },

                Some(timer) = self.ctx.timers.next_expired() => {
                    if let Err(err) = self.machine.on_timer(&mut self.ctx, timer).await {
                        log::warn!("Transaction {}: {}", self.ctx.key, err);
                    }
                }
            }
        }

        self.shutdown();
    }

    // Terminal teardown: unregister first so new events route as misses,
    // then disarm timers, then drain whatever raced into the inbox.
    fn shutdown(mut self) {
        self.ctx
            .endpoint
            .transactions()
            .unregister(&self.ctx.key, &self.entry);

        self.ctx.timers.clear();
        debug_assert_eq!(self.ctx.timers.armed(), 0);

        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        log::trace!("Transaction {} terminated", self.ctx.key);
    }
}
