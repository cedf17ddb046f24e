use std::fmt::Debug;
use std::sync::{Arc, Weak};

use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use crate::ActorDeadError;

/// A message that an actor with state `S` can handle.
pub trait Message<S>: Send + Debug + 'static {
    /// Handles the message with mutable access to the actor's state.
    ///
    /// `handle` is the actor's own handle, for handlers that need to
    /// schedule follow-up messages.
    fn handle(self, state: &mut S, handle: &Actor<S>);
}

trait Envelope<S>: Send + Debug + 'static {
    fn deliver(self: Box<Self>, state: &mut S, handle: &Actor<S>);
}

impl<S, M: Message<S>> Envelope<S> for M {
    #[inline]
    fn deliver(self: Box<Self>, state: &mut S, handle: &Actor<S>) {
        (*self).handle(state, handle)
    }
}

struct Mailbox<S> {
    msg_tx: mpsc::UnboundedSender<Box<dyn Envelope<S>>>,
    kill_tx: watch::Sender<bool>,
}

/// Handle to an actor.
///
/// The handle is cheaply cloneable. When the last handle is dropped the
/// actor stops handling further messages, drains nothing, and drops its
/// state, which is where owned resources get released.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + Sync + 'static> Actor<S> {
    /// Spawns a new actor with the given state and an optional label for
    /// tracing.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let mailbox = Arc::new(Mailbox { msg_tx, kill_tx });
        tokio::spawn(
            run_loop(Arc::downgrade(&mailbox), state, msg_rx, kill_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S>>(&self, msg: M) -> Result<(), ActorDeadError> {
        self.mailbox
            .msg_tx
            .send(Box::new(msg))
            .map_err(|_| ActorDeadError)
    }

    /// Requests the actor to terminate.
    ///
    /// Termination is not immediate, but the actor will stop handling
    /// further messages and quit soon.
    #[inline]
    pub fn try_kill(&self) {
        self.mailbox.kill_tx.send(true).ok();
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

async fn run_loop<S: Send + Sync + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Envelope<S>>>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => break,
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        // Upgrade only for the duration of one handler, so a dropped
        // last handle still terminates the loop on the next turn.
        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last handle has been dropped, discarding the message");
            break;
        };
        let handle = Actor { mailbox };
        msg.deliver(&mut state, &handle);
    }
    debug!("terminating");
}
