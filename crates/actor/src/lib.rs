//! A lightweight mailbox actor, the concurrency model of the session.
//!
//! All mutations of an actor's state happen inside message handlers,
//! executed strictly in arrival order on a single task. Asynchronous
//! completions (network responses, capture chunks, timer ticks) re-enter
//! the actor as messages, so interleaving can only happen between whole
//! handlers, never inside one.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod runtime;

pub use error::ActorDeadError;
pub use runtime::{Actor, Message};

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u32,
    }

    #[derive(Debug)]
    struct Add(u32);

    impl Message<Counter> for Add {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            state.value += self.0;
        }
    }

    #[derive(Debug)]
    struct Report(oneshot::Sender<u32>);

    impl Message<Counter> for Report {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            self.0.send(state.value).unwrap();
        }
    }

    #[tokio::test]
    async fn test_messages_apply_in_order() {
        let actor = Actor::spawn(Counter::default(), Some("counter"));
        actor.send(Add(40)).unwrap();
        actor.send(Add(2)).unwrap();

        let (tx, rx) = oneshot::channel();
        actor.send(Report(tx)).unwrap();
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_send_after_kill_fails() {
        let actor = Actor::spawn(Counter::default(), None);
        actor.try_kill();

        // The loop exits asynchronously; keep sending until it notices.
        loop {
            if actor.send(Add(1)).is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }
    }
}
