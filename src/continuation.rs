//! Deferred, chainable, single-value producers scheduled on a cooperative event loop.
//!
//! Every VFS and backend filesystem operation returns a `Continuation<T>` instead of
//! blocking. A chain built with [`Continuation::then`] always runs its links in order,
//! and a link never runs synchronously inside the link before it -- the executor yields
//! back to the loop at every `then` boundary, exactly as if each link were scheduled by
//! a fresh wakeup. This is implemented on top of `tokio`'s single-threaded task
//! scheduler rather than hand-rolled refcounting: `then` spawns a successor task that
//! awaits the predecessor and then yields once before running its own body.

use std::future::Future;

use tokio::task::JoinHandle;

/// A deferred producer of a single `T`, chainable with [`then`](Continuation::then).
///
/// Dropping a `Continuation` without awaiting it does not cancel the underlying work;
/// the spawned task still runs to completion on the local task set, matching the
/// "chains run to completion once constructed" guarantee.
#[derive(Debug)]
pub struct Continuation<T: 'static> {
    handle: JoinHandle<T>,
}

impl<T: 'static> Continuation<T> {
    /// Build a continuation from the canonical two-argument form: a body that produces
    /// `T` and may itself await other continuations before finishing.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = T> + 'static,
    {
        Self::spawn(async move { body().await })
    }

    /// Build a continuation from a zero-argument producer: `() -> T`.
    pub fn from_producer<F>(producer: F) -> Self
    where
        F: FnOnce() -> T + 'static,
    {
        Self::spawn(async move { producer() })
    }

    /// Build a continuation that resolves immediately to `value`.
    ///
    /// Used both for the "plain value" construction form and to give dropped or
    /// unresolved chains a well-defined result instead of panicking.
    pub fn from_value(value: T) -> Self {
        Self::spawn(async move { value })
    }

    fn spawn<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = T> + 'static,
    {
        Continuation {
            handle: tokio::task::spawn_local(fut),
        }
    }

    /// Append `next` as the successor of this continuation.
    ///
    /// `next` only starts after this continuation's value is available, and never runs
    /// synchronously in the same poll as the value becoming available: an explicit
    /// `yield_now` sits between them so deeply chained `then`s cannot exhaust the stack.
    pub fn then<U, F, Fut>(self, next: F) -> Continuation<U>
    where
        U: 'static,
        F: FnOnce(T) -> Fut + 'static,
        Fut: Future<Output = U> + 'static,
    {
        Continuation::spawn(async move {
            let prev = self
                .handle
                .await
                .unwrap_or_else(|e| panic!("continuation task panicked: {e}"));
            tokio::task::yield_now().await;
            next(prev).await
        })
    }

    /// Drive the continuation to completion and return its value.
    ///
    /// This is the Rust analogue of handing the chain head a terminal caller: the
    /// executor's body is guaranteed to have run by the time this resolves.
    pub async fn resolve(self) -> T {
        self.handle
            .await
            .unwrap_or_else(|e| panic!("continuation task panicked: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test(flavor = "current_thread")]
    async fn then_runs_in_declared_order() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

                let o1 = order.clone();
                let o2 = order.clone();
                let o3 = order.clone();

                let chain = Continuation::from_producer(move || {
                    o1.borrow_mut().push("a");
                    1
                })
                .then(move |v| {
                    let o2 = o2.clone();
                    async move {
                        o2.borrow_mut().push("b");
                        v + 1
                    }
                })
                .then(move |v| {
                    let o3 = o3.clone();
                    async move {
                        o3.borrow_mut().push("c");
                        v + 1
                    }
                });

                let result = chain.resolve().await;
                assert_eq!(result, 3);
                assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn from_value_resolves_unchanged() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let c = Continuation::from_value(42);
                assert_eq!(c.resolve().await, 42);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn independent_chains_have_no_mutual_ordering_requirement() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let a = Continuation::from_value(1).then(|v| async move { v + 1 });
                let b = Continuation::from_value(10).then(|v| async move { v + 10 });
                let (ra, rb) = futures::join!(a.resolve(), b.resolve());
                assert_eq!(ra, 2);
                assert_eq!(rb, 20);
            })
            .await;
    }
}
