//! A single-threaded executor for driving async device sessions from blocking code.
//!
//! [`Executor::block_on()`] polls one future on the thread that owns the executor and parks the
//! thread while the future is pending. Wakeups may come from any thread (for example a
//! transport's callback thread); a wakeup unparks the owning thread.
//!
//! # Example
//!
//! ```
//! # use dot_executor::Executor;
//! let executor = Executor::new();
//! assert_eq!(executor.block_on(async { 40 + 2 }), 42);
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

thread_local! {
    static BLOCKING: Cell<bool> = const { Cell::new(false) };
}

/// An executor that runs futures on the thread that created it.
///
/// `Executor` is `!Send`: it can be cloned cheaply, but all clones stay on the owning thread.
#[derive(Clone)]
pub struct Executor {
    thread: Thread,
    phantom: PhantomData<*mut ()>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("thread", &self.thread.id())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates a new executor owned by the current thread.
    pub fn new() -> Self {
        Self {
            thread: thread::current(),
            phantom: PhantomData,
        }
    }

    /// Returns `true` if the current thread is inside [`block_on()`][Self::block_on] of any
    /// executor.
    pub fn is_blocking() -> bool {
        BLOCKING.with(Cell::get)
    }

    /// Runs `future` to completion on the current thread.
    ///
    /// The thread parks whenever the future is pending; any waker, from any thread, unparks it.
    ///
    /// # Panics
    ///
    /// Panics if called while the current thread is already inside `block_on`, for example from a
    /// callback invoked by the future being driven. Re-entering the executor from code it is
    /// itself driving is not supported.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let _entered = Entered::enter();

        let signal = Arc::new(Signal {
            woken: AtomicBool::new(true),
            thread: self.thread.clone(),
        });
        let waker = Waker::from(signal.clone());
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(future);

        loop {
            if signal.woken.swap(false, Ordering::AcqRel) {
                if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                    return output;
                }
            }
            if !signal.woken.load(Ordering::Acquire) {
                thread::park();
            }
        }
    }
}

struct Signal {
    woken: AtomicBool,
    thread: Thread,
}

impl Wake for Signal {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

struct Entered;

impl Entered {
    fn enter() -> Self {
        BLOCKING.with(|blocking| {
            assert!(
                !blocking.replace(true),
                "Executor::block_on called from within a future it is driving"
            );
        });
        Entered
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        BLOCKING.with(|blocking| blocking.set(false));
    }
}
