//! A test-runner for detecting data-races and race-conditions.

use std::{
    any::Any,
    hint, mem, panic,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

type Step<Global, Local> = Box<dyn Fn(&Global, &mut Local) + Send + Sync + 'static>;

/// LockstepBuilder, a builder for a `Lockstep` instance.
///
/// The builder registers:
///
/// -   A Global state, shared across all threads.
/// -   N instances of a Local state, each dedicated to a single thread, and thus determining the number of threads.
/// -   S steps, run in order on each thread, each starting on all threads at once.
///
/// #   Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use privheap_test::LockstepBuilder;
///
/// let mut builder = LockstepBuilder::new(AtomicUsize::new(0), vec![1, 10]);
///
/// builder.add_step(|global: &AtomicUsize, local: &mut usize| { global.fetch_add(*local, Ordering::Relaxed); });
///
/// let lockstep = builder.launch(4);
///
/// assert_eq!(vec![1, 10], lockstep.join());
/// ```
pub struct LockstepBuilder<Global, Local> {
    global: Arc<Global>,
    locals: Vec<Local>,
    steps: Vec<Step<Global, Local>>,
}

impl<Global, Local> LockstepBuilder<Global, Local>
    where
        Global: Send + Sync + 'static,
        Local: Send + 'static,
{
    /// Creates a new instance, with one thread per instance of `Local`.
    pub fn new(global: Global, locals: Vec<Local>) -> Self {
        Self { global: Arc::new(global), locals, steps: Vec::new() }
    }

    /// Adds a step, run on each thread.
    pub fn add_step<F>(&mut self, step: F)
        where
            F: Fn(&Global, &mut Local) + Send + Sync + 'static,
    {
        self.steps.push(Box::new(step));
    }

    /// Creates the Lockstep instance, which runs the series of steps `iterations` times.
    ///
    /// The threads start immediately.
    ///
    /// #   Panics
    ///
    /// -   If there is no thread, or no step.
    pub fn launch(self, iterations: usize) -> Lockstep<Global, Local> {
        assert!(!self.locals.is_empty(), "Cannot launch a lock-step test without a single thread");
        assert!(!self.steps.is_empty(), "Cannot launch a lock-step test without a single step");

        let gate = Arc::new(Gate::new(self.locals.len()));
        let steps = Arc::new(self.steps);

        let threads = self.locals.into_iter()
            .map(|mut local| {
                let global = self.global.clone();
                let gate = gate.clone();
                let steps = steps.clone();

                thread::spawn(move || {
                    let guard = PoisonGuard(&*gate);

                    for _ in 0..iterations {
                        for step in &*steps {
                            gate.wait();

                            step(&*global, &mut local);
                        }
                    }

                    mem::forget(guard);

                    local
                })
            })
            .collect();

        Lockstep { global: self.global, threads }
    }
}

/// Lockstep, a set of threads running steps in lock-step.
///
/// Constructing a `Lockstep` is done through a `LockstepBuilder`.
pub struct Lockstep<Global, Local> {
    global: Arc<Global>,
    threads: Vec<JoinHandle<Local>>,
}

impl<Global, Local> Lockstep<Global, Local> {
    /// Returns a reference to the Global state.
    ///
    /// #   Warning
    ///
    /// Access is provided _without_ joining the threads first.
    pub fn global(&self) -> &Global { &self.global }

    /// Joins the threads, and returns their Local states, in the order they were registered.
    ///
    /// #   Panics
    ///
    /// -   If any of the threads panicked, with the panic of the first thread to fail on its own.
    pub fn join(mut self) -> Vec<Local> {
        let mut locals = Vec::with_capacity(self.threads.len());
        //  (genuine, payload) of the failure to report.
        let mut failure: Option<(bool, Box<dyn Any + Send>)> = None;

        for handle in mem::take(&mut self.threads) {
            match handle.join() {
                Ok(local) => locals.push(local),
                Err(payload) => {
                    let genuine = payload.downcast_ref::<&str>() != Some(&ABANDONED);

                    let replace = match &failure {
                        None => true,
                        Some((reported, _)) => genuine && !reported,
                    };

                    if replace {
                        failure = Some((genuine, payload));
                    }
                }
            }
        }

        if let Some((_, payload)) = failure {
            panic::resume_unwind(payload);
        }

        locals
    }
}

impl<Global, Local> Drop for Lockstep<Global, Local> {
    fn drop(&mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

//
//  Implementation details
//

const ABANDONED: &str = "A sibling thread panicked, abandoning ship!";

//  Reusable barrier: the last thread to arrive opens the gate for all, and closes it behind them.
struct Gate {
    count: usize,
    arrived: AtomicUsize,
    generation: AtomicUsize,
    poisoned: AtomicBool,
}

impl Gate {
    fn new(count: usize) -> Self {
        Self { count, arrived: AtomicUsize::new(0), generation: AtomicUsize::new(0), poisoned: AtomicBool::new(false) }
    }

    fn wait(&self) {
        let generation = self.generation.load(Ordering::Acquire);

        if self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.count {
            self.arrived.store(0, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
            return;
        }

        let mut spins = 0u32;

        while self.generation.load(Ordering::Acquire) == generation {
            if self.poisoned.load(Ordering::Relaxed) {
                abandon_ship();
            }

            spins = spins.wrapping_add(1);

            if spins % 64 == 0 {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
    }

    fn poison(&self) { self.poisoned.store(true, Ordering::Relaxed); }
}

//  If a single thread panics, then all threads must abort, lest they wait forever.
struct PoisonGuard<'a>(&'a Gate);

impl<'a> Drop for PoisonGuard<'a> {
    fn drop(&mut self) { self.0.poison(); }
}

#[cold]
#[inline(never)]
fn abandon_ship() -> ! {
    panic::panic_any(ABANDONED)
}
