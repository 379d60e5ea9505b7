use rayon::ThreadPool;
use tracing::{dispatcher, Span};

/// Runs the control and candidate halves of an invocation.
///
/// Serially, `control` finishes before `candidate` starts. Otherwise both are
/// handed to rayon (the given pool, or the global one) and the calling thread
/// blocks until both have finished. Neither side can cancel the other.
///
/// Either way both halves run inside the caller's current span and
/// subscriber.
pub(crate) fn execute_pair<C, X, RC, RX>(
    serial: bool,
    pool: Option<&ThreadPool>,
    control: C,
    candidate: X,
) -> (RC, RX)
where
    C: FnOnce() -> RC + Send,
    X: FnOnce() -> RX + Send,
    RC: Send,
    RX: Send,
{
    if serial {
        let control = control();
        let candidate = candidate();
        (control, candidate)
    } else {
        let (control, candidate) = (in_current_context(control), in_current_context(candidate));
        match pool {
            Some(pool) => pool.join(control, candidate),
            None => rayon::join(control, candidate),
        }
    }
}

/// Carries the calling thread's subscriber and span over to whichever pool
/// thread ends up running `f`
fn in_current_context<F, R>(f: F) -> impl FnOnce() -> R + Send
where
    F: FnOnce() -> R + Send,
{
    let span = Span::current();
    let dispatch = dispatcher::get_default(|current| current.clone());

    move || dispatcher::with_default(&dispatch, || span.in_scope(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier, Mutex};

    fn current_span_name() -> Option<&'static str> {
        Span::current().metadata().map(|metadata| metadata.name())
    }

    #[test]
    fn serial_runs_control_first() {
        let log = Mutex::new(Vec::new());

        execute_pair(
            true,
            None,
            || log.lock().unwrap().push("control"),
            || log.lock().unwrap().push("candidate"),
        );

        assert_eq!(*log.lock().unwrap(), vec!["control", "candidate"]);
    }

    #[test]
    fn parallel_runs_both_sides_concurrently() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        // Each side waits for the other to arrive, which only completes if
        // the two are actually running at the same time.
        let barrier = Arc::new(Barrier::new(2));

        let (control, candidate) = execute_pair(
            false,
            Some(&pool),
            || {
                barrier.wait();
                1
            },
            || {
                barrier.wait();
                2
            },
        );

        assert_eq!((control, candidate), (1, 2));
    }

    #[test]
    fn one_side_failing_does_not_stop_the_other() {
        let candidate_ran = AtomicBool::new(false);

        let (control, ()): (Result<(), &str>, ()) = execute_pair(
            false,
            None,
            || Err("control failed"),
            || candidate_ran.store(true, Ordering::SeqCst),
        );

        assert!(control.is_err());
        assert!(candidate_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn parallel_halves_run_inside_the_callers_span() {
        let subscriber = tracing_subscriber::registry();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let spans = tracing::subscriber::with_default(subscriber, || {
            let span = tracing::debug_span!("experiment");
            let _entered = span.enter();

            execute_pair(false, Some(&pool), current_span_name, current_span_name)
        });

        assert_eq!(spans, (Some("experiment"), Some("experiment")));
    }
}
