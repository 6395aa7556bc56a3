use log::error;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static SUPPRESS_EXIT: Cell<bool> = const { Cell::new(false) };
}

/// Installs the process panic hook: readable backtraces in debug builds, a
/// crash report in release builds. Panics raised inside
/// [`with_panic_exit_suppressed`] are only logged so the caller can recover.
pub fn initialize_panic_handler() {
    #[cfg(debug_assertions)]
    better_panic::Settings::debug()
        .most_recent_first(false)
        .lineno_suffix(true)
        .install();

    #[cfg(not(debug_assertions))]
    human_panic::setup_panic!();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let suppress = SUPPRESS_EXIT.with(|flag| flag.get());
        if suppress {
            error!("Suppressed panic: {}", payload_message(panic_info.payload()));
            return;
        }

        default_hook(panic_info);
        std::process::exit(1);
    }));
}

pub fn with_panic_exit_suppressed<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    struct ExitGuard(bool);
    impl Drop for ExitGuard {
        fn drop(&mut self) {
            SUPPRESS_EXIT.with(|flag| flag.set(self.0));
        }
    }

    let previous = SUPPRESS_EXIT.with(|flag| {
        let prev = flag.get();
        flag.set(true);
        prev
    });
    let guard = ExitGuard(previous);
    let result = f();
    drop(guard);
    result
}

/// Runs one conversion, turning a panic into an error message.
pub fn catch_conversion_panic<F, T>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    with_panic_exit_suppressed(|| panic::catch_unwind(AssertUnwindSafe(f)))
        .map_err(|payload| payload_message(payload.as_ref()))
}

pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with unknown payload".to_string()
    }
}
