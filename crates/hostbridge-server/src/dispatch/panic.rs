//! Panic containment for host handlers and task bodies.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::OnceCell;

static HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A caught panic: its payload text and the backtrace captured at the panic
/// site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CaughtPanic {
    pub(crate) message: String,
    pub(crate) backtrace: Option<String>,
}

/// Runs `body`, converting a panic into a [`CaughtPanic`].
///
/// The first call installs a panic hook that stores a backtrace in a
/// thread-local slot before delegating to the previous hook.
pub(crate) fn contain<T>(body: impl FnOnce() -> T) -> Result<T, CaughtPanic> {
    install_hook();
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take());
    panic::catch_unwind(AssertUnwindSafe(body)).map_err(|payload| CaughtPanic {
        message: payload_text(payload.as_ref()),
        backtrace: LAST_BACKTRACE.with(|slot| slot.borrow_mut().take()),
    })
}

fn install_hook() {
    HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let captured = Backtrace::force_capture().to_string();
            // Slot may be borrowed if the panic started inside `contain`.
            LAST_BACKTRACE.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(captured);
                }
            });
            previous(info);
        }));
    });
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_when_body_completes() {
        assert_eq!(contain(|| 7), Ok(7));
    }

    #[test]
    fn captures_str_and_string_payloads() {
        let caught = contain(|| panic!("plain")).expect_err("should panic");
        assert_eq!(caught.message, "plain");

        let caught = contain(|| panic!("{}-{}", "formatted", 2)).expect_err("should panic");
        assert_eq!(caught.message, "formatted-2");
        assert!(caught.backtrace.is_some());
    }
}
