//! Per-thread active context
//!
//! Applications that prefer a "current context" style can register one
//! context per thread and reach it from anywhere on that thread. The
//! registry holds a weak reference only; dropping the last strong handle
//! deactivates it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::context::LightingContext;

/// Shared handle to a context
pub type SharedContext = Rc<RefCell<LightingContext>>;

thread_local! {
    static ACTIVE: RefCell<Weak<RefCell<LightingContext>>> = RefCell::new(Weak::new());
}

/// Make `context` the active one on this thread
pub fn set_active(context: &SharedContext) {
    ACTIVE.with(|active| *active.borrow_mut() = Rc::downgrade(context));
}

/// Active context on this thread, if it is still alive
pub fn active() -> Option<SharedContext> {
    ACTIVE.with(|active| active.borrow().upgrade())
}

/// Forget the active context on this thread
pub fn clear_active() {
    ACTIVE.with(|active| *active.borrow_mut() = Weak::new());
}

/// Run `f` against the active context; `None` when there is none
///
/// Logs an error when nothing is active, matching how the light operations
/// report a bad index.
pub fn with_active<R>(f: impl FnOnce(&mut LightingContext) -> R) -> Option<R> {
    let Some(context) = active() else {
        log::error!("LIGHTING: No active lighting context on this thread");
        return None;
    };
    let Ok(mut context) = context.try_borrow_mut() else {
        log::error!("LIGHTING: Active lighting context is already borrowed");
        return None;
    };
    Some(f(&mut context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::HeadlessBackend;

    fn shared_context() -> SharedContext {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        Rc::new(RefCell::new(LightingContext::new(backend, 2).expect("context")))
    }

    #[test]
    fn test_set_and_use_active() {
        let context = shared_context();
        set_active(&context);

        let count = with_active(|ctx| {
            ctx.use_light(1, true);
            ctx.light_count()
        });
        assert_eq!(count, Some(2));
        assert!(context.borrow().is_light_used(1));
        clear_active();
        assert!(active().is_none());
    }

    #[test]
    fn test_dropped_context_is_inactive() {
        let context = shared_context();
        set_active(&context);
        drop(context);
        assert!(active().is_none());
        assert_eq!(with_active(|ctx| ctx.light_count()), None);
    }

    #[test]
    fn test_switching_contexts() {
        let first = shared_context();
        let second = shared_context();
        set_active(&first);
        set_active(&second);
        let active = active().expect("active context");
        assert!(Rc::ptr_eq(&active, &second));
        clear_active();
    }
}
