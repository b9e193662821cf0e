//! Cancellables registered by a coroutine's frames (spec section 4.5.3):
//! invoked in reverse registration order when the coroutine is forcibly
//! terminated. A cancellable never gets scheduler access, so it can't
//! re-enter the tick loop while running.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CancelToken(usize);

#[derive(Default)]
pub struct CancelList {
    entries: Vec<Option<Box<dyn FnOnce()>>>,
}

impl CancelList {
    /// `cancel_init` in spec section 4.5.3.
    pub fn new() -> Self {
        CancelList::default()
    }

    /// `register_cancel`.
    pub fn register_cancel(&mut self, f: impl FnOnce() + 'static) -> CancelToken {
        self.entries.push(Some(Box::new(f)));
        CancelToken(self.entries.len() - 1)
    }

    /// `unregister_cancel`. A no-op if `token` was already run or
    /// unregistered.
    pub fn unregister_cancel(&mut self, token: CancelToken) {
        if let Some(slot) = self.entries.get_mut(token.0) {
            *slot = None;
        }
    }

    /// Runs every still-registered cancellable in reverse registration
    /// order, then empties the list.
    pub fn cancel_all(&mut self) {
        for slot in self.entries.drain(..).rev() {
            if let Some(f) = slot {
                f();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn cancel_all_runs_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut list = CancelList::new();
        for i in 0..3 {
            let order = order.clone();
            list.register_cancel(move || order.borrow_mut().push(i));
        }
        list.cancel_all();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn unregistered_cancellable_does_not_run() {
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        let mut list = CancelList::new();
        let token = list.register_cancel(move || *ran2.borrow_mut() = true);
        list.unregister_cancel(token);
        list.cancel_all();
        assert!(!*ran.borrow());
    }
}
