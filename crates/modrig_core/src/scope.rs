//! Scoped save/restore of shared mutable state.
//!
//! A [`ValueGuard`] swaps a new value into a slot of its owner and puts the
//! old value back when dropped, on every exit path. The guard dereferences
//! to the owner so guards nest by reborrowing through each other.

use std::ops::{Deref, DerefMut};

/// Installs a value into `slot(owner)` for the lifetime of the guard
pub struct ValueGuard<'a, O: ?Sized, T> {
    owner: &'a mut O,
    slot: fn(&mut O) -> &mut T,
    saved: Option<T>,
}

impl<'a, O: ?Sized, T> ValueGuard<'a, O, T> {
    /// Swap `value` into the slot, remembering the previous value
    pub fn new(owner: &'a mut O, slot: fn(&mut O) -> &mut T, value: T) -> Self {
        let saved = std::mem::replace(slot(owner), value);
        Self {
            owner,
            slot,
            saved: Some(saved),
        }
    }

    /// The value that will be restored on drop
    #[must_use]
    pub fn saved(&self) -> Option<&T> {
        self.saved.as_ref()
    }
}

impl<O: ?Sized, T> Deref for ValueGuard<'_, O, T> {
    type Target = O;

    fn deref(&self) -> &O {
        self.owner
    }
}

impl<O: ?Sized, T> DerefMut for ValueGuard<'_, O, T> {
    fn deref_mut(&mut self) -> &mut O {
        self.owner
    }
}

impl<O: ?Sized, T> Drop for ValueGuard<'_, O, T> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *(self.slot)(self.owner) = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Context {
        module: Option<String>,
        candidates: Vec<u32>,
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut ctx = Context::default();
        {
            let guard = ValueGuard::new(&mut ctx, |c| &mut c.module, Some("Leg".to_string()));
            assert_eq!(guard.module.as_deref(), Some("Leg"));
            assert_eq!(guard.saved(), Some(&None));
        }
        assert!(ctx.module.is_none());
    }

    #[test]
    fn test_guards_nest() {
        let mut ctx = Context {
            module: Some("Outer".to_string()),
            candidates: vec![1],
        };
        {
            let mut outer = ValueGuard::new(&mut ctx, |c| &mut c.module, Some("Leg".to_string()));
            {
                let mut inner = ValueGuard::new(&mut *outer, |c| &mut c.candidates, vec![7, 8]);
                inner.candidates.push(9);
                assert_eq!(inner.module.as_deref(), Some("Leg"));
                assert_eq!(inner.candidates, vec![7, 8, 9]);
            }
            assert_eq!(outer.candidates, vec![1]);
        }
        assert_eq!(ctx.module.as_deref(), Some("Outer"));
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn run(ctx: &mut Context) -> Option<()> {
            let guard = ValueGuard::new(ctx, |c| &mut c.candidates, vec![42]);
            let first = guard.candidates.first().copied()?;
            if first == 42 {
                return None;
            }
            Some(())
        }

        let mut ctx = Context::default();
        assert!(run(&mut ctx).is_none());
        assert!(ctx.candidates.is_empty());
    }
}
