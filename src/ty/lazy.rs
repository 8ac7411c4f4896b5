//! Lazily-evaluated member and parameter types.
//!
//! A slot starts out holding a thunk and caches the thunk's result on first
//! successful evaluation. The transition is one-way: once resolved, a slot
//! never goes back to the thunk. Concurrent readers either see the cached
//! type or serialize on the thunk lock, so the thunk runs at most once
//! successfully; a failing thunk stays in place and may be retried.

use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::ty::QualifiedType;

pub type TypeThunk = Box<dyn Fn() -> Result<QualifiedType> + Send + Sync>;

pub struct LazyType {
    resolved: OnceLock<QualifiedType>,
    thunk: Mutex<Option<TypeThunk>>,
}

impl LazyType {
    pub fn new(thunk: TypeThunk) -> LazyType {
        LazyType {
            resolved: OnceLock::new(),
            thunk: Mutex::new(Some(thunk)),
        }
    }

    /// A slot that is already resolved.
    pub fn resolved(qualified_type: QualifiedType) -> LazyType {
        let cell = OnceLock::new();
        let _ = cell.set(qualified_type);
        LazyType {
            resolved: cell,
            thunk: Mutex::new(None),
        }
    }

    /// Evaluates the slot, caching the result. Idempotent and thread-safe.
    pub fn get(&self) -> Result<QualifiedType> {
        if let Some(qualified_type) = self.resolved.get() {
            return Ok(qualified_type.clone());
        }
        let mut thunk = self.thunk.lock();
        // Lost the race: the winner resolved the slot while we waited.
        if let Some(qualified_type) = self.resolved.get() {
            return Ok(qualified_type.clone());
        }
        let qualified_type = match &*thunk {
            Some(evaluate) => evaluate()?,
            None => {
                return Err(Error::Other(
                    "lazy type slot has neither thunk nor value".into(),
                ))
            }
        };
        let _ = self.resolved.set(qualified_type.clone());
        *thunk = None;
        Ok(qualified_type)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl fmt::Debug for LazyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved.get() {
            Some(qualified_type) => {
                f.debug_tuple("LazyType").field(qualified_type).finish()
            }
            None => f.write_str("LazyType(<unevaluated>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn thunk_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let lazy = LazyType::new(Box::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok(QualifiedType::unqualified(Type::void()))
        }));
        assert!(!lazy.is_resolved());
        lazy.get().unwrap();
        lazy.get().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_resolved());
    }

    #[test]
    fn failing_thunk_can_be_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let lazy = LazyType::new(Box::new(move || {
            if calls2.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Lookup("not yet".into()))
            } else {
                Ok(QualifiedType::unqualified(Type::void()))
            }
        }));
        assert!(lazy.get().is_err());
        assert!(!lazy.is_resolved());
        lazy.get().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_readers_agree() {
        let lazy = Arc::new(LazyType::new(Box::new(|| {
            Ok(QualifiedType::unqualified(Type::void()))
        })));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                std::thread::spawn(move || lazy.get().unwrap())
            })
            .collect();
        for thread in threads {
            let qualified_type = thread.join().unwrap();
            assert!(Type::ptr_eq(
                &qualified_type.ty,
                &lazy.get().unwrap().ty
            ));
        }
    }
}
