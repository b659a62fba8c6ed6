//! RAII frame switching for the interpreter.
//!
//! The guard holds `&mut Interpreter` and derefs to it, so code inside a
//! block keeps full access to the interpreter while the entered frame is
//! current. Dropping the guard (also while unwinding) restores the previous
//! frame and releases the pin that kept the entered frame alive.

use std::ops::{Deref, DerefMut};

use rill_runtime::{EvalError, ObjectId};

use super::Interpreter;

pub struct ScopedInterpreter<'a> {
    interpreter: &'a mut Interpreter,
    previous: ObjectId,
}

impl Drop for ScopedInterpreter<'_> {
    fn drop(&mut self) {
        self.interpreter.scope.leave(self.previous);
    }
}

impl Deref for ScopedInterpreter<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interpreter
    }
}

impl DerefMut for ScopedInterpreter<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interpreter
    }
}

impl Interpreter {
    /// Make `frame` current until the returned guard drops.
    pub fn scoped(&mut self, frame: ObjectId) -> Result<ScopedInterpreter<'_>, EvalError> {
        let previous = self.scope.switch_to(frame)?;
        Ok(ScopedInterpreter {
            interpreter: self,
            previous,
        })
    }

    /// Run `f` with `frame` current.
    pub fn with_frame<T>(
        &mut self,
        frame: ObjectId,
        f: impl FnOnce(&mut ScopedInterpreter<'_>) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        let mut scoped = self.scoped(frame)?;
        f(&mut scoped)
    }
}
