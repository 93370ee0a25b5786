//! Loop emission and backward-jump patching.
//!
//! Both loop forms are two-pass: the exit target of the `JumpIfFalse` test
//! is unknown while the body is being appended, so it is emitted with a
//! placeholder and patched once the closing `Jump` is in place. The
//! forward-reference backpatch happens on the editable instruction list,
//! before the program freezes.

use super::{BuildError, CallBuilder, Handle};
use crate::program::Instruction;

/// Placeholder for a forward-referenced exit target, always patched before
/// the loop emitter returns.
const UNPATCHED: usize = usize::MAX;

impl CallBuilder {
    /// Emits a loop over an already-computed condition handle.
    ///
    /// The same `JumpIfFalse` instruction re-tests the condition's slot at
    /// the top of every iteration, so a body that rebinds the condition
    /// handle (and other loop-carried handles) makes later iterations see
    /// the recomputed values:
    ///
    /// - record the current index as the loop label;
    /// - emit `JumpIfFalse { cond, exit }` with the exit unresolved;
    /// - run `body` (may rebind loop variables);
    /// - emit `Jump` back to the label;
    /// - patch the exit to the index just past that `Jump`.
    pub fn while_loop<F>(&mut self, cond: &Handle, body: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let label = self.instructions.len();
        self.instructions.push(Instruction::JumpIfFalse {
            cond: cond.slot(),
            target: UNPATCHED,
        });

        body(self)?;

        self.instructions.push(Instruction::Jump { target: label });
        let exit = self.instructions.len();
        self.patch_exit(label, exit);
        Ok(())
    }

    /// Emits a loop whose condition is recomputed fresh every pass.
    ///
    /// `cond` is called once at build time to append the condition-computing
    /// instructions and return their handle; at run time the backward jump
    /// returns to the first of those instructions, so the condition is
    /// re-executed before every test.
    pub fn while_loop_with<C, F>(&mut self, cond: C, body: F) -> Result<(), BuildError>
    where
        C: FnOnce(&mut Self) -> Result<Handle, BuildError>,
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let cond_start = self.instructions.len();
        let cond_handle = cond(self)?;

        let test_at = self.instructions.len();
        self.instructions.push(Instruction::JumpIfFalse {
            cond: cond_handle.slot(),
            target: UNPATCHED,
        });

        body(self)?;

        self.instructions.push(Instruction::Jump { target: cond_start });
        let exit = self.instructions.len();
        self.patch_exit(test_at, exit);
        Ok(())
    }

    fn patch_exit(&mut self, test_at: usize, exit: usize) {
        match &mut self.instructions[test_at] {
            Instruction::JumpIfFalse { target, .. } => *target = exit,
            other => unreachable!("loop label points at non-branch instruction {other:?}"),
        }
    }
}
