//! The bounded, sequential program interpreter.
//!
//! One engine run consumes one program against one working value store:
//! instructions execute strictly one at a time in program-counter order,
//! with no intra-request parallelism and no preemption. The only bound on
//! runtime is the instruction budget (a hard cap on dispatched
//! instructions, independent of loop logic), and exhausting it is an
//! explicit [`EngineError::ExecutionLimitExceeded`] failure, never a silent
//! stop with partial state.

use tracing::{debug, instrument};

use crate::errors::EngineError;
use crate::program::{Instruction, Program};
use crate::registry::FunctionRegistry;
use crate::slots::{SlotId, ValueStore};

/// Default instruction budget per run.
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Interpreter for one request's program.
///
/// Stateless between runs; a single engine value can serve any number of
/// sequential or concurrent requests, each with its own store.
#[derive(Clone, Copy, Debug)]
pub struct Engine {
    max_steps: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the default instruction budget.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Overrides the instruction budget.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// The configured instruction budget.
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Executes `program` against `store` and `registry`.
    ///
    /// On success, returns the output mapping: the current values of the
    /// program's output slots, with requested-but-never-written slots
    /// simply absent. On any failure no outputs are produced, so callers
    /// never observe partial results.
    ///
    /// # Errors
    ///
    /// The first failing instruction terminates the run with its
    /// [`EngineError`]; see the crate's error taxonomy.
    #[instrument(skip_all, fields(instructions = program.len(), budget = self.max_steps))]
    pub fn run(
        &self,
        program: &Program,
        store: &mut ValueStore,
        registry: &FunctionRegistry,
    ) -> Result<ValueStore, EngineError> {
        let len = program.len();
        let mut pc = 0usize;
        let mut steps = 0usize;

        while pc < len {
            if steps == self.max_steps {
                return Err(EngineError::ExecutionLimitExceeded { steps });
            }
            steps += 1;

            match &program.instructions()[pc] {
                Instruction::Invoke { name, args, result } => {
                    debug!(pc, function = %name, "invoke");
                    let bytes = registry.invoke(name, store, args)?;
                    // An unassigned result means nobody captured the value;
                    // the sentinel slot must never hold one.
                    if !result.is_unassigned() {
                        store.insert(*result, bytes);
                    }
                    pc += 1;
                }
                Instruction::Return => break,
                Instruction::Jump { target } => {
                    pc = Self::checked_target(*target, len)?;
                }
                Instruction::JumpIfTrue { cond, target } => {
                    if Self::test(store, *cond)? {
                        pc = Self::checked_target(*target, len)?;
                    } else {
                        pc += 1;
                    }
                }
                Instruction::JumpIfFalse { cond, target } => {
                    if Self::test(store, *cond)? {
                        pc += 1;
                    } else {
                        pc = Self::checked_target(*target, len)?;
                    }
                }
                Instruction::Unknown { kind } => {
                    return Err(EngineError::MalformedProgram {
                        detail: format!("unknown instruction kind {kind} at index {pc}"),
                    });
                }
            }
        }

        debug!(steps, "run complete");
        let mut outputs = ValueStore::new();
        for slot in program.outputs() {
            if let Some(bytes) = store.get(*slot) {
                outputs.insert(*slot, bytes.to_vec());
            }
        }
        Ok(outputs)
    }

    /// Decodes a branch condition from `cond`.
    fn test(store: &ValueStore, cond: SlotId) -> Result<bool, EngineError> {
        let bytes = store
            .get(cond)
            .ok_or(EngineError::MissingArgument { slot: cond })?;
        crate::codec::decode_bool(bytes)
            .map_err(|source| EngineError::decode("branch condition", source))
    }

    /// Validates a jump target. `len` itself is legal and means "terminate
    /// after the last instruction".
    fn checked_target(target: usize, len: usize) -> Result<usize, EngineError> {
        if target > len {
            return Err(EngineError::MalformedProgram {
                detail: format!("jump target {target} outside 0..={len}"),
            });
        }
        Ok(target)
    }
}
