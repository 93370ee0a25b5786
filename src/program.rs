//! Programs: ordered instruction sequences plus requested outputs.
//!
//! A [`Program`] is the immutable half of a request: the instruction list
//! the engine walks and the slot ids whose final values the caller wants
//! back. Builders assemble programs in an editable form and freeze them
//! here; after that nothing mutates them.
//!
//! On the wire every instruction is one positional struct
//! `{kind, result, target, name, args}` with neutral values in the fields a
//! given kind does not use. Unrecognized kinds survive decoding as
//! [`Instruction::Unknown`] so that execution reaches them (and the
//! instructions before them still run) before the engine reports the
//! program as malformed.

use serde::{Deserialize, Serialize};

use crate::slots::SlotId;

/// Wire discriminant for [`Instruction::Invoke`].
pub const KIND_INVOKE: u32 = 0;
/// Wire discriminant for [`Instruction::Return`].
pub const KIND_RETURN: u32 = 1;
/// Wire discriminant for [`Instruction::Jump`].
pub const KIND_JUMP: u32 = 2;
/// Wire discriminant for [`Instruction::JumpIfTrue`].
pub const KIND_JUMP_TRUE: u32 = 3;
/// Wire discriminant for [`Instruction::JumpIfFalse`].
pub const KIND_JUMP_FALSE: u32 = 4;

/// Neutral jump target carried by instruction kinds that never jump.
const NEUTRAL_TARGET: u64 = u64::MAX;

/// One step of a [`Program`].
///
/// Jump targets are instruction indices in `0..=len`; a target equal to the
/// program length means "terminate after the last instruction" and is
/// valid. Targets outside that range are detected by the engine, not here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Call the named host function with the values at `args`, storing the
    /// encoded return value at `result` (discarded when `result` is
    /// [`SlotId::UNASSIGNED`]).
    Invoke {
        name: String,
        args: Vec<SlotId>,
        result: SlotId,
    },
    /// Terminate execution immediately (non-error stop).
    Return,
    /// Unconditional transfer to instruction index `target`.
    Jump { target: usize },
    /// Branch to `target` when the boolean at `cond` is true.
    JumpIfTrue { cond: SlotId, target: usize },
    /// Branch to `target` when the boolean at `cond` is false.
    JumpIfFalse { cond: SlotId, target: usize },
    /// An instruction kind this build does not understand. Reaching one at
    /// execution time is a malformed-program failure.
    Unknown { kind: u32 },
}

/// Ordered-field wire form of one instruction.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RawInstruction {
    pub kind: u32,
    pub result: SlotId,
    pub target: u64,
    pub name: String,
    pub args: Vec<SlotId>,
}

impl Instruction {
    pub(crate) fn to_raw(&self) -> RawInstruction {
        match self {
            Instruction::Invoke { name, args, result } => RawInstruction {
                kind: KIND_INVOKE,
                result: *result,
                target: NEUTRAL_TARGET,
                name: name.clone(),
                args: args.clone(),
            },
            Instruction::Return => RawInstruction {
                kind: KIND_RETURN,
                result: SlotId::UNASSIGNED,
                target: NEUTRAL_TARGET,
                name: String::new(),
                args: Vec::new(),
            },
            Instruction::Jump { target } => RawInstruction {
                kind: KIND_JUMP,
                result: SlotId::UNASSIGNED,
                target: *target as u64,
                name: String::new(),
                args: Vec::new(),
            },
            Instruction::JumpIfTrue { cond, target } => RawInstruction {
                kind: KIND_JUMP_TRUE,
                result: SlotId::UNASSIGNED,
                target: *target as u64,
                name: String::new(),
                args: vec![*cond],
            },
            Instruction::JumpIfFalse { cond, target } => RawInstruction {
                kind: KIND_JUMP_FALSE,
                result: SlotId::UNASSIGNED,
                target: *target as u64,
                name: String::new(),
                args: vec![*cond],
            },
            Instruction::Unknown { kind } => RawInstruction {
                kind: *kind,
                result: SlotId::UNASSIGNED,
                target: NEUTRAL_TARGET,
                name: String::new(),
                args: Vec::new(),
            },
        }
    }

    pub(crate) fn from_raw(raw: RawInstruction) -> Instruction {
        // Out-of-range targets saturate to usize::MAX; the engine rejects
        // them as malformed when reached.
        let target = usize::try_from(raw.target).unwrap_or(usize::MAX);
        // A branch missing its condition slot falls back to the sentinel,
        // which no store ever contains, so execution reports MissingArgument.
        let cond = raw.args.first().copied().unwrap_or(SlotId::UNASSIGNED);
        match raw.kind {
            KIND_INVOKE => Instruction::Invoke {
                name: raw.name,
                args: raw.args,
                result: raw.result,
            },
            KIND_RETURN => Instruction::Return,
            KIND_JUMP => Instruction::Jump { target },
            KIND_JUMP_TRUE => Instruction::JumpIfTrue { cond, target },
            KIND_JUMP_FALSE => Instruction::JumpIfFalse { cond, target },
            kind => Instruction::Unknown { kind },
        }
    }
}

/// Immutable instruction sequence plus requested output slots.
///
/// Built once per call, consumed exactly once by the engine, discarded when
/// the response is assembled. The output list is ordered as the caller gave
/// it; duplicates and an empty list are both legal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    outputs: Vec<SlotId>,
}

impl Program {
    /// Assembles a program from its parts.
    ///
    /// Normally produced by [`CallBuilder::build`](crate::builder::CallBuilder::build);
    /// constructing one by hand is useful for embedding and tests.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>, outputs: Vec<SlotId>) -> Self {
        Self {
            instructions,
            outputs,
        }
    }

    /// The instruction sequence.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The requested output slot ids, in request order.
    #[must_use]
    pub fn outputs(&self) -> &[SlotId] {
        &self.outputs
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` for a program with no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Checks a function name against the `^[A-Za-z0-9_/]+$` charset rule.
///
/// Enforced both at registration and at build time; invalid names are
/// rejected, never silently accepted.
#[must_use]
pub fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'/')
}
