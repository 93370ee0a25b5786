//! The engine-side failure taxonomy and its wire status codes.
//!
//! Every failure the registry or engine can produce is a variant of
//! [`EngineError`]: local, recoverable, and distinguishable from a
//! successful-but-empty output mapping. The interpreter loop turns the
//! first failure into the run's terminal status; nothing propagates as an
//! unstructured fault to the transport layer.
//!
//! [`FaultKind`] is the flattened form that travels in the response
//! envelope as a stable `u32` status code, so clients can classify remote
//! faults without sharing the full error type.

use miette::Diagnostic;
use thiserror::Error;

use crate::codec::CodecError;
use crate::slots::SlotId;

/// A failure during server-side execution of one request.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// An instruction invoked a name with no registered function.
    #[error("function not found: {name}")]
    #[diagnostic(
        code(wiregraph::engine::function_not_found),
        help("register the function on the server before clients invoke it")
    )]
    FunctionNotFound { name: String },

    /// An instruction referenced a slot absent from the value store.
    #[error("missing argument: slot {slot} holds no value")]
    #[diagnostic(code(wiregraph::engine::missing_argument))]
    MissingArgument { slot: SlotId },

    /// A value's bytes did not match the type its consumer expected, or the
    /// argument count disagreed with the registered signature.
    #[error("decode failed: {context}")]
    #[diagnostic(code(wiregraph::engine::decode))]
    Decode {
        context: String,
        #[source]
        source: Option<CodecError>,
    },

    /// An unknown instruction kind or an out-of-range jump target.
    #[error("malformed program: {detail}")]
    #[diagnostic(code(wiregraph::engine::malformed_program))]
    MalformedProgram { detail: String },

    /// The instruction budget ran out before the program terminated.
    #[error("execution limit exceeded after {steps} instructions")]
    #[diagnostic(
        code(wiregraph::engine::limit_exceeded),
        help("raise the step budget with Engine::with_max_steps, or restructure the loop")
    )]
    ExecutionLimitExceeded { steps: usize },
}

impl EngineError {
    /// A [`Decode`](Self::Decode) failure wrapping a codec error.
    pub(crate) fn decode(context: impl Into<String>, source: CodecError) -> Self {
        EngineError::Decode {
            context: context.into(),
            source: Some(source),
        }
    }

    /// A [`Decode`](Self::Decode) failure for an arity mismatch.
    pub(crate) fn arity(name: &str, declared: usize, got: usize) -> Self {
        EngineError::Decode {
            context: format!("function {name} declares {declared} parameters, got {got} arguments"),
            source: None,
        }
    }

    /// The flattened kind, as reported to clients.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            EngineError::FunctionNotFound { .. } => FaultKind::FunctionNotFound,
            EngineError::MissingArgument { .. } => FaultKind::MissingArgument,
            EngineError::Decode { .. } => FaultKind::Decode,
            EngineError::MalformedProgram { .. } => FaultKind::MalformedProgram,
            EngineError::ExecutionLimitExceeded { .. } => FaultKind::ExecutionLimitExceeded,
        }
    }

    /// The wire status code for this failure.
    #[must_use]
    pub fn status_code(&self) -> u32 {
        self.fault_kind().status_code()
    }
}

/// Classification of a remote fault, as carried by the response envelope.
///
/// `BadRequest` and `Internal` are produced by the server shell (an
/// undecodable request payload, a panicking host function) rather than by
/// the engine itself, but share the same channel so every response is
/// structured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    FunctionNotFound,
    MissingArgument,
    Decode,
    MalformedProgram,
    ExecutionLimitExceeded,
    BadRequest,
    Internal,
}

impl FaultKind {
    /// The stable `u32` status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> u32 {
        match self {
            FaultKind::FunctionNotFound => 1,
            FaultKind::MissingArgument => 2,
            FaultKind::Decode => 3,
            FaultKind::MalformedProgram => 4,
            FaultKind::ExecutionLimitExceeded => 5,
            FaultKind::BadRequest => 6,
            FaultKind::Internal => 100,
        }
    }

    /// Maps a wire status code back to a kind. `None` for zero (success)
    /// and for codes this build does not know.
    #[must_use]
    pub const fn from_status(code: u32) -> Option<Self> {
        match code {
            1 => Some(FaultKind::FunctionNotFound),
            2 => Some(FaultKind::MissingArgument),
            3 => Some(FaultKind::Decode),
            4 => Some(FaultKind::MalformedProgram),
            5 => Some(FaultKind::ExecutionLimitExceeded),
            6 => Some(FaultKind::BadRequest),
            100 => Some(FaultKind::Internal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for kind in [
            FaultKind::FunctionNotFound,
            FaultKind::MissingArgument,
            FaultKind::Decode,
            FaultKind::MalformedProgram,
            FaultKind::ExecutionLimitExceeded,
            FaultKind::BadRequest,
            FaultKind::Internal,
        ] {
            assert_eq!(FaultKind::from_status(kind.status_code()), Some(kind));
        }
        assert_eq!(FaultKind::from_status(0), None);
    }
}
