// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Contract with the hardware-procedure invocation layer.
//!
//! Procedures are external. All this crate needs is a way to call one, learn
//! whether it failed, and carry the diagnostic data it produced along with
//! the failure without ever looking inside it.

use core::fmt;
use serde::Serialize;
use thiserror::Error;

/// Opaque diagnostic payload attached to a failure.
#[derive(Clone, PartialEq, Eq, Default, Serialize)]
pub struct DiagnosticBlob(Vec<u8>);

impl DiagnosticBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DiagnosticBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiagnosticBlob({} bytes)", self.0.len())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProcedureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TargetId(pub u32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("procedure {procedure:?} failed with code {code:#x}")]
pub struct ProcedureFailure {
    pub procedure: ProcedureId,
    pub code: u32,
    pub diagnostics: DiagnosticBlob,
}

pub trait ProcedureInvoker {
    fn invoke(&mut self, procedure: ProcedureId, targets: &[TargetId]) -> Result<(), ProcedureFailure>;
}

/// Failures collected over one boot step. A step keeps running its
/// procedures after one fails and reports all of them at the end.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{} procedure(s) failed", failures.len())]
pub struct StepError {
    pub failures: Vec<ProcedureFailure>,
}

impl StepError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error_details(&mut self, failure: ProcedureFailure) {
        self.failures.push(failure);
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_result(self) -> Result<(), StepError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Invokes one procedure, recording a failure in `step` instead of stopping.
pub fn run_step<I: ProcedureInvoker + ?Sized>(
    invoker: &mut I,
    procedure: ProcedureId,
    targets: &[TargetId],
    step: &mut StepError,
) -> bool {
    match invoker.invoke(procedure, targets) {
        Ok(()) => true,
        Err(failure) => {
            tracing::error!(
                "{} ({} bytes of diagnostics)",
                failure,
                failure.diagnostics.len()
            );
            step.add_error_details(failure);
            false
        }
    }
}
