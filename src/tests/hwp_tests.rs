// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::fixtures::{self, vaddr, GUARD};
use crate::error::PnorError;
use crate::hwp::{run_step, DiagnosticBlob, ProcedureFailure, ProcedureId, ProcedureInvoker, StepError, TargetId};
use crate::provider::PnorRp;

const CHECK_GUARD: ProcedureId = ProcedureId(0x11);
const ALWAYS_FAILS: ProcedureId = ProcedureId(0x12);

/// Reads the guard section for every target, failing on the first bad read.
struct GuardReader<'a> {
    rp: &'a PnorRp,
    calls: Vec<(ProcedureId, usize)>,
}

impl ProcedureInvoker for GuardReader<'_> {
    fn invoke(&mut self, procedure: ProcedureId, targets: &[TargetId]) -> Result<(), ProcedureFailure> {
        self.calls.push((procedure, targets.len()));
        if procedure == ALWAYS_FAILS {
            return Err(ProcedureFailure {
                procedure,
                code: 0xdead,
                diagnostics: DiagnosticBlob::new(vec![1, 2, 3]),
            });
        }
        for _ in targets {
            self.rp.read(vaddr(GUARD)).map_err(|e| ProcedureFailure {
                procedure,
                code: 1,
                diagnostics: DiagnosticBlob::new(e.to_string().into_bytes()),
            })?;
        }
        Ok(())
    }
}

#[test]
fn test_step_collects_every_failure() {
    let rp = fixtures::start(&fixtures::flash());
    let mut invoker = GuardReader { rp: &rp, calls: Vec::new() };
    let targets = [TargetId(0), TargetId(1)];

    let mut step = StepError::new();
    assert!(run_step(&mut invoker, CHECK_GUARD, &targets, &mut step));
    assert!(!run_step(&mut invoker, ALWAYS_FAILS, &targets, &mut step));
    // later procedures still run
    assert!(run_step(&mut invoker, CHECK_GUARD, &targets[..1], &mut step));

    assert_eq!(invoker.calls, vec![(CHECK_GUARD, 2), (ALWAYS_FAILS, 2), (CHECK_GUARD, 1)]);
    let err = step.into_result().unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].code, 0xdead);
    assert_eq!(err.failures[0].diagnostics.as_bytes(), &[1, 2, 3]);
}

#[test]
fn test_failed_startup_surfaces_through_step() {
    let flash = fixtures::flash();
    fixtures::corrupt_toc(&flash, 0);
    fixtures::corrupt_toc(&flash, fixtures::SIDE_SIZE - crate::config::TOC_SIZE);
    let rp = fixtures::start(&flash);

    let mut invoker = GuardReader { rp: &rp, calls: Vec::new() };
    let mut step = StepError::new();
    assert!(!run_step(&mut invoker, CHECK_GUARD, &[TargetId(0)], &mut step));

    let failure = &step.failures[0];
    let text = String::from_utf8_lossy(failure.diagnostics.as_bytes()).into_owned();
    let expected = rp.outcome().unwrap_err().to_string();
    assert_eq!(text, expected);
    assert!(matches!(rp.outcome(), Err(PnorError::NotReady(ref e)) if !e.diagnostics.is_empty()));
}

#[test]
fn test_empty_step_is_ok() {
    assert_eq!(StepError::new().into_result(), Ok(()));
}
