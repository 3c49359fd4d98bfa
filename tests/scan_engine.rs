mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{branch, insn, op, ret, trap, with_features, ScriptedFactory};
use isaprobe::config::ScanLimits;
use isaprobe::core::instruction::{FeatureId, FlowKind};
use isaprobe::core::issues::IssueSink;
use isaprobe::core::section::CodeSection;
use isaprobe::core::seed::SeedGroup;
use isaprobe::scan::{CancelToken, GuidedScanner, ScanProgress, ScanResult, Termination};

fn text(start: u64, len: usize) -> CodeSection {
    CodeSection::new(".text", start, vec![0u8; len])
}

fn seeds(addresses: &[u64]) -> Vec<SeedGroup> {
    SeedGroup::new("test", addresses.iter().copied())
        .into_iter()
        .collect()
}

async fn scan(factory: &ScriptedFactory, sections: &[CodeSection], seeds: &[SeedGroup]) -> ScanResult {
    let mut issues = IssueSink::default();
    let result = GuidedScanner::new(factory)
        .run(sections, seeds, &mut issues)
        .await;
    result
}

#[tokio::test]
async fn unconditional_branch_stops_the_block() {
    let factory = ScriptedFactory::new([
        (0x1000, op(2)),
        (0x1002, branch(FlowKind::UnconditionalBranch, 2, 0x1010)),
        (0x1004, op(2)),
        (0x1010, ret()),
    ]);
    let result = scan(&factory, &[text(0x1000, 0x40)], &seeds(&[0x1000])).await;

    assert_eq!(factory.decoded(), vec![0x1000, 0x1002, 0x1010]);
    assert_eq!(result.instruction_count, 3);
    assert_eq!(result.bytes_decoded, 5);
    assert_eq!(result.termination, Termination::Completed);
}

#[tokio::test]
async fn call_continues_and_target_is_scanned_separately() {
    let factory = ScriptedFactory::new([
        (0x1000, branch(FlowKind::Call, 5, 0x1020)),
        (0x1005, branch(FlowKind::ConditionalBranch, 2, 0x1030)),
        (0x1007, ret()),
        (0x1020, op(1)),
        (0x1021, ret()),
        (0x1030, ret()),
    ]);
    let result = scan(&factory, &[text(0x1000, 0x40)], &seeds(&[0x1000])).await;

    // LIFO: the conditional target was scheduled last, so it is popped first.
    assert_eq!(
        factory.decoded(),
        vec![0x1000, 0x1005, 0x1007, 0x1030, 0x1020, 0x1021]
    );
    assert_eq!(result.instruction_count, 6);
    assert!(result.issues.is_empty());
}

#[tokio::test]
async fn each_address_is_decoded_once() {
    let factory = ScriptedFactory::new([
        (0x1000, op(2)),
        (0x1002, op(2)),
        (0x1004, branch(FlowKind::ConditionalBranch, 2, 0x1000)),
        (0x1006, ret()),
    ]);
    let groups = vec![
        SeedGroup::new("a", [0x1000]).unwrap(),
        SeedGroup::new("b", [0x1002, 0x1000]).unwrap(),
    ];
    let result = scan(&factory, &[text(0x1000, 0x10)], &groups).await;

    // The second seed re-enters decoded code and stops immediately.
    assert_eq!(factory.decoded(), vec![0x1000, 0x1002, 0x1004, 0x1006, 0x1002]);
    assert_eq!(result.instruction_count, 4);
    assert_eq!(result.bytes_decoded, 7);
}

#[tokio::test]
async fn blocks_never_cross_into_another_section() {
    let script = [(0x1000, op(2)), (0x1002, op(2)), (0x1004, op(2)), (0x1006, ret())];
    let sections = [
        CodeSection::new("a", 0x1000, vec![0u8; 4]),
        CodeSection::new("b", 0x1004, vec![0u8; 4]),
    ];

    let factory = ScriptedFactory::new(script.clone());
    let result = scan(&factory, &sections, &seeds(&[0x1000])).await;
    assert_eq!(factory.decoded(), vec![0x1000, 0x1002]);
    assert_eq!(result.instruction_count, 2);

    let factory = ScriptedFactory::new(script);
    let result = scan(&factory, &sections, &seeds(&[0x1000, 0x1004])).await;
    assert_eq!(factory.decoded(), vec![0x1000, 0x1002, 0x1004, 0x1006]);
    assert_eq!(result.instruction_count, 4);
}

#[tokio::test]
async fn seeds_outside_sections_are_ignored() {
    let factory = ScriptedFactory::new([(0x1000, ret())]);
    let result = scan(&factory, &[text(0x1000, 4)], &seeds(&[0x9000, 0x1000])).await;
    assert_eq!(factory.decoded(), vec![0x1000]);
    assert_eq!(result.instruction_count, 1);
    assert!(result.issues.is_empty());
}

#[tokio::test]
async fn intentional_trap_is_skipped_over() {
    let factory = ScriptedFactory::new([
        (0x1000, trap(2, &[7])),
        (0x1002, with_features(op(1), &[3])),
        (0x1003, ret()),
    ]);
    let result = scan(&factory, &[text(0x1000, 8)], &seeds(&[0x1000])).await;

    assert_eq!(result.instruction_count, 3);
    assert_eq!(result.invalid_instruction_count, 0);
    assert_eq!(result.feature_count(FeatureId(3)), 1);
    assert_eq!(result.feature_count(FeatureId(7)), 0);
}

#[tokio::test]
async fn anomalies_end_the_block_with_a_diagnostic() {
    let factory = ScriptedFactory::new([
        (0x1000, insn(FlowKind::Exception, 2)),
        (0x1002, op(1)),
        (0x1010, op(0)),
    ]);
    let result = scan(&factory, &[text(0x1000, 0x20)], &seeds(&[0x1000, 0x1010, 0x1018])).await;

    assert_eq!(result.instruction_count, 0);
    assert_eq!(result.invalid_instruction_count, 3);
    let messages: Vec<&str> = result.issues.iter().map(|i| i.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "invalid instruction at 0x1000",
            "zero-length decode at 0x1010",
            "invalid instruction at 0x1018",
        ]
    );
}

#[tokio::test]
async fn identical_inputs_give_identical_results() {
    let script = [
        (0x1000, with_features(branch(FlowKind::Call, 5, 0x1020), &[1])),
        (0x1005, with_features(op(3), &[2, 1])),
        (0x1008, ret()),
        (0x1020, with_features(op(2), &[2])),
    ];
    let sections = [text(0x1000, 0x30)];
    let groups = seeds(&[0x1000, 0x1028]);

    let first = scan(&ScriptedFactory::new(script.clone()), &sections, &groups).await;
    let second = scan(&ScriptedFactory::new(script), &sections, &groups).await;
    assert_eq!(first, second);
    assert_eq!(first.feature_count(FeatureId(1)), 2);
    assert_eq!(first.feature_count(FeatureId(2)), 2);
}

fn long_block() -> Vec<(u64, isaprobe::core::instruction::DecodedInstruction)> {
    let mut script: Vec<_> = (0..8).map(|i| (0x1000 + i, op(1))).collect();
    script.push((0x1008, ret()));
    script
}

#[tokio::test]
async fn cancelled_scan_is_a_prefix_of_the_full_scan() {
    let sections = [text(0x1000, 0x10), CodeSection::new("bad", 0x2000, vec![0u8; 4])];
    // The invalid block comes first so both runs report an issue.
    let groups = seeds(&[0x2000, 0x1000]);
    let limits = ScanLimits {
        yield_every: 1,
        ..ScanLimits::default()
    };

    let full = {
        let factory = ScriptedFactory::new(long_block());
        let mut issues = IssueSink::default();
        let result = GuidedScanner::new(&factory)
            .with_limits(limits.clone())
            .run(&sections, &groups, &mut issues)
            .await;
        result
    };

    let factory = ScriptedFactory::new(long_block());
    let token = CancelToken::new();
    let trigger = token.clone();
    let seen: Rc<RefCell<Vec<ScanProgress>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let mut issues = IssueSink::default();
    let partial = GuidedScanner::new(&factory)
        .with_limits(limits)
        .with_cancel(token)
        .with_progress(move |p| {
            sink.borrow_mut().push(*p);
            if p.instructions == 3 {
                trigger.cancel();
            }
        })
        .run(&sections, &groups, &mut issues)
        .await;

    assert_eq!(full.termination, Termination::Completed);
    assert_eq!(full.instruction_count, 9);
    assert_eq!(partial.termination, Termination::Cancelled);
    assert_eq!(partial.instruction_count, 3);
    assert!(partial.bytes_decoded <= full.bytes_decoded);
    assert!(partial.invalid_instruction_count <= full.invalid_instruction_count);
    assert!(full.issues.starts_with(&partial.issues));
    assert!(!partial.issues.is_empty());

    let counts: Vec<u64> = seen.borrow().iter().map(|p| p.instructions).collect();
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test]
async fn cancelled_before_start_decodes_nothing() {
    let factory = ScriptedFactory::new(long_block());
    let token = CancelToken::new();
    token.cancel();
    let mut issues = IssueSink::default();
    let result = GuidedScanner::new(&factory)
        .with_cancel(token)
        .run(&[text(0x1000, 0x10)], &seeds(&[0x1000]), &mut issues)
        .await;
    assert_eq!(result.termination, Termination::Cancelled);
    assert!(factory.decoded().is_empty());
}

#[tokio::test]
async fn instruction_budget_stops_the_scan() {
    let factory = ScriptedFactory::new(long_block());
    let mut issues = IssueSink::default();
    let result = GuidedScanner::new(&factory)
        .with_limits(ScanLimits {
            max_instructions: Some(2),
            ..ScanLimits::default()
        })
        .run(&[text(0x1000, 0x10)], &seeds(&[0x1000]), &mut issues)
        .await;

    assert_eq!(result.termination, Termination::BudgetExhausted);
    assert_eq!(result.instruction_count, 2);
    assert_eq!(
        result.issues.last().map(|i| i.message.as_str()),
        Some("instruction budget of 2 reached")
    );
}

#[tokio::test]
async fn issues_are_capped_with_a_summary() {
    // Nothing is scripted: every seed decodes as one invalid byte.
    let factory = ScriptedFactory::default();
    let mut issues = IssueSink::new(2);
    let result = GuidedScanner::new(&factory)
        .run(&[text(0x1000, 0x10)], &seeds(&[0x1000, 0x1002, 0x1004, 0x1006, 0x1008]), &mut issues)
        .await;

    assert_eq!(result.invalid_instruction_count, 5);
    assert_eq!(result.issues.len(), 3);
    assert_eq!(result.issues[2].message, "3 more issues omitted");
}

#[tokio::test]
async fn decoder_failures_are_contained() {
    let mut factory = ScriptedFactory::new([(0x1000, ret()), (0x2000, ret())]);
    factory.refuse_section = Some("data".to_string());
    factory.fail_release = true;
    let sections = [text(0x1000, 4), CodeSection::new("data", 0x2000, vec![0u8; 4])];

    let result = scan(&factory, &sections, &seeds(&[0x1000, 0x2000])).await;
    assert_eq!(factory.decoded(), vec![0x1000]);
    assert_eq!(result.instruction_count, 1);
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].message.starts_with("section data at 0x2000"));
}

#[tokio::test]
async fn empty_inputs_complete() {
    let factory = ScriptedFactory::default();
    let result = scan(&factory, &[], &[]).await;
    assert_eq!(result.termination, Termination::Completed);
    assert_eq!(result.instruction_count, 0);
    assert!(result.feature_counts.is_empty());
}
