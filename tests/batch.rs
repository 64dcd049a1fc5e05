mod common;

use common::{PLUS_ROW, FailingStub, PanickingStub, calls, chromosome, context, index};
use std::panic::{AssertUnwindSafe, catch_unwind};
use splice_delta::pipeline;
use splice_delta::{
    Ensemble, ErrorKind, FastaDb, ScoreConfig, ScoringContext, SplicePredictor, VariantRequest,
    score_batch, score_request, score_sequence,
};

fn request(chrom: &str, pos: Option<u32>, r: &str, alt: &str) -> VariantRequest {
    VariantRequest {
        chrom: Some(chrom.to_string()),
        pos,
        ref_allele: Some(r.to_string()),
        alt: Some(alt.to_string()),
        ..VariantRequest::default()
    }
}

fn mixed_requests() -> Vec<VariantRequest> {
    vec![
        request("21", Some(10_000), "T", "A"),
        request("21", Some(15_000), "A", "G"),
        request("21", None, "T", "A"),
        request("21", Some(10_000), "G", "A"),
        request("21", Some(10_001), "A", "C,G"),
    ]
}

fn outcome(entry: &splice_delta::BatchEntry) -> Result<usize, ErrorKind> {
    entry.result.as_ref().map(Vec::len).map_err(|e| e.kind())
}

#[test]
fn failures_are_isolated_per_entry() {
    let (ctx, _) = context(&[PLUS_ROW]);
    let entries = score_batch(&ctx, mixed_requests(), &ScoreConfig::default(), 1).unwrap();

    let outcomes: Vec<_> = entries.iter().map(outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Ok(1),
            Err(ErrorKind::NoAnnotation),
            Err(ErrorKind::MalformedInput),
            Err(ErrorKind::ReferenceMismatch),
            Ok(2),
        ]
    );
    assert_eq!(entries[2].label, "21:? T>A");
}

#[test]
fn worker_pool_preserves_input_order() {
    let (ctx, counter) = context(&[PLUS_ROW]);
    let sequential = score_batch(&ctx, mixed_requests(), &ScoreConfig::default(), 1).unwrap();
    let before = calls(&counter);
    let pooled = score_batch(&ctx, mixed_requests(), &ScoreConfig::default(), 3).unwrap();

    assert_eq!(pooled.len(), sequential.len());
    for (i, (p, s)) in pooled.iter().zip(&sequential).enumerate() {
        assert_eq!(p.index, i);
        assert_eq!(p.label, s.label);
        assert_eq!(outcome(p), outcome(s));
        if let (Ok(a), Ok(b)) = (&p.result, &s.result) {
            assert_eq!(a, b);
        }
    }
    assert_eq!(calls(&counter) - before, before);
}

#[test]
fn predictor_failure_is_internal() {
    let members: Vec<Box<dyn SplicePredictor>> = vec![Box::new(FailingStub)];
    let ctx = ScoringContext::new(
        index(&[PLUS_ROW]),
        Box::new(FastaDb::from_records([("chr21", chromosome())])),
        Ensemble::new(members).unwrap(),
    );
    let err = score_request(&ctx, request("21", Some(10_000), "T", "A"), &ScoreConfig::default())
        .unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().contains("inference backend unavailable"));
}

#[test]
fn batch_returns_when_every_worker_dies() {
    let members: Vec<Box<dyn SplicePredictor>> = vec![Box::new(PanickingStub)];
    let ctx = ScoringContext::new(
        index(&[PLUS_ROW]),
        Box::new(FastaDb::from_records([("chr21", chromosome())])),
        Ensemble::new(members).unwrap(),
    );
    let requests: Vec<_> = (0..50).map(|_| request("21", Some(10_000), "T", "A")).collect();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        score_batch(&ctx, requests, &ScoreConfig::default(), 2)
    }));
    assert!(!matches!(outcome, Ok(Ok(_))));
}

#[test]
fn mistyped_bulk_entry_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bulk.json");
    std::fs::write(
        &path,
        r#"{"variants": [
            {"chrom": "21", "pos": 10000, "ref": "T", "alt": "A"},
            {"chrom": "21", "pos": "oops", "ref": "A", "alt": "G"}
        ]}"#,
    )
    .unwrap();

    let bulk = pipeline::read_bulk(&path).unwrap();
    let (ctx, _) = context(&[PLUS_ROW]);
    let entries = score_batch(&ctx, bulk.variants, &ScoreConfig::default(), 1).unwrap();

    let outcomes: Vec<_> = entries.iter().map(outcome).collect();
    assert_eq!(outcomes, vec![Ok(1), Err(ErrorKind::MalformedInput)]);
    assert_eq!(entries[1].label, "21:? A>G");
}

#[test]
fn pipeline_writes_one_json_line_per_entry() {
    let (ctx, _) = context(&[PLUS_ROW]);
    let mut out = Vec::new();
    let stats = pipeline::run(
        &ctx,
        mixed_requests(),
        &ScoreConfig::default(),
        2,
        false,
        &mut out,
    )
    .unwrap();

    assert_eq!(stats.variants, 5);
    assert_eq!(stats.scored, 2);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.internal_errors, 0);
    assert_eq!(stats.records, 3);

    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["records"][0]["gene"], "GENEP");
    assert_eq!(lines[0]["records"][0]["scores"]["stats"][0]["dist_from_variant"], -50);
    assert_eq!(lines[1]["error"]["kind"], "no_annotation");
    assert_eq!(lines[2]["error"]["kind"], "malformed_input");
}

#[test]
fn pipeline_summary_mode_writes_summary_lines() {
    let (ctx, _) = context(&[PLUS_ROW]);
    let mut out = Vec::new();
    pipeline::run(
        &ctx,
        vec![request("21", Some(10_000), "T", "A"), request("21", Some(15_000), "A", "G")],
        &ScoreConfig::default(),
        1,
        true,
        &mut out,
    )
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("21:10000 T>A\tA|GENEP|0.50|"));
    assert!(lines[1].starts_with("21:15000 A>G\terror: no gene annotations"));
}

#[test]
fn sequence_scoring_reports_every_base() {
    let (ctx, _) = context(&[PLUS_ROW]);
    let scores = score_sequence(&ctx.predictor, "ACGTA").unwrap();
    assert_eq!(scores.acceptor_prob, vec![0.5, 0.0, 0.0, 0.0, 0.5]);
    assert_eq!(scores.donor_prob, vec![0.0, 0.0, 0.5, 0.0, 0.0]);

    for bad in ["", "ACGN", "acgt"] {
        let err = score_sequence(&ctx.predictor, bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput, "{bad:?}");
    }
}
