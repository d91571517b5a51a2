mod common;

use std::sync::Arc;

use common::*;
use medrag_core::config::ScoringConfig;
use medrag_core::types::RetrievedChunk;
use medrag_embed::FakeEmbedder;
use medrag_rag::scorer::{coverage_badge, quality_badge};
use medrag_rag::{Badge, QualityScorer};

const ANSWER: &str = "Give intravenous artesunate for at least 24 hours.";

fn chunk(text: &str) -> RetrievedChunk {
    RetrievedChunk { document_name: "g.pdf".into(), chunk_index: 0, text: text.into(), similarity: 0.5 }
}

fn scripted_scorer(embedder: ScriptedEmbedder) -> QualityScorer {
    QualityScorer::new(Arc::new(embedder), ScoringConfig::default())
}

#[test]
fn relevance_of_identical_texts_is_one() {
    let scorer = QualityScorer::new(Arc::new(FakeEmbedder::new(64)), ScoringConfig::default());
    let r = scorer.score_relevance(ANSWER, ANSWER);
    assert!((r - 1.0).abs() < 1e-5, "r={r}");
}

#[test]
fn degenerate_inputs_score_zero() {
    let scorer = scripted_scorer(ScriptedEmbedder::new(e(0)));
    let chunks = vec![chunk("context")];
    assert_eq!(scorer.score_relevance("question", ""), 0.0);
    assert_eq!(scorer.score_relevance("question", "  too short "), 0.0);
    assert_eq!(scorer.score_faithfulness(ANSWER, &[]), 0.0);
    assert_eq!(scorer.score_coverage(ANSWER, &[]), 0.0);
    assert_eq!(scorer.score_coverage("short", &chunks), 0.0);
    assert_eq!(scorer.score_all("q", "", &chunks).combined(), 0.0);
}

#[test]
fn coverage_counts_chunks_close_to_the_answer() {
    let embedder = ScriptedEmbedder::new(e(3))
        .with(ANSWER, e(0))
        .with("close one", at_similarity(0.9))
        .with("close two", at_similarity(0.7))
        .with("far", at_similarity(0.3));
    let scorer = scripted_scorer(embedder);
    let chunks = vec![chunk("close one"), chunk("close two"), chunk("far"), chunk("unrelated")];
    let coverage = scorer.score_coverage(ANSWER, &chunks);
    assert!((coverage - 0.5).abs() < 1e-6, "coverage={coverage}");
}

#[test]
fn empty_chunk_text_stays_in_the_denominator() {
    let embedder = ScriptedEmbedder::new(e(3)).with(ANSWER, e(0)).with("close", e(0));
    let scorer = scripted_scorer(embedder);
    let coverage = scorer.score_coverage(ANSWER, &[chunk("close"), chunk("")]);
    assert!((coverage - 0.5).abs() < 1e-6);
    assert_eq!(scorer.score_coverage(ANSWER, &[chunk(""), chunk("   ")]), 0.0);
}

#[test]
fn negative_similarity_is_clamped() {
    let embedder = ScriptedEmbedder::new(e(3)).with(ANSWER, e(0)).with("opposite question", vec![-1.0, 0.0, 0.0, 0.0]);
    let scorer = scripted_scorer(embedder);
    assert_eq!(scorer.score_relevance("opposite question", ANSWER), 0.0);
}

#[test]
fn faithfulness_embeds_joined_chunk_texts() {
    let embedder = ScriptedEmbedder::new(e(3)).with(ANSWER, e(0)).with("part one part two", at_similarity(0.8));
    let scorer = scripted_scorer(embedder);
    let f = scorer.score_faithfulness(ANSWER, &[chunk("part one"), chunk("part two")]);
    assert!((f - 0.8).abs() < 1e-5, "f={f}");
}

#[test]
fn score_all_matches_individual_metrics() {
    let embedder = ScriptedEmbedder::new(e(3))
        .with(ANSWER, e(0))
        .with("question", at_similarity(0.7))
        .with("a", at_similarity(0.9))
        .with("b", e(2))
        .with("a b", at_similarity(0.6));
    let scorer = scripted_scorer(embedder);
    let chunks = vec![chunk("a"), chunk("b")];

    let all = scorer.score_all("question", ANSWER, &chunks);
    assert!((all.relevance - scorer.score_relevance("question", ANSWER)).abs() < 1e-6);
    assert!((all.faithfulness - scorer.score_faithfulness(ANSWER, &chunks)).abs() < 1e-6);
    assert!((all.coverage - 0.5).abs() < 1e-6);
    assert!((all.combined() - (0.7 + 0.6 + 0.5) / 3.0).abs() < 1e-5);
}

#[test]
fn embedding_failure_scores_zero() {
    let scorer = scripted_scorer(ScriptedEmbedder::new(e(0)).failing_on("artesunate"));
    assert_eq!(scorer.score_relevance("q", ANSWER), 0.0);
    assert_eq!(scorer.score_coverage(ANSWER, &[chunk("x")]), 0.0);
}

#[test]
fn badges_use_configured_thresholds() {
    let config = ScoringConfig::default();
    assert_eq!(quality_badge(0.7, &config), Badge::High);
    assert_eq!(quality_badge(0.69, &config), Badge::Moderate);
    assert_eq!(quality_badge(0.4, &config), Badge::Moderate);
    assert_eq!(quality_badge(0.39, &config), Badge::Low);
    assert_eq!(coverage_badge(0.75, &config), Badge::High);
    assert_eq!(coverage_badge(0.7, &config), Badge::Moderate);
    assert_eq!(coverage_badge(0.49, &config), Badge::Low);
    assert_eq!(Badge::Moderate.to_string(), "Moderate");

    let strict = ScoringConfig { quality_high: 0.9, ..config };
    assert_eq!(quality_badge(0.8, &strict), Badge::Moderate);
}
