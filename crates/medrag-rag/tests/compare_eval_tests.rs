mod common;

use std::sync::Arc;

use chrono::Utc;
use common::*;
use medrag_core::config::ScoringConfig;
use medrag_core::types::{AnswerOutcome, QueryResult};
use medrag_rag::answer::AnswerOptions;
use medrag_rag::conversation::{Role, MAX_MESSAGES, UNABLE_TO_GENERATE};
use medrag_rag::evaluate::{evaluate, pairwise_comparisons, MeanStd};
use medrag_rag::{compare_models, model_statistics, paired_t_statistic, paired_t_test, Conversation, EvaluationRecord, QualityScorer};

const QUESTION: &str = "When should parenteral artesunate be administered?";
const GOOD: &str = "Give parenteral artesunate in severe malaria.";
const WEAK: &str = "Malaria is treated with medicines in many cases.";

fn models() -> Vec<String> {
    ["phi", "tinyllama", "gemma:2b"].iter().map(|s| s.to_string()).collect()
}

fn embedder() -> ScriptedEmbedder {
    ScriptedEmbedder::new(e(3))
        .with(QUESTION, e(0))
        .with(GOOD, at_similarity(0.9))
        .with(WEAK, at_similarity(0.5))
        .with("Artesunate for severe malaria.", at_similarity(0.95))
}

fn setup(generator: ScriptedGenerator) -> (medrag_rag::AnswerPipeline, QualityScorer) {
    let store = memory_store(&[stored("malaria.pdf", 0, "Artesunate for severe malaria.", at_similarity(0.95))]);
    let pipeline = pipeline(embedder(), store, Arc::new(generator));
    let scorer = QualityScorer::new(Arc::new(embedder()), ScoringConfig::default());
    (pipeline, scorer)
}

#[test]
fn comparison_keeps_model_order_and_picks_best() {
    let generator = ScriptedGenerator::replying(WEAK)
        .for_model("tinyllama", Reply::Text(GOOD.into()))
        .for_model("gemma:2b", Reply::Fail(timeout()));
    let (pipeline, scorer) = setup(generator);

    let comparison = compare_models(&pipeline, &scorer, QUESTION, &models(), &AnswerOptions::default(), 2).unwrap();
    let names: Vec<&str> = comparison.runs.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(names, vec!["phi", "tinyllama", "gemma:2b"]);

    let gemma = &comparison.runs[2];
    assert!(!gemma.succeeded());
    assert_eq!(gemma.scores.combined(), 0.0);
    assert!(gemma.result.as_ref().unwrap().is_failed());

    assert!(comparison.runs[1].scores.combined() > comparison.runs[0].scores.combined());
    assert_eq!(comparison.best().unwrap().model, "tinyllama");
}

#[test]
fn equal_scores_prefer_the_earlier_model() {
    let (pipeline, scorer) = setup(ScriptedGenerator::replying(GOOD));
    let comparison = compare_models(&pipeline, &scorer, QUESTION, &models(), &AnswerOptions::default(), 3).unwrap();
    assert_eq!(comparison.best().unwrap().model, "phi");
}

#[test]
fn evaluation_produces_one_record_per_model_and_question() {
    let generator = ScriptedGenerator::replying(GOOD).for_model("tinyllama", Reply::Fail(timeout()));
    let (pipeline, scorer) = setup(generator);
    let questions = vec![QUESTION.to_string(), "What is malaria?".to_string()];
    let two_models = vec!["phi".to_string(), "tinyllama".to_string()];

    let records = evaluate(&pipeline, &scorer, &two_models, &questions, &AnswerOptions::default(), 2).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].model, "phi");
    assert_eq!(records[0].question, QUESTION);
    assert_eq!(records[3].model, "tinyllama");

    let phi = &records[0];
    assert!(!phi.failed);
    assert_eq!(phi.num_retrieved_chunks, 1);
    assert_eq!(phi.retrieved_chunks[0].document, "malaria.pdf");
    assert_eq!(phi.human_score, None);
    assert!(phi.relevance_score > 0.8);

    let tiny = &records[2];
    assert!(tiny.failed);
    assert_eq!(tiny.confidence, 0);
    assert_eq!(tiny.relevance_score, 0.0);
}

fn record(model: &str, question: &str, relevance: f32, faithfulness: f32, coverage: f32, confidence: u8) -> EvaluationRecord {
    EvaluationRecord {
        question: question.into(),
        model: model.into(),
        answer: "answer text".into(),
        num_retrieved_chunks: 0,
        retrieved_chunks: Vec::new(),
        confidence,
        relevance_score: relevance,
        faithfulness_score: faithfulness,
        coverage_score: coverage,
        failed: false,
        human_score: None,
        timestamp: Utc::now(),
    }
}

#[test]
fn statistics_report_means_sample_std_and_weighted_combination() {
    let records = vec![
        record("phi", "q1", 0.5, 0.5, 0.0, 40),
        record("phi", "q2", 0.7, 0.5, 1.0, 60),
        record("gemma", "q1", 0.2, 0.2, 0.2, 10),
    ];
    let stats = model_statistics(&records);
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].model, "phi");
    assert_eq!(stats[0].num_questions, 2);
    assert!((stats[0].relevance.mean - 0.6).abs() < 1e-6);
    assert!((stats[0].relevance.std - 0.141_421_36).abs() < 1e-5);
    assert!((stats[0].confidence.mean - 50.0).abs() < 1e-9);
    let expected = 0.6 * 0.33 + 0.5 * 0.33 + 0.5 * 0.34;
    assert!((stats[0].combined_score - expected).abs() < 1e-6);
    assert_eq!(stats[1].relevance.std, 0.0);
}

#[test]
fn paired_t_statistic_matches_hand_computation() {
    // diffs 1, 2, 3: mean 2, sample std 1, t = 2 / (1 / sqrt 3)
    let t = paired_t_statistic(&[2.0, 4.0, 6.0], &[1.0, 2.0, 3.0]).unwrap();
    assert!((t - 2.0 * 3f64.sqrt()).abs() < 1e-9);
    assert_eq!(paired_t_statistic(&[1.0], &[0.0]), None);
    assert_eq!(paired_t_statistic(&[1.0, 2.0], &[0.0]), None);
    assert_eq!(paired_t_statistic(&[1.0, 2.0], &[0.0, 1.0]), None);
    assert_eq!(MeanStd::of(&[]), MeanStd::default());
}

#[test]
fn paired_t_test_p_value_matches_closed_form() {
    // two degrees of freedom: two-sided p = 1 - |t| / sqrt(2 + t^2), here 1 - sqrt(6/7)
    let test = paired_t_test(&[2.0, 4.0, 6.0], &[1.0, 2.0, 3.0]).unwrap();
    assert!((test.t - 2.0 * 3f64.sqrt()).abs() < 1e-9);
    assert!((test.p_value - (1.0 - (6.0f64 / 7.0).sqrt())).abs() < 1e-6, "p={}", test.p_value);
    assert!(!test.is_significant());

    // diffs 1.0, 1.1, 0.9, 1.0, 1.0, 1.05, 0.95, 1.0: tiny spread, clearly significant
    let a = [2.0, 2.1, 1.9, 2.0, 2.0, 2.05, 1.95, 2.0];
    let b = [1.0; 8];
    let strong = paired_t_test(&a, &b).unwrap();
    assert!(strong.p_value < 1e-6);
    assert!(strong.is_significant());

    assert_eq!(paired_t_test(&[1.0, 2.0], &[0.0, 1.0]), None);
}

#[test]
fn pairwise_comparisons_match_questions_across_models() {
    let records = vec![
        record("a", "q2", 0.9, 0.5, 0.0, 0),
        record("a", "q1", 0.6, 0.5, 0.0, 0),
        record("b", "q1", 0.5, 0.5, 0.0, 0),
        record("b", "q2", 0.6, 0.5, 0.0, 0),
    ];
    let pairs = pairwise_comparisons(&records);
    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].model_a.as_str(), pairs[0].model_b.as_str()), ("a", "b"));
    // diffs q1: 0.1, q2: 0.3 -> mean 0.2, std 0.1414, t = 2.0
    let relevance = pairs[0].relevance.unwrap();
    assert!((relevance.t - 2.0).abs() < 1e-4);
    // one degree of freedom is a Cauchy: p = 1 - (2 / pi) atan(|t|)
    let expected = 1.0 - 2.0 / std::f64::consts::PI * 2f64.atan();
    assert!((relevance.p_value - expected).abs() < 1e-4, "p={}", relevance.p_value);
    assert_eq!(pairs[0].faithfulness, None);
}

fn result(answer: &str, outcome: AnswerOutcome) -> QueryResult {
    QueryResult { answer: answer.into(), confidence: 72, retrieved_chunks: Vec::new(), insufficient_context: false, outcome }
}

#[test]
fn conversation_keeps_last_six_messages() {
    let mut conversation = Conversation::new();
    for i in 0..5 {
        conversation.record(&format!("question {i}"), &result("A sufficiently long grounded answer.", AnswerOutcome::Grounded));
    }
    assert_eq!(conversation.len(), MAX_MESSAGES);
    let first = conversation.messages().next().unwrap();
    assert_eq!(first.role, Role::User);
    assert_eq!(first.content, "question 2");
    assert_eq!(conversation.last_user_question(), Some("question 4"));
}

#[test]
fn conversation_replaces_failed_answers() {
    let mut conversation = Conversation::new();
    let failed = result(
        "The model took too long to respond.",
        AnswerOutcome::Failed { failure: medrag_core::types::FailureKind::Timeout },
    );
    conversation.record("q", &failed);
    let reply = conversation.messages().last().unwrap();
    assert_eq!(reply.content, UNABLE_TO_GENERATE);
    assert_eq!(reply.confidence, None);
    assert!(reply.sources.is_empty());

    conversation.record("q2", &result("Error: boom", AnswerOutcome::Fallback));
    assert_eq!(conversation.messages().last().unwrap().content, UNABLE_TO_GENERATE);

    conversation.record("q3", &result("A sufficiently long grounded answer.", AnswerOutcome::Grounded));
    assert_eq!(conversation.messages().last().unwrap().confidence, Some(72));
}
