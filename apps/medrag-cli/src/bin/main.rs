use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use medrag_cli::{evaluation_report, init_tracing, load_questions, load_settings, parse_models, Services};
use medrag_core::traits::ChunkStore;
use medrag_core::types::QueryResult;
use medrag_rag::conversation::Role;
use medrag_rag::evaluate::{evaluate, pairwise_comparisons, PairedTTest, SIGNIFICANCE_LEVEL};
use medrag_rag::scorer::{coverage_badge, quality_badge};
use medrag_rag::{compare_models, model_statistics, AnswerOptions, Conversation, QualityScores};

/// Ask questions against the indexed WHO guideline corpus.
#[derive(Parser)]
#[command(name = "medrag", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question and score the answer
    Ask {
        question: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
        /// Generator model (default: generator.default_model)
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Answer one question with several models and rank them
    Compare {
        question: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
        /// Comma-separated model names (default: generator.models)
        #[arg(long)]
        models: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Run a question set against every model and print per-model statistics
    Evaluate {
        /// JSON array of questions (default: built-in malaria set)
        #[arg(long)]
        questions: Option<PathBuf>,
        #[arg(long)]
        models: Option<String>,
        /// Print records, statistics and pairwise tests as one JSON document
        #[arg(long)]
        json: bool,
    },
    /// Interactive session; an empty line exits
    Chat {
        #[command(flatten)]
        retrieval: RetrievalArgs,
        #[arg(long)]
        model: Option<String>,
    },
    /// List indexed documents
    Docs,
}

#[derive(Args)]
struct RetrievalArgs {
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    min_similarity: Option<f32>,
}

impl RetrievalArgs {
    fn apply(&self, mut options: AnswerOptions) -> AnswerOptions {
        if let Some(k) = self.top_k { options.top_k = k; }
        if let Some(s) = self.min_similarity { options.min_similarity = s; }
        options
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings()?;
    let base = AnswerOptions::from_settings(&settings);
    let services = Services::build(settings)?;

    match cli.command {
        Command::Ask { question, retrieval, model, json } => {
            let mut options = retrieval.apply(base);
            if let Some(m) = model { options.model = m; }
            let result = services.pipeline.answer(&question, &options)?;
            let scores = if result.is_failed() {
                QualityScores::default()
            } else {
                services.scorer.score_all(&question, &result.answer, &result.retrieved_chunks)
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "result": result, "scores": scores }))?);
            } else {
                print_result(&services, &result, &scores);
            }
        }
        Command::Compare { question, retrieval, models, json } => {
            let models = parse_models(models.as_deref(), &services.settings);
            let options = retrieval.apply(base);
            let comparison = compare_models(
                &services.pipeline,
                &services.scorer,
                &question,
                &models,
                &options,
                services.settings.compare.workers,
            )?;
            if json {
                let runs: Vec<_> = comparison
                    .runs
                    .iter()
                    .map(|r| serde_json::json!({ "model": r.model, "result": r.result, "error": r.error, "scores": r.scores }))
                    .collect();
                let best = comparison.best().map(|r| r.model.clone());
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "question": question, "runs": runs, "best": best }))?);
            } else {
                for run in &comparison.runs {
                    println!("== {} ==", run.model);
                    match (&run.result, &run.error) {
                        (Some(result), _) => print_result(&services, result, &run.scores),
                        (None, Some(err)) => println!("error: {err}"),
                        (None, None) => {}
                    }
                    println!();
                }
                match comparison.best() {
                    Some(best) => println!("Best: {} (combined {:.3})", best.model, best.scores.combined()),
                    None => println!("No model produced an answer."),
                }
            }
        }
        Command::Evaluate { questions, models, json } => {
            let questions = load_questions(questions.as_deref())?;
            let models = parse_models(models.as_deref(), &services.settings);
            let records = evaluate(
                &services.pipeline,
                &services.scorer,
                &models,
                &questions,
                &base,
                services.settings.compare.workers,
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&evaluation_report(&records))?);
                return Ok(());
            }
            let statistics = model_statistics(&records);
            let comparisons = pairwise_comparisons(&records);
            println!("{:<12} {:>4} {:>10} {:>10} {:>10} {:>10} {:>9}", "model", "n", "relevance", "faithful", "coverage", "confidence", "combined");
            for s in &statistics {
                println!(
                    "{:<12} {:>4} {:>10.3} {:>10.3} {:>10.3} {:>10.1} {:>9.3}",
                    s.model, s.num_questions, s.relevance.mean, s.faithfulness.mean, s.coverage.mean, s.confidence.mean, s.combined_score
                );
            }
            for pair in &comparisons {
                println!(
                    "{} vs {}: relevance {}, faithfulness {}",
                    pair.model_a,
                    pair.model_b,
                    format_t_test(pair.relevance),
                    format_t_test(pair.faithfulness)
                );
            }
            println!("* p < {SIGNIFICANCE_LEVEL}");
        }
        Command::Chat { retrieval, model } => {
            let mut options = retrieval.apply(base);
            if let Some(m) = model { options.model = m; }
            chat(&services, &options)?;
        }
        Command::Docs => {
            let names = services.store.document_names()?;
            println!("{} indexed documents:", names.len());
            for name in names {
                println!("  {name}");
            }
        }
    }
    Ok(())
}

fn format_t_test(test: Option<PairedTTest>) -> String {
    match test {
        Some(t) => format!("t={:.3} p={:.4}{}", t.t, t.p_value, if t.is_significant() { "*" } else { "" }),
        None => "n/a".to_string(),
    }
}

fn print_result(services: &Services, result: &QueryResult, scores: &QualityScores) {
    let cfg = services.scorer.config();
    println!("{}", result.answer);
    println!();
    if result.is_failed() {
        println!("(generation failed)");
        return;
    }
    println!("Confidence: {}%{}", result.confidence, if result.insufficient_context { " (insufficient context)" } else { "" });
    println!(
        "Relevance {:.2} [{}]  Faithfulness {:.2} [{}]  Coverage {:.2} [{}]",
        scores.relevance,
        quality_badge(scores.relevance, cfg),
        scores.faithfulness,
        quality_badge(scores.faithfulness, cfg),
        scores.coverage,
        coverage_badge(scores.coverage, cfg),
    );
    for c in &result.retrieved_chunks {
        println!("  - {} #{} (similarity {:.3})", c.document_name, c.chunk_index, c.similarity);
    }
}

fn chat(services: &Services, options: &AnswerOptions) -> Result<()> {
    let mut conversation = Conversation::new();
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        let question = line.trim();
        match services.pipeline.answer(question, options) {
            Ok(result) => conversation.record(question, &result),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "query failed");
                conversation.record_error(question);
            }
        }
        if let Some(reply) = conversation.messages().filter(|m| m.role == Role::Assistant).last() {
            println!("{}", reply.content);
            if let Some(confidence) = reply.confidence {
                println!("(confidence {confidence}%, {} sources)", reply.sources.len());
            }
        }
    }
    Ok(())
}
