//! Grounding prompt construction and hallucination audit.
//!
//! Two responsibilities: building the instruction block that forces the
//! generator to cite numbered context sources, and auditing a generated
//! answer against those sources after the fact. The audit is a pure text
//! function — no model calls — so the same answer and context always produce
//! the same verdict.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::types::{ContextChunk, TranscriptTurn};

/// Confidence at or above which an answer is considered grounded.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// How many trailing conversation turns the prompt may carry as background.
pub const MAX_HISTORY_TURNS: usize = 3;

/// Phrases that mark a sentence as deliberately hedged.
///
/// Matching is lower-cased substring search. The list is intentionally a
/// fixed keyword table; accuracy upgrades belong in a separately scoped
/// change, not here.
const UNCERTAINTY_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i'm not sure",
    "i am not sure",
    "not enough information",
    "no information",
    "cannot find",
    "can't find",
    "does not specify",
    "doesn't specify",
    "unable to determine",
    "unclear from the context",
];

/// Sentence openers that are commentary about the answer, not claims.
const META_PREFIXES: &[&str] = &[
    "based on the provided context",
    "according to the context",
    "in summary",
    "to summarize",
    "here is",
    "here are",
    "let me know",
    "feel free",
];

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("valid regex"))
}

/// Read-only input for prompt construction and auditing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingContext {
    pub knowledge_chunks: Vec<ContextChunk>,
    #[serde(default)]
    pub conversation_history: Vec<TranscriptTurn>,
    #[serde(default)]
    pub verified_facts: Vec<String>,
}

/// A claim with the context source that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    pub claim: String,
    pub source: String,
}

/// Outcome of auditing a generated answer. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallucinationCheckResult {
    pub is_grounded: bool,
    pub confidence: f64,
    pub unsupported_claims: Vec<String>,
    pub verified_claims: Vec<VerifiedClaim>,
    pub recommendations: Vec<String>,
}

/// Build the grounding instruction block for the generator.
///
/// Sources are numbered 1-based so the audit can match `[n]` citations back
/// to chunks. Conversation history, when present, is appended as explicitly
/// non-authoritative background (last [`MAX_HISTORY_TURNS`] turns only).
pub fn build_grounding_prompt(context: &GroundingContext) -> String {
    let mut prompt = String::from(
        "You are a customer support assistant. Answer using ONLY the numbered \
         context sources below.\n\n",
    );

    if context.knowledge_chunks.is_empty() {
        prompt.push_str(
            "No context sources are available for this question. Say \
             \"I don't know based on the available information\" instead of guessing.\n",
        );
    } else {
        prompt.push_str("Context sources:\n");
        for (i, chunk) in context.knowledge_chunks.iter().enumerate() {
            prompt.push_str(&format!("[{}] ({}) {}\n", i + 1, chunk.source, chunk.content));
        }
        prompt.push_str(
            "\nCite a numbered source for every factual claim, \
             e.g. \"Refunds are processed within 5 business days [1]\". \
             If the sources do not contain the answer, say \"I don't know\" \
             rather than inventing one.\n",
        );
    }

    if !context.verified_facts.is_empty() {
        prompt.push_str("\nVerified facts you may state without citation:\n");
        for fact in &context.verified_facts {
            prompt.push_str(&format!("- {fact}\n"));
        }
    }

    prompt.push_str(
        "\nUncertainty: if you are not fully certain a claim is supported, hedge \
         explicitly (\"I'm not sure\", \"the context does not specify\") instead of \
         stating it as fact.\n",
    );
    prompt.push_str(
        "\nBefore answering, check each claim you plan to make against the sources \
         and drop any claim you cannot attribute to a numbered source.\n",
    );

    if !context.conversation_history.is_empty() {
        prompt.push_str("\nBackground conversation (context only, not authoritative):\n");
        let start = context
            .conversation_history
            .len()
            .saturating_sub(MAX_HISTORY_TURNS);
        for turn in &context.conversation_history[start..] {
            let speaker = match turn.speaker {
                crate::types::Speaker::User => "user",
                crate::types::Speaker::Assistant => "assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.content));
        }
    }

    prompt
}

fn contains_uncertainty(text_lower: &str) -> bool {
    UNCERTAINTY_PHRASES.iter().any(|p| text_lower.contains(p))
}

fn is_meta_commentary(sentence_lower: &str) -> bool {
    META_PREFIXES.iter().any(|p| sentence_lower.starts_with(p))
}

fn split_sentences(answer: &str) -> Vec<&str> {
    answer
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Audit a generated answer against the supplied context chunks.
///
/// Total on all inputs: empty answers and empty context produce a result,
/// never a panic.
pub fn check_response(answer: &str, context: &[ContextChunk]) -> HallucinationCheckResult {
    let chunk_count = context.len();
    let mut unsupported_claims = Vec::new();
    let mut verified_claims = Vec::new();
    let mut recommendations = Vec::new();

    // Citation indices used anywhere in the answer, de-duplicated in order.
    let mut flagged_invalid: BTreeSet<usize> = BTreeSet::new();
    let mut valid_cited: BTreeSet<usize> = BTreeSet::new();
    for cap in citation_re().captures_iter(answer) {
        let idx: usize = match cap[1].parse() {
            Ok(n) => n,
            Err(_) => continue, // digits too long to fit; treat as unparseable marker
        };
        if idx >= 1 && idx <= chunk_count {
            valid_cited.insert(idx);
        } else if flagged_invalid.insert(idx) {
            unsupported_claims.push(format!("Invalid citation [{idx}]"));
            recommendations.push(format!(
                "Remove or correct citation [{idx}]: only {chunk_count} context sources were provided"
            ));
        }
    }

    let sentences = split_sentences(answer);
    let total_sentences = sentences.len();
    let mut uncertainty_sentences = 0usize;

    for sentence in &sentences {
        let lower = sentence.to_lowercase();
        let cited_indices: Vec<usize> = citation_re()
            .captures_iter(sentence)
            .filter_map(|c| c[1].parse().ok())
            .collect();

        if contains_uncertainty(&lower) {
            uncertainty_sentences += 1;
            continue;
        }

        if let Some(valid) = cited_indices
            .iter()
            .find(|&&i| i >= 1 && i <= chunk_count)
        {
            verified_claims.push(VerifiedClaim {
                claim: sentence.to_string(),
                source: context[valid - 1].source.clone(),
            });
            continue;
        }

        let is_factual_shape = lower.contains(" is ") || lower.contains(" are ");
        if cited_indices.is_empty()
            && sentence.len() > 20
            && !is_meta_commentary(&lower)
            && is_factual_shape
        {
            unsupported_claims.push(sentence.to_string());
        }
    }

    let confidence = if total_sentences == 0 {
        0.0
    } else {
        ((verified_claims.len() + uncertainty_sentences) as f64 / total_sentences as f64).min(1.0)
    };

    if chunk_count > 0 && (valid_cited.len() as f64) < chunk_count as f64 / 2.0 {
        recommendations.push(format!(
            "Only {} of {} context sources are cited; cite more of the retrieved context",
            valid_cited.len(),
            chunk_count
        ));
    }

    let answer_lower = answer.to_lowercase();
    let has_uncertainty = contains_uncertainty(&answer_lower);
    let is_grounded = confidence >= CONFIDENCE_THRESHOLD
        || (unsupported_claims.is_empty() && !valid_cited.is_empty())
        || has_uncertainty;

    HallucinationCheckResult {
        is_grounded,
        confidence,
        unsupported_claims,
        verified_claims,
        recommendations,
    }
}
