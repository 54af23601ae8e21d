use serde::Deserialize;
use serde_json::json;

use graphrun_core::error::{GraphrunError, Result};
use graphrun_core::traits::DirectCapability;
use graphrun_core::types::StateMap;

use super::parse_input;

/// Lines longer than this count as a smell.
const MAX_LINE_LEN: usize = 120;

const BRANCH_KEYWORDS: [&str; 6] = ["if ", "for ", "while ", "try:", "except", "else:"];

fn single(key: &str, value: serde_json::Value) -> Option<StateMap> {
    let mut out = StateMap::new();
    out.insert(key.to_string(), value);
    Some(out)
}

// ── DetectSmells ────────────────────────────────────────────────

pub struct DetectSmells;

#[derive(Deserialize)]
struct DetectSmellsInput {
    code: String,
}

impl DirectCapability for DetectSmells {
    fn name(&self) -> &str {
        "detect_smells"
    }
    fn description(&self) -> &str {
        "Count TODO markers and overlong lines in `code`; writes `issues`."
    }
    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        let p: DetectSmellsInput = parse_input(input)?;
        Ok(single("issues", json!(count_smells(&p.code))))
    }
}

fn count_smells(code: &str) -> usize {
    let todos = code.matches("TODO").count();
    let long_lines = code
        .lines()
        .filter(|line| line.chars().count() > MAX_LINE_LEN)
        .count();
    todos + long_lines
}

// ── ComputeComplexity ───────────────────────────────────────────

pub struct ComputeComplexity;

#[derive(Deserialize)]
struct ComputeComplexityInput {
    #[serde(default)]
    func_source: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl DirectCapability for ComputeComplexity {
    fn name(&self) -> &str {
        "compute_complexity"
    }
    fn description(&self) -> &str {
        "Score branching keywords in `func_source` (or `code`); writes `complexity_score`."
    }
    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        let p: ComputeComplexityInput = parse_input(input)?;
        let source = p.func_source.or(p.code).ok_or_else(|| {
            GraphrunError::InvalidInput("missing string field `func_source` or `code`".into())
        })?;
        Ok(single("complexity_score", json!(complexity_score(&source))))
    }
}

fn complexity_score(source: &str) -> usize {
    BRANCH_KEYWORDS
        .iter()
        .map(|kw| source.matches(kw).count())
        .sum()
}

// ── SuggestImprovement ──────────────────────────────────────────

pub struct SuggestImprovement;

#[derive(Deserialize)]
struct SuggestImprovementInput {
    #[serde(default)]
    issues: f64,
    #[serde(default)]
    complexity_score: f64,
}

impl DirectCapability for SuggestImprovement {
    fn name(&self) -> &str {
        "suggest_improvement"
    }
    fn description(&self) -> &str {
        "Turn `issues` and `complexity_score` into a list of `suggestions`."
    }
    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        let p: SuggestImprovementInput = parse_input(input)?;
        let mut suggestions = Vec::new();
        if p.issues > 0.0 {
            suggestions.push("Address TODOs and long lines.");
        }
        if p.complexity_score > 3.0 {
            suggestions.push("Refactor large functions into smaller ones.");
        }
        Ok(single("suggestions", json!(suggestions)))
    }
}
