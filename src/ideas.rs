// src/ideas.rs
//! Idea generation from past winners, the ideas text format, and the
//! implementation breakdown for one idea.

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::SectionKind;
use crate::error::{Result, ScoutError};
use crate::event::RulesDocument;
use crate::extract::ProjectDetail;
use crate::llm::LanguageModel;
use crate::text::truncate_chars;

/// Responses shorter than this are treated as failed generations.
pub const MIN_RESPONSE_CHARS: usize = 100;

pub const IDEAS_PER_RUN: usize = 7;

// ------------------------------------------------------------
// Prompt inputs
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerSummary {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub technologies: Vec<String>,
}

impl From<&ProjectDetail> for WinnerSummary {
    fn from(p: &ProjectDetail) -> Self {
        Self {
            name: p.title.clone(),
            tagline: p.tagline.clone(),
            description: truncate_chars(&p.description, 500),
            technologies: p.technologies.iter().take(10).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulesSummary {
    pub event_name: String,
    pub url: String,
    pub overview: String,
    pub rules: String,
    pub prizes: String,
}

impl From<&RulesDocument> for RulesSummary {
    fn from(doc: &RulesDocument) -> Self {
        Self {
            event_name: doc.event_name.clone(),
            url: doc.url.clone(),
            overview: truncate_chars(doc.section_text(SectionKind::Overview), 2000),
            rules: truncate_chars(doc.section_text(SectionKind::Rules), 2000),
            prizes: truncate_chars(doc.section_text(SectionKind::Prizes), 1000),
        }
    }
}

/// At most `n` winners, uniformly sampled without replacement.
pub fn sample_winners<R: Rng + ?Sized>(winners: &[ProjectDetail], n: usize, rng: &mut R) -> Vec<WinnerSummary> {
    if winners.len() <= n {
        return winners.iter().map(WinnerSummary::from).collect();
    }
    winners.choose_multiple(rng, n).map(WinnerSummary::from).collect()
}

pub fn ideas_prompt(rules: &RulesSummary, winners: &[WinnerSummary]) -> String {
    let rules_json = serde_json::to_string_pretty(rules).unwrap_or_default();
    let winners_json = serde_json::to_string_pretty(winners).unwrap_or_default();
    let count = winners.len();
    format!(
        r#"# Hackathon Idea Generation Task

You are an expert hackathon strategist. Generate winning project ideas for a NEW hackathon by learning from past winners.

## NEW HACKATHON RULES & REQUIREMENTS

{rules_json}

## PAST WINNING PROJECTS

{count} past winning projects from several hackathons:

{winners_json}

## YOUR TASK

Study the past winners for success patterns, technology trends, problem-solution fit, innovation approaches and presentation.

Then generate **{IDEAS_PER_RUN} innovative, diverse project ideas** for the NEW hackathon. Each idea must follow the new hackathon's rules and themes, be buildable within a hackathon, and explore a different problem space from the others.

## OUTPUT FORMAT

For each idea, use exactly this layout:

### Idea [Number]: [Project Name]

**Problem Statement**: the problem being solved

**Solution Overview**: how the project solves it

**Key Technologies**:
- one technology per line

**Why It Wins**:
- alignment with the rules and themes
- what makes it unique
- why it is feasible in time

**Inspired By**: which past winners influenced it and how

**Implementation Roadmap**:
1. first step
2. next step

---

Generate {IDEAS_PER_RUN} ideas now."#
    )
}

/// Header block written above the generated ideas.
pub fn ideas_header(event_url: &str, winners_used: usize, events: usize) -> String {
    format!(
        "# Generated Hackathon Ideas\nGenerated: {}\nNew Hackathon: {event_url}\nBased on {winners_used} projects from {events} hackathons\n\n{}\n\n",
        chrono::Local::now().to_rfc3339(),
        "=".repeat(60)
    )
}

/// One model call; returns the raw ideas text.
pub async fn generate_ideas(
    model: &dyn LanguageModel,
    rules: &RulesSummary,
    winners: &[WinnerSummary],
    max_tokens: u32,
) -> Result<String> {
    let prompt = ideas_prompt(rules, winners);
    let text = model.complete(&prompt, max_tokens).await?;
    let chars = text.trim().chars().count();
    if chars < MIN_RESPONSE_CHARS {
        return Err(ScoutError::MalformedModelOutput(format!(
            "model returned insufficient content ({chars} chars)"
        )));
    }
    tracing::info!(winners = winners.len(), chars, "ideas generated");
    Ok(text)
}

// ------------------------------------------------------------
// Parsing
// ------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, alias = "why_it_wins")]
    pub why_it_wins: Vec<String>,
    #[serde(default, alias = "inspired_by")]
    pub inspired_by: String,
    #[serde(default)]
    pub roadmap: Vec<String>,
}

static RE_IDEA_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^### Idea (\d+):[ \t]*(.*)$").expect("idea header regex"));
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("numbered item regex"));

fn is_section_break(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("**") || t.starts_with("###")
}

/// Lines of a labelled section: the remainder of the label line, then every
/// following line up to the next bold label or idea header.
fn section_lines<'a>(block: &'a str, label: &str) -> Option<Vec<&'a str>> {
    let marker = format!("**{label}**:");
    let start = block.find(&marker)? + marker.len();
    let mut lines = block[start..].lines();
    let mut out = vec![lines.next().unwrap_or("")];
    out.extend(lines.take_while(|l| !is_section_break(l)));
    Some(out)
}

fn section_text(block: &str, label: &str) -> String {
    section_lines(block, label)
        .map(|lines| {
            lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty() && *l != "---")
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn bullets(block: &str, label: &str) -> Vec<String> {
    section_lines(block, label)
        .unwrap_or_default()
        .into_iter()
        .map(str::trim)
        .filter(|l| l.starts_with('-'))
        .map(|l| l.trim_start_matches(['-', ' ']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn numbered(block: &str, label: &str) -> Vec<String> {
    section_lines(block, label)
        .unwrap_or_default()
        .into_iter()
        .map(str::trim)
        .filter(|l| RE_NUMBERED.is_match(l))
        .map(|l| RE_NUMBERED.replace(l, "").trim().to_string())
        .collect()
}

/// Parse stored ideas text. Text before the first header is ignored.
pub fn parse_ideas(text: &str) -> Vec<Idea> {
    let headers: Vec<_> = RE_IDEA_HEADER.captures_iter(text).collect();
    let mut ideas = Vec::with_capacity(headers.len());

    for (i, caps) in headers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = headers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let block = &text[whole.end()..end];

        let Ok(number) = caps[1].parse() else { continue };
        let title = caps[2].trim();
        ideas.push(Idea {
            number,
            title: if title.is_empty() { "Untitled".to_string() } else { title.to_string() },
            problem: section_text(block, "Problem Statement"),
            solution: section_text(block, "Solution Overview"),
            technologies: bullets(block, "Key Technologies"),
            why_it_wins: bullets(block, "Why It Wins"),
            inspired_by: section_text(block, "Inspired By"),
            roadmap: numbered(block, "Implementation Roadmap"),
        });
    }
    ideas
}

// ------------------------------------------------------------
// Breakdown
// ------------------------------------------------------------

pub fn breakdown_prompt(idea: &Idea, schedule: Option<&str>) -> String {
    let schedule = schedule
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("HACKATHON SCHEDULE:\n{s}\n"))
        .unwrap_or_default();
    format!(
        r#"You are an expert hackathon mentor. Write a detailed, step-by-step implementation guide for this project idea.

PROJECT IDEA:
Title: {title}
Problem: {problem}
Solution: {solution}
Technologies: {tech}

{schedule}
The implementation guide covers:

1. **Project Setup** (15-30 min): environment, dependencies, project structure
2. **Core Features** (2-3 hour chunks): for each feature, what to build and how
3. **Integration** (1-2 hours): connecting components, API integration, testing
4. **Polish & Demo** (1-2 hours): UI improvements, demo preparation, presentation tips
5. **Time Management Tips**: what to build first and what can be mocked

For each step give an estimated time, concrete code or pseudocode, common pitfalls and shortcuts.
Keep it practical and tuned for hackathon time constraints."#,
        title = if idea.title.is_empty() { "Untitled" } else { &idea.title },
        problem = idea.problem,
        solution = idea.solution,
        tech = idea.technologies.join(", "),
    )
}

pub async fn generate_breakdown(
    model: &dyn LanguageModel,
    idea: &Idea,
    schedule: Option<&str>,
    max_tokens: u32,
) -> Result<String> {
    if idea.title.trim().is_empty() && idea.problem.trim().is_empty() {
        return Err(ScoutError::InsufficientInput("Idea is required".to_string()));
    }
    let text = model
        .complete(&breakdown_prompt(idea, schedule), max_tokens)
        .await?;
    if text.trim().chars().count() < MIN_RESPONSE_CHARS {
        return Err(ScoutError::MalformedModelOutput(
            "model returned insufficient content for the breakdown".to_string(),
        ));
    }
    Ok(text)
}
