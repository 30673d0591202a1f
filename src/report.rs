// src/report.rs
//! Plain-text similarity report.

use std::fmt::Write as _;

use crate::search::{CandidateProject, CatalogMetrics};
use crate::similarity::SimilarityAnalysis;

const RULE_WIDTH: usize = 100;

fn banner(out: &mut String, title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{rule}\n{title}\n{rule}");
}

/// Candidates ordered by model similarity, highest first; unscored last.
/// Ties keep discovery order.
pub fn ranked(candidates: &[CandidateProject]) -> Vec<&CandidateProject> {
    let mut v: Vec<&CandidateProject> = candidates.iter().collect();
    v.sort_by(|a, b| b.ai_similarity.unwrap_or(0).cmp(&a.ai_similarity.unwrap_or(0)));
    v
}

pub fn render_report(
    project_name: &str,
    description: &str,
    candidates: &[CandidateProject],
    analysis: &SimilarityAnalysis,
) -> String {
    let mut out = String::new();

    banner(&mut out, "HACKATHON FRAUD DETECTION REPORT");
    let _ = writeln!(out);
    let _ = writeln!(out, "Project Name: {project_name}");
    let _ = writeln!(out, "Description: {description}");
    let _ = writeln!(out, "Analysis Date: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);

    banner(&mut out, "AI FRAUD ASSESSMENT");
    let _ = writeln!(out, "Fraud Risk: {}", analysis.fraud_risk);
    let _ = writeln!(out, "Originality Score: {}/100\n", analysis.originality_score);
    let _ = writeln!(out, "Summary:\n{}\n", analysis.summary);
    let _ = writeln!(out, "Recommendation:\n{}\n", analysis.recommendation);

    if !analysis.red_flags.is_empty() {
        let _ = writeln!(out, "Red Flags:");
        for flag in &analysis.red_flags {
            let _ = writeln!(out, "  - {flag}");
        }
        let _ = writeln!(out);
    }

    banner(&mut out, "SIMILAR PROJECTS FOUND");
    let _ = writeln!(out);

    for (i, p) in ranked(candidates).into_iter().enumerate() {
        let _ = writeln!(out);
        banner(&mut out, &format!("PROJECT #{}", i + 1));
        let _ = writeln!(out, "Name: {}", p.name);
        let _ = writeln!(out, "Platform: {}", p.platform.as_str());
        let _ = writeln!(out, "URL: {}", p.url);
        if let Some(score) = p.ai_similarity {
            let _ = writeln!(out, "AI Similarity Score: {score}/100");
            let _ = writeln!(out, "AI Analysis: {}", p.ai_reasoning.as_deref().unwrap_or("N/A"));
        }
        let _ = writeln!(out, "Search Query: {}", p.search_query);

        match &p.metrics {
            CatalogMetrics::Code {
                stars,
                language,
                created_at,
                ..
            } => {
                let _ = writeln!(out, "Stars: {stars}");
                let _ = writeln!(out, "Language: {language}");
                let _ = writeln!(out, "Created: {created_at}");
            }
            CatalogMetrics::Listing {
                likes,
                comments,
                is_winner,
                submission_date,
            } => {
                let _ = writeln!(out, "Likes: {likes}");
                let _ = writeln!(out, "Comments: {comments}");
                let _ = writeln!(out, "Winner: {}", if *is_winner { "Yes" } else { "No" });
                if let Some(d) = submission_date {
                    let _ = writeln!(out, "Submitted: {d}");
                }
            }
        }
        let _ = writeln!(out, "\nDescription:\n{}", p.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Platform;
    use crate::similarity::FraudRisk;

    fn cand(name: &str, platform: Platform, sim: Option<u8>) -> CandidateProject {
        let metrics = match platform {
            Platform::GitHub => CatalogMetrics::Code {
                full_name: format!("o/{name}"),
                stars: 12,
                language: "Rust".into(),
                created_at: "2024-01-01".into(),
                updated_at: "2024-02-01".into(),
            },
            Platform::Devpost => CatalogMetrics::Listing {
                likes: 3,
                comments: 1,
                is_winner: true,
                submission_date: None,
            },
        };
        CandidateProject {
            platform,
            name: name.into(),
            description: "desc".into(),
            url: format!("https://x/{name}"),
            metrics,
            search_query: "q".into(),
            hash: "0".repeat(64),
            ai_similarity: sim,
            ai_reasoning: sim.map(|_| "close".to_string()),
        }
    }

    #[test]
    fn report_orders_by_similarity_and_shows_metrics() {
        let mut analysis = SimilarityAnalysis::no_matches();
        analysis.fraud_risk = FraudRisk::High;
        analysis.red_flags = vec!["Same README".into()];
        let cands = vec![
            cand("low", Platform::Devpost, Some(10)),
            cand("none", Platform::Devpost, None),
            cand("high", Platform::GitHub, Some(90)),
        ];
        let text = render_report("Target", "A thing", &cands, &analysis);

        assert!(text.starts_with(&"=".repeat(100)));
        assert!(text.contains("HACKATHON FRAUD DETECTION REPORT"));
        assert!(text.contains("Fraud Risk: HIGH"));
        assert!(text.contains("  - Same README"));

        let hi = text.find("Name: high").unwrap();
        let lo = text.find("Name: low").unwrap();
        let none = text.find("Name: none").unwrap();
        assert!(hi < lo && lo < none);
        assert!(text.contains("Stars: 12"));
        assert!(text.contains("Winner: Yes"));
        assert!(text.contains("AI Similarity Score: 90/100"));
    }
}
