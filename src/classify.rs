// src/classify.rs
//! Keyword tables and the pure classifiers built on them.
//!
//! Every heuristic that matches visible text or class names against a fixed
//! vocabulary lives here as data, so the tables can be tested and swapped
//! without touching the extraction code.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Logical sections of an event site. Declaration order is the order in
/// which sections are probed and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Overview,
    Projects,
    Updates,
    Rules,
    Participants,
    ProjectGallery,
    Discussions,
    Prizes,
    Schedule,
    Mentors,
}

impl SectionKind {
    pub const ALL: [SectionKind; 10] = [
        SectionKind::Overview,
        SectionKind::Projects,
        SectionKind::Updates,
        SectionKind::Rules,
        SectionKind::Participants,
        SectionKind::ProjectGallery,
        SectionKind::Discussions,
        SectionKind::Prizes,
        SectionKind::Schedule,
        SectionKind::Mentors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Overview => "overview",
            SectionKind::Projects => "projects",
            SectionKind::Updates => "updates",
            SectionKind::Rules => "rules",
            SectionKind::Participants => "participants",
            SectionKind::ProjectGallery => "project_gallery",
            SectionKind::Discussions => "discussions",
            SectionKind::Prizes => "prizes",
            SectionKind::Schedule => "schedule",
            SectionKind::Mentors => "mentors",
        }
    }

    /// Suffix probed first for this kind. The overview is the base page itself.
    pub fn default_path(self) -> &'static str {
        match self {
            SectionKind::Overview => "",
            SectionKind::Projects => "/submissions",
            SectionKind::Updates => "/updates",
            SectionKind::Rules => "/rules",
            SectionKind::Participants => "/participants",
            SectionKind::ProjectGallery => "/project-gallery",
            SectionKind::Discussions => "/discussions",
            SectionKind::Prizes => "/prizes",
            SectionKind::Schedule => "/schedule",
            SectionKind::Mentors => "/mentors",
        }
    }

    /// Suffixes tried in order when the default path does not validate.
    pub fn alternative_paths(self) -> &'static [&'static str] {
        match self {
            SectionKind::Projects => &["/projects", "/submissions", "/entries"],
            SectionKind::Rules => &["/rules", "/guidelines", "/requirements"],
            SectionKind::ProjectGallery => {
                &["/project-gallery", "/gallery", "/winners", "/showcase"]
            }
            SectionKind::Schedule => &["/schedule", "/timeline", "/agenda"],
            SectionKind::Prizes => &["/prizes", "/awards", "/sponsors"],
            SectionKind::Mentors => &["/mentors", "/judges", "/volunteers"],
            _ => &[],
        }
    }

    /// Navigation-link vocabulary for this kind.
    pub fn nav_keywords(self) -> &'static [&'static str] {
        match self {
            SectionKind::Overview => &["overview", "home", "main", "about"],
            SectionKind::Projects => &["projects", "submissions", "entries", "submitted"],
            SectionKind::Updates => &["updates", "news", "announcements", "blog"],
            SectionKind::Rules => &["rules", "guidelines", "requirements", "criteria"],
            SectionKind::Participants => &["participants", "teams", "hackers", "attendees"],
            SectionKind::ProjectGallery => &["gallery", "showcase", "featured", "winners"],
            SectionKind::Discussions => &["discussions", "forum", "chat", "community"],
            SectionKind::Prizes => &["prizes", "awards", "sponsors", "prize"],
            SectionKind::Schedule => &["schedule", "timeline", "agenda", "events"],
            SectionKind::Mentors => &["mentors", "judges", "volunteers"],
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anchors inside navigation-like containers.
pub const NAV_SELECTORS: &[&str] = &[
    "nav a",
    ".nav a",
    ".navigation a",
    ".menu a",
    ".tabs a",
    ".tab a",
    ".nav-tabs a",
    ".nav-pills a",
    "ul.nav a",
    ".navbar a",
    ".header a",
];

/// Navigation text that never names an event section.
pub const NAV_EXCLUDED: &[&str] = &["login", "sign", "register", "about", "contact", "help"];

pub const WINNER_INDICATORS: &[&str] = &[
    "winner",
    "first place",
    "second place",
    "third place",
    "grand prize",
    "best",
    "award",
    "prize",
    "1st",
    "2nd",
    "3rd",
    "gold",
    "silver",
    "bronze",
    "champion",
];

/// Class-name fragments of project containers on a gallery page.
pub const PROJECT_CONTAINER_CLASSES: &[&str] =
    &["project", "submission", "entry", "card", "software", "app"];

/// Site-specific project container selectors, matched in addition to the
/// class-fragment scan.
pub const PROJECT_CONTAINER_SELECTORS: &[&str] = &[
    ".software-entry",
    ".submission-entry",
    ".project-card",
    ".app-card",
    "[data-software-id]",
    ".software",
];

/// Path fragments identifying a project link when no container matched.
pub const PROJECT_LINK_PATHS: &[&str] = &["/software/", "/projects/", "/submissions/"];

pub const TECH_CLASSES: &[&str] = &["tech", "tag", "skill", "language"];
pub const TEAM_CLASSES: &[&str] = &["team", "member", "author", "creator"];
pub const AWARD_CLASSES: &[&str] = &["award", "prize", "winner", "badge"];

pub const TECH_KEYWORDS: &[&str] = &[
    "python", "javascript", "react", "node", "java", "c++", "c#", "swift", "kotlin", "html",
    "css", "sql", "mongodb", "postgresql", "mysql", "redis", "docker", "kubernetes", "aws",
    "azure", "gcp", "firebase", "tensorflow", "pytorch", "machine learning", "ai",
    "blockchain", "ethereum", "solidity", "web3", "api", "rest", "graphql", "microservices",
    "mobile", "ios", "android", "flutter", "react native", "vue", "angular", "django",
    "flask", "express", "spring", "laravel", "rails", "php", "ruby", "go", "rust", "scala",
];

pub const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "they", "have", "been", "were", "said", "each", "which",
    "their", "time", "will", "about", "there", "could", "other", "after", "first", "well",
    "also", "where", "much", "some", "very", "when", "here", "just", "into", "over", "think",
    "back", "then", "only", "come", "right", "work", "life", "know", "place", "year", "live",
    "take", "make", "many", "them", "what", "these", "would", "like", "more", "than", "call",
    "find", "long", "down", "made", "part",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// First section kind whose vocabulary occurs in the (lowercased) link text.
pub fn kind_for_nav_text(text: &str) -> Option<SectionKind> {
    let text = text.to_lowercase();
    SectionKind::ALL
        .into_iter()
        .find(|k| contains_any(&text, k.nav_keywords()))
}

pub fn is_nav_excluded(text: &str) -> bool {
    contains_any(&text.to_lowercase(), NAV_EXCLUDED)
}

/// Winner signal from a container's text and its class attribute.
pub fn is_winner(text: &str, class: &str) -> bool {
    contains_any(&text.to_lowercase(), WINNER_INDICATORS)
        || contains_any(&class.to_lowercase(), WINNER_INDICATORS)
}

/// True when any class fragment occurs in the class attribute.
pub fn class_matches(class: &str, fragments: &[&str]) -> bool {
    contains_any(&class.to_lowercase(), fragments)
}

static RE_TOPIC_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("topic word regex"));

/// Ten most frequent 4+ letter words, stop words removed. Ties keep first
/// occurrence order.
pub fn main_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for m in RE_TOPIC_WORD.find_iter(&lower) {
        let w = m.as_str();
        if STOP_WORDS.contains(&w) {
            continue;
        }
        let slot = freq.entry(w).or_insert(0);
        if *slot == 0 {
            order.push(w);
        }
        *slot += 1;
    }
    // stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| freq[b].cmp(&freq[a]));
    order.into_iter().take(10).map(str::to_string).collect()
}

/// Count of texts mentioning each technology keyword, most frequent first.
pub fn technology_histogram<'a, I>(texts: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = TECH_KEYWORDS.iter().map(|t| (t.to_string(), 0)).collect();
    for text in texts {
        let lower = text.to_lowercase();
        for (tech, n) in counts.iter_mut() {
            if lower.contains(tech.as_str()) {
                *n += 1;
            }
        }
    }
    counts.retain(|(_, n)| *n > 0);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
