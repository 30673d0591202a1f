// src/extract/project.rs
//! Individual project page extraction.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::{resolve_url, Image, Link};
use crate::chain::first_accepted;
use crate::classify::{self, AWARD_CLASSES, TEAM_CLASSES, TECH_CLASSES};
use crate::fetch::{document_text, element_text, Document, PageFetcher};
use crate::text::{truncate_words_flagged, word_count};

/// Element selectors tried for the tagline, before the meta fallbacks.
pub const TAGLINE_SELECTORS: &[&str] = &["#app-tagline", ".tagline", ".app-tagline", ".software-tagline"];

/// Content containers tried, in order, for the description.
pub const DESCRIPTION_SELECTORS: &[&str] = &[
    "#app-details-left",
    ".app-details",
    "#gallery-body",
    ".project-description",
    ".description",
    ".app-content",
    "#app-details",
    "article.software-details",
    ".submission-details",
];

const MIN_TAGLINE_CHARS: usize = 10;
const MIN_DESCRIPTION_WORDS: usize = 10;
const MAX_TECH_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub title: String,
    pub url: String,
    pub tagline: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub team_members: Vec<String>,
    pub awards: Vec<String>,
    pub images: Vec<Image>,
    pub external_links: Vec<Link>,
    pub full_content: String,
    pub submission_date: Option<String>,
    /// Set when the description was cut to the word limit. Not persisted.
    #[serde(skip)]
    pub description_truncated: bool,
}

impl ProjectDetail {
    /// Description, or the tagline when no description passed the gate.
    pub fn summary_text(&self) -> &str {
        if self.description.is_empty() {
            &self.tagline
        } else {
            &self.description
        }
    }
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static SEL_TAGLINES: Lazy<Vec<Selector>> =
    Lazy::new(|| TAGLINE_SELECTORS.iter().map(|s| sel(s)).collect());
static SEL_META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| sel(r#"meta[name="description"]"#));
static SEL_META_OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| sel(r#"meta[property="og:description"]"#));
static SEL_DESCRIPTIONS: Lazy<Vec<Selector>> =
    Lazy::new(|| DESCRIPTION_SELECTORS.iter().map(|s| sel(s)).collect());
static SEL_TIMEAGO: Lazy<Selector> = Lazy::new(|| sel("time.timeago[datetime]"));
static SEL_SPAN_DIV_CLASSED: Lazy<Selector> = Lazy::new(|| sel("span[class], div[class]"));
static SEL_APP_TITLE: Lazy<Selector> = Lazy::new(|| sel("#app-title, h1"));
static SEL_IMAGES: Lazy<Selector> = Lazy::new(|| sel("img[src]"));
static SEL_LINKS: Lazy<Selector> = Lazy::new(|| sel("a[href]"));

/// Tagline producers in priority order.
enum TaglineSource<'a> {
    Element(&'a Selector),
    Meta(&'a Selector),
}

fn extract_tagline(html: &Html) -> String {
    let sources = SEL_TAGLINES
        .iter()
        .map(TaglineSource::Element)
        .chain([
            TaglineSource::Meta(&SEL_META_DESCRIPTION),
            TaglineSource::Meta(&SEL_META_OG_DESCRIPTION),
        ]);
    first_accepted(
        sources,
        |src| match src {
            TaglineSource::Element(s) => html.select(s).next().map(element_text),
            TaglineSource::Meta(s) => html
                .select(s)
                .next()
                .and_then(|m| m.value().attr("content"))
                .map(|c| c.trim().to_string()),
        },
        |t| t.chars().count() > MIN_TAGLINE_CHARS,
    )
    .map(|(_, t)| t)
    .unwrap_or_default()
}

fn extract_description(html: &Html) -> Option<String> {
    first_accepted(
        SEL_DESCRIPTIONS.iter(),
        |s| html.select(s).next().map(element_text),
        |t| word_count(t) > MIN_DESCRIPTION_WORDS,
    )
    .map(|(_, t)| t)
}

/// ISO-8601 timestamp reformatted as e.g. "Jun 22, 2025". Offsets are
/// optional; a bare date is accepted too.
pub fn format_submission_date(raw: &str) -> Option<String> {
    const OUT: &str = "%b %d, %Y";
    let raw = raw.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.format(OUT).to_string());
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.format(OUT).to_string());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format(OUT).to_string())
}

/// Submission date from the page's `time.timeago` marker, if any.
pub fn extract_submission_date(html: &Html) -> Option<String> {
    let raw = html.select(&SEL_TIMEAGO).next()?.value().attr("datetime")?;
    let out = format_submission_date(raw);
    if out.is_none() {
        tracing::debug!(raw = %raw, "unparsable submission date");
    }
    out
}

fn class_scan<'a>(html: &'a Html, fragments: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    html.select(&SEL_SPAN_DIV_CLASSED)
        .filter(move |el| classify::class_matches(el.value().attr("class").unwrap_or(""), fragments))
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extract a project record from an already fetched page.
pub fn extract_project_detail(doc: &Document, fallback_title: &str, word_limit: usize) -> ProjectDetail {
    let html = doc.parse();

    let title = html
        .select(&SEL_APP_TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.to_string());

    let (description, description_truncated) = match extract_description(&html) {
        Some(text) => {
            let (cut, truncated) = truncate_words_flagged(&text, word_limit);
            if truncated {
                tracing::info!(
                    url = %doc.url,
                    from = word_count(&text),
                    to = word_limit,
                    "description truncated to word limit"
                );
            }
            (cut, truncated)
        }
        None => (String::new(), false),
    };

    let technologies = class_scan(&html, TECH_CLASSES)
        .filter(|t| t.chars().count() < MAX_TECH_CHARS)
        .collect();
    let team_members = class_scan(&html, TEAM_CLASSES)
        .filter(|t| t.contains('@'))
        .collect();
    let awards = class_scan(&html, AWARD_CLASSES).collect();

    let images = html
        .select(&SEL_IMAGES)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() || src.starts_with("data:") {
                return None;
            }
            Some(Image {
                src: resolve_url(&doc.url, src),
                alt: img.value().attr("alt").unwrap_or("").trim().to_string(),
            })
        })
        .collect();

    let external_links = html
        .select(&SEL_LINKS)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            (href.starts_with("http") && !href.contains("devpost.com")).then(|| Link {
                text: element_text(a),
                url: href.to_string(),
            })
        })
        .collect();

    ProjectDetail {
        title,
        url: doc.url.clone(),
        tagline: extract_tagline(&html),
        description,
        technologies,
        team_members,
        awards,
        images,
        external_links,
        full_content: document_text(&html),
        submission_date: extract_submission_date(&html),
        description_truncated,
    }
}

/// Fetch and extract one project page; `None` when the page is unreachable.
pub async fn extract_project(
    fetcher: &PageFetcher,
    url: &str,
    fallback_title: &str,
    word_limit: usize,
) -> Option<ProjectDetail> {
    let doc = fetcher.fetch(url).await?;
    let detail = extract_project_detail(&doc, fallback_title, word_limit);
    tracing::info!(
        url = %url,
        words = word_count(&detail.description),
        has_tagline = !detail.tagline.is_empty(),
        has_date = detail.submission_date.is_some(),
        "project extracted"
    );
    Some(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    fn page(body: &str) -> Document {
        Document::new(
            "https://devpost.com/software/demo",
            format!(
                r#"<html><head><title>Demo</title>
                <meta name="description" content="Meta description of the demo project">
                </head><body>{body}</body></html>"#
            ),
        )
    }

    #[test]
    fn description_takes_first_substantial_container() {
        let doc = page(&format!(
            r#"<div id="app-details-left">Too short here</div>
               <div class="app-details">{}</div>"#,
            words(40)
        ));
        let d = extract_project_detail(&doc, "Fallback", 300);
        assert_eq!(word_count(&d.description), 40);
        assert!(!d.description_truncated);
    }

    #[test]
    fn long_description_is_cut_to_limit() {
        let doc = page(&format!(r#"<div id="gallery-body">{}</div>"#, words(450)));
        let d = extract_project_detail(&doc, "Fallback", 300);
        assert_eq!(word_count(&d.description), 300);
        assert!(d.description.ends_with("word299"));
        assert!(d.description_truncated);
    }

    #[test]
    fn missing_description_is_empty_string() {
        let d = extract_project_detail(&page("<p>nothing</p>"), "Fallback", 300);
        assert_eq!(d.description, "");
        assert_eq!(d.title, "Fallback");
        assert_eq!(d.summary_text(), "Meta description of the demo project");
    }

    #[test]
    fn tagline_prefers_element_then_meta() {
        let d = extract_project_detail(
            &page(r#"<p id="app-tagline">short</p><p class="tagline">A real tagline for the app</p>"#),
            "F",
            300,
        );
        assert_eq!(d.tagline, "A real tagline for the app");

        let d = extract_project_detail(&page(""), "F", 300);
        assert_eq!(d.tagline, "Meta description of the demo project");
    }

    #[test]
    fn date_and_keyword_lists() {
        let doc = page(
            r#"<h1 id="app-title">Demo App</h1>
               <time class="timeago" datetime="2025-06-22T18:04:11Z">3 months ago</time>
               <span class="cp-tag">Rust</span>
               <span class="cp-tag">A technology name that is far too long to be a real tag</span>
               <div class="team-member">Ada @ada</div>
               <div class="team-member">No handle</div>
               <span class="winner-badge">Best Use of AI</span>
               <img src="data:image/png;base64,xx"><img src="/img/shot.png" alt="shot">
               <a href="https://github.com/x/demo">Code</a><a href="https://devpost.com/x">Profile</a>"#,
        );
        let d = extract_project_detail(&doc, "F", 300);
        assert_eq!(d.title, "Demo App");
        assert_eq!(d.submission_date.as_deref(), Some("Jun 22, 2025"));
        assert_eq!(d.technologies, vec!["Rust"]);
        assert_eq!(d.team_members, vec!["Ada @ada"]);
        assert_eq!(d.awards, vec!["Best Use of AI"]);
        assert_eq!(d.images.len(), 1);
        assert_eq!(d.images[0].src, "https://devpost.com/img/shot.png");
        assert_eq!(d.external_links.len(), 1);
        assert_eq!(d.external_links[0].url, "https://github.com/x/demo");
    }

    #[test]
    fn bad_dates_are_none() {
        assert_eq!(format_submission_date("yesterday"), None);
        assert_eq!(
            format_submission_date("2024-01-05T00:00:00+00:00").as_deref(),
            Some("Jan 05, 2024")
        );
        assert_eq!(
            format_submission_date("2023-11-30T09:15:00").as_deref(),
            Some("Nov 30, 2023")
        );
    }
}
