// src/extract/mod.rs
//! Structured extraction from fetched pages.
//!
//! `extract_section` turns any page into a uniform `SectionRecord`; for the
//! projects kind it also scans for project entries and their winner flag.
//! Everything here is synchronous over a parsed `Html`.

pub mod project;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::classify::{
    self, SectionKind, PROJECT_CONTAINER_CLASSES, PROJECT_CONTAINER_SELECTORS, PROJECT_LINK_PATHS,
};
use crate::fetch::{document_text, element_text, page_title, Document};

pub use project::{extract_project, extract_project_detail, ProjectDetail};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: String,
    pub placeholder: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: String,
    pub inputs: Vec<FormInput>,
}

/// Discovery-time project reference, used to pick which projects to deep-extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub title: String,
    pub url: String,
    pub is_winner: bool,
}

/// Projects found on a gallery page. Exactly one of `all_projects` (container
/// scan) and `project_links` (link fallback) is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsInfo {
    pub all_projects: Vec<ProjectEntry>,
    pub winning_projects: Vec<ProjectEntry>,
    pub project_links: Vec<ProjectEntry>,
}

impl ProjectsInfo {
    /// Entries from whichever path fired.
    pub fn entries(&self) -> &[ProjectEntry] {
        if self.all_projects.is_empty() {
            &self.project_links
        } else {
            &self.all_projects
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_projects.is_empty() && self.project_links.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    pub kind: SectionKind,
    pub path: String,
    pub title: String,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub tables: Vec<Vec<Vec<String>>>,
    pub forms: Vec<Form>,
    pub text_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_info: Option<ProjectsInfo>,
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static SEL_HEADINGS: Lazy<Selector> = Lazy::new(|| sel("h1, h2, h3, h4, h5, h6"));
static SEL_LINKS: Lazy<Selector> = Lazy::new(|| sel("a[href]"));
static SEL_IMAGES: Lazy<Selector> = Lazy::new(|| sel("img"));
static SEL_TABLES: Lazy<Selector> = Lazy::new(|| sel("table"));
static SEL_ROWS: Lazy<Selector> = Lazy::new(|| sel("tr"));
static SEL_CELLS: Lazy<Selector> = Lazy::new(|| sel("td, th"));
static SEL_FORMS: Lazy<Selector> = Lazy::new(|| sel("form"));
static SEL_INPUTS: Lazy<Selector> = Lazy::new(|| sel("input, textarea, select"));
static SEL_CLASSED_CONTAINERS: Lazy<Selector> = Lazy::new(|| sel("div[class], article[class]"));
static SEL_SITE_CONTAINERS: Lazy<Vec<Selector>> =
    Lazy::new(|| PROJECT_CONTAINER_SELECTORS.iter().map(|s| sel(s)).collect());
static SEL_TITLE_CANDIDATES: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1", "h2", "h3", "h4", "h5", "h6", "a", ".title", ".name", ".software-name"]
        .iter()
        .map(|s| sel(s))
        .collect()
});

fn attr(el: ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or("").trim().to_string()
}

/// Absolute URLs pass through; anything else is joined onto `base`.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), href),
    }
}

/// Uniform shallow extraction, plus project scanning for the projects kind.
pub fn extract_section(doc: &Document, kind: SectionKind, path: &str) -> SectionRecord {
    let html = doc.parse();
    let mut record = extract_shallow(&html, kind, path);
    if kind == SectionKind::Projects {
        record.projects_info = Some(extract_projects(&html, &doc.url));
    }
    record
}

fn extract_shallow(html: &Html, kind: SectionKind, path: &str) -> SectionRecord {
    let headings = html
        .select(&SEL_HEADINGS)
        .map(|h| Heading {
            level: h.value().name()[1..].parse().unwrap_or(0),
            text: element_text(h),
        })
        .collect();

    let links = html
        .select(&SEL_LINKS)
        .map(|a| Link {
            text: element_text(a),
            url: attr(a, "href"),
        })
        .collect();

    let images = html
        .select(&SEL_IMAGES)
        .map(|img| Image {
            src: attr(img, "src"),
            alt: attr(img, "alt"),
        })
        .collect();

    let tables = html
        .select(&SEL_TABLES)
        .map(|table| {
            table
                .select(&SEL_ROWS)
                .map(|row| row.select(&SEL_CELLS).map(element_text).collect())
                .collect()
        })
        .collect();

    let forms = html
        .select(&SEL_FORMS)
        .map(|form| Form {
            action: attr(form, "action"),
            method: attr(form, "method"),
            inputs: form
                .select(&SEL_INPUTS)
                .map(|inp| {
                    let declared = attr(inp, "type");
                    FormInput {
                        input_type: if declared.is_empty() {
                            inp.value().name().to_string()
                        } else {
                            declared
                        },
                        name: attr(inp, "name"),
                        placeholder: attr(inp, "placeholder"),
                        value: attr(inp, "value"),
                    }
                })
                .collect(),
        })
        .collect();

    SectionRecord {
        kind,
        path: path.to_string(),
        title: page_title(html),
        headings,
        links,
        images,
        tables,
        forms,
        text_content: document_text(html),
        projects_info: None,
    }
}

/// Project entries on a gallery/submissions page.
pub fn extract_projects(html: &Html, base_url: &str) -> ProjectsInfo {
    let mut seen = HashSet::new();
    let mut containers: Vec<ElementRef<'_>> = Vec::new();

    for el in html.select(&SEL_CLASSED_CONTAINERS) {
        if classify::class_matches(el.value().attr("class").unwrap_or(""), PROJECT_CONTAINER_CLASSES)
            && seen.insert(el.id())
        {
            containers.push(el);
        }
    }
    for selector in SEL_SITE_CONTAINERS.iter() {
        for el in html.select(selector) {
            if seen.insert(el.id()) {
                containers.push(el);
            }
        }
    }

    let mut info = ProjectsInfo::default();

    if containers.is_empty() {
        info.project_links = project_links_fallback(html, base_url);
        info.winning_projects = info
            .project_links
            .iter()
            .filter(|p| p.is_winner)
            .cloned()
            .collect();
        return info;
    }

    for container in containers {
        let Some(title) = SEL_TITLE_CANDIDATES.iter().find_map(|s| {
            container
                .select(s)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
        }) else {
            continue;
        };
        let Some(href) = container
            .select(&SEL_LINKS)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let entry = ProjectEntry {
            title,
            url: resolve_url(base_url, href.trim()),
            is_winner: classify::is_winner(
                &element_text(container),
                container.value().attr("class").unwrap_or(""),
            ),
        };
        if entry.is_winner {
            info.winning_projects.push(entry.clone());
        }
        info.all_projects.push(entry);
    }

    tracing::debug!(
        projects = info.all_projects.len(),
        winners = info.winning_projects.len(),
        "extracted project containers"
    );
    info
}

fn project_links_fallback(html: &Html, base_url: &str) -> Vec<ProjectEntry> {
    html.select(&SEL_LINKS)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if !PROJECT_LINK_PATHS.iter().any(|p| href.contains(p)) {
                return None;
            }
            let text = element_text(a);
            if text.chars().count() <= 3 {
                return None;
            }
            let is_winner = classify::is_winner(&text, a.value().attr("class").unwrap_or(""));
            Some(ProjectEntry {
                title: text,
                url: resolve_url(base_url, href),
                is_winner,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GALLERY: &str = r#"
        <html><head><title>Project Gallery</title></head><body>
          <h1>Gallery</h1>
          <div class="gallery-item software-entry">
            <h5>Alpha Bot</h5>
            <a href="/software/alpha-bot">view</a>
            <aside class="entry-badge">Winner</aside>
          </div>
          <div class="gallery-item software-entry">
            <h5>Beta Tool</h5>
            <a href="https://devpost.com/software/beta-tool">view</a>
          </div>
          <table><tr><th>Place</th><th>Team</th></tr><tr><td>1</td><td>Alpha</td></tr></table>
          <form action="/search" method="get"><input name="q" placeholder="Search"><textarea name="t"></textarea></form>
        </body></html>"#;

    #[test]
    fn shallow_fields_are_extracted() {
        let doc = Document::new("https://ev.devpost.com/project-gallery", GALLERY);
        let rec = extract_section(&doc, SectionKind::ProjectGallery, "/project-gallery");
        assert_eq!(rec.title, "Project Gallery");
        assert_eq!(rec.headings[0], Heading { level: 1, text: "Gallery".into() });
        assert_eq!(rec.headings[1].level, 5);
        assert_eq!(rec.tables, vec![vec![
            vec!["Place".to_string(), "Team".to_string()],
            vec!["1".to_string(), "Alpha".to_string()],
        ]]);
        assert_eq!(rec.forms[0].method, "get");
        assert_eq!(rec.forms[0].inputs[0].input_type, "input");
        assert_eq!(rec.forms[0].inputs[1].input_type, "textarea");
        assert!(rec.projects_info.is_none());
    }

    #[test]
    fn containers_yield_entries_with_winner_flag() {
        let doc = Document::new("https://ev.devpost.com/submissions", GALLERY);
        let rec = extract_section(&doc, SectionKind::Projects, "/submissions");
        let info = rec.projects_info.unwrap();
        assert_eq!(info.all_projects.len(), 2);
        assert!(info.project_links.is_empty());
        assert_eq!(info.all_projects[0].title, "Alpha Bot");
        assert_eq!(info.all_projects[0].url, "https://ev.devpost.com/software/alpha-bot");
        assert!(info.all_projects[0].is_winner);
        assert!(!info.all_projects[1].is_winner);
        assert_eq!(info.winning_projects.len(), 1);
    }

    #[test]
    fn link_fallback_fires_only_without_containers() {
        let html = Html::parse_document(
            r#"<html><body>
                <a href="/software/gamma-app">Gamma App (1st place)</a>
                <a href="/software/x">abc</a>
                <a href="/rules">Rules and more</a>
            </body></html>"#,
        );
        let info = extract_projects(&html, "https://ev.devpost.com");
        assert!(info.all_projects.is_empty());
        assert_eq!(info.project_links.len(), 1);
        assert_eq!(info.project_links[0].url, "https://ev.devpost.com/software/gamma-app");
        assert!(info.project_links[0].is_winner);
        assert_eq!(info.winning_projects.len(), 1);
        assert_eq!(info.entries().len(), 1);
    }

    #[test]
    fn resolve_url_joins_relative_paths() {
        assert_eq!(resolve_url("https://a.devpost.com", "/rules"), "https://a.devpost.com/rules");
        assert_eq!(resolve_url("https://a.devpost.com/x", "http://b.com/y"), "http://b.com/y");
    }
}
