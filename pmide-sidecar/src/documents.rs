//! Context document ingestion
//!
//! Turns a URL, a Google Doc link or pasted text into plain text the UI can
//! attach to a project. PDF text extraction is not supported.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use pmide_common::Error;

/// Sent on page fetches; some sites refuse unknown agents
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TITLE_CHARS: usize = 100;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| compile(r"(?is)<title[^>]*>(.*?)</title\s*>"));
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!--.*?-->"));
static DROPPED_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "nav", "footer", "header"]
        .iter()
        .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
        .collect()
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<[^>]*>"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| compile(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| compile(r"\n\s*\n"));
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| compile(r"^https?://(www\.)?"));
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| compile(r"[/_-]"));
static GOOGLE_DOC_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"docs\.google\.com/document/d/([a-zA-Z0-9_-]+)"),
        compile(r"drive\.google\.com/file/d/([a-zA-Z0-9_-]+)"),
    ]
});

// Built-in literal patterns only
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern}: {e}"),
    }
}

/// `POST /documents/parse` body
#[derive(Debug, Clone, Deserialize)]
pub struct ParseRequest {
    pub doc_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub content: String,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

/// Dispatch on `doc_type`: `text`, `url`, `google_doc` or `pdf`
pub async fn parse_document(http: &reqwest::Client, request: &ParseRequest) -> ApiResult<ParsedDocument> {
    match request.doc_type.as_str() {
        "text" => Ok(ParsedDocument {
            content: request.content.clone().unwrap_or_default(),
            title: "Text Document".to_string(),
            doc_type: "text".to_string(),
        }),
        "url" => fetch_url(http, &request.source).await,
        "google_doc" => fetch_google_doc(http, &request.source).await,
        "pdf" => Err(Error::InvalidInput("PDF parsing not available".to_string()).into()),
        other => Err(Error::InvalidInput(format!("Unsupported document type: {}", other)).into()),
    }
}

async fn fetch_url(http: &reqwest::Client, url: &str) -> ApiResult<ParsedDocument> {
    if url.trim().is_empty() {
        return Err(Error::InvalidInput("URL is required".to_string()).into());
    }

    let response = http
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to fetch URL: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        warn!("Fetching {} returned {}", url, status);
        return Err(ApiError::Upstream(format!("Failed to fetch URL: HTTP {}", status.as_u16())));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if content_type.contains("application/pdf") {
        return Err(Error::InvalidInput("PDF parsing not available".to_string()).into());
    }
    if !content_type.contains("text/html") && !content_type.contains("text/plain") {
        return Err(Error::InvalidInput(format!("Unsupported content type: {}", content_type)).into());
    }

    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to read URL body: {}", e)))?;

    let (content, title) = if content_type.contains("text/html") {
        let title = html_title(&body).unwrap_or_else(|| extract_title_from_url(url));
        (html_to_text(&body), title)
    } else {
        (body, extract_title_from_url(url))
    };

    info!("Fetched {} characters from {}", content.len(), url);
    Ok(ParsedDocument {
        content,
        title,
        doc_type: "html".to_string(),
    })
}

async fn fetch_google_doc(http: &reqwest::Client, url: &str) -> ApiResult<ParsedDocument> {
    let doc_id = google_doc_id(url)
        .ok_or_else(|| Error::InvalidInput("Invalid Google Docs URL format".to_string()))?;
    let export_url = format!("https://docs.google.com/document/d/{}/export?format=txt", doc_id);

    let response = http
        .get(&export_url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Unable to fetch Google Doc: {}", e)))?;

    // Private docs bounce to the sign-in page instead of failing
    if response.url().host_str() == Some("accounts.google.com") {
        return Err(Error::InvalidInput(
            "This Google Doc is private. Share it with \"Anyone with the link\" or paste the content as text instead"
                .to_string(),
        )
        .into());
    }
    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "Unable to fetch Google Doc: HTTP {}",
            response.status().as_u16()
        )));
    }

    let content = response
        .text()
        .await
        .map_err(|e| ApiError::Upstream(format!("Unable to fetch Google Doc: {}", e)))?;
    info!("Fetched {} characters from Google Docs", content.len());

    let short_id: String = doc_id.chars().take(8).collect();
    Ok(ParsedDocument {
        content,
        title: format!("Google Doc ({}...)", short_id),
        doc_type: "google_doc".to_string(),
    })
}

/// Document id from a Docs or Drive link
pub fn google_doc_id(url: &str) -> Option<String> {
    GOOGLE_DOC_RES
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Readable title from a URL: `https://www.example.com/product-roadmap` → `Example.com Product Roadmap`
pub fn extract_title_from_url(url: &str) -> String {
    let without_scheme = SCHEME_RE.replace(url, "");
    let path = without_scheme.split('?').next().unwrap_or("");
    let spaced = SEPARATOR_RE.replace_all(path, " ");
    let title = spaced
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    title.chars().take(MAX_TITLE_CHARS).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn html_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Visible text of a page, one text run per line
pub fn html_to_text(html: &str) -> String {
    let mut text = COMMENT_RE.replace_all(html, "").into_owned();
    for re in DROPPED_ELEMENTS.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    let stripped = TAG_RE.replace_all(&text, "\n");
    let decoded = decode_entities(&stripped);

    let joined = decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").into_owned()
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "mdash" => Some('\u{2014}'),
                    "ndash" => Some('\u{2013}'),
                    "hellip" => Some('\u{2026}'),
                    "copy" => Some('\u{a9}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            extract_title_from_url("https://www.example.com/blog/product_roadmap-2024?utm=x"),
            "Example.com Blog Product Roadmap 2024"
        );
        assert_eq!(extract_title_from_url("http://acme.io/ABOUT"), "Acme.io About");

        let long = format!("https://example.com/{}", "a".repeat(300));
        assert_eq!(extract_title_from_url(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_google_doc_id() {
        assert_eq!(
            google_doc_id("https://docs.google.com/document/d/1AbC_d-E9/edit#heading=h.1").as_deref(),
            Some("1AbC_d-E9")
        );
        assert_eq!(
            google_doc_id("https://drive.google.com/file/d/XyZ123/view").as_deref(),
            Some("XyZ123")
        );
        assert_eq!(google_doc_id("https://example.com/document/d/nope"), None);
    }

    #[test]
    fn test_html_to_text_drops_chrome() {
        let html = r#"<html><head><title>Roadmap</title><style>p { color: red }</style></head>
<body>
  <header><a href="/">Home</a></header>
  <nav>Menu</nav>
  <h1>Q3 Roadmap</h1>
  <!-- hidden -->
  <p>Ship &amp; learn &lt;fast&gt;</p>


  <p>Then&#32;iterate &#x2713;</p>
  <script>var x = "<p>not text</p>";</script>
  <footer>© Acme</footer>
</body></html>"#;

        let text = html_to_text(html);

        assert_eq!(text, "Roadmap\nQ3 Roadmap\nShip & learn <fast>\nThen iterate \u{2713}");
    }

    #[test]
    fn test_html_title_decodes_entities() {
        assert_eq!(html_title("<title> Q&amp;A </title>").as_deref(), Some("Q&A"));
        assert_eq!(html_title("<p>no title</p>"), None);
    }

    #[test]
    fn test_unknown_entity_is_left_alone() {
        assert_eq!(decode_entities("&bogus; &amp;"), "&bogus; &");
    }

    #[tokio::test]
    async fn test_text_and_pdf_types() {
        let http = reqwest::Client::new();

        let text = parse_document(
            &http,
            &ParseRequest {
                doc_type: "text".to_string(),
                source: String::new(),
                content: Some("notes".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(text.title, "Text Document");
        assert_eq!(text.content, "notes");

        let pdf = parse_document(
            &http,
            &ParseRequest {
                doc_type: "pdf".to_string(),
                source: "file.pdf".to_string(),
                content: None,
            },
        )
        .await;
        assert!(matches!(pdf, Err(ApiError::Common(Error::InvalidInput(_)))));
    }
}
