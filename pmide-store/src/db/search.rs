//! Fuzzy search across a project's items

use pmide_common::fuzzy::rank_fields;
use pmide_common::Result;
use sqlx::SqlitePool;

use super::{conversations, documents, folders, outputs};
use crate::models::SearchResult;

pub const MAX_RESULTS: usize = 50;
const SNIPPET_CHARS: usize = 120;
const NAME_WEIGHT: f64 = 1.0;
const CONTENT_WEIGHT: f64 = 0.4;

struct Candidate {
    item_type: &'static str,
    id: String,
    name: String,
    folder_id: Option<String>,
    body: String,
}

fn snippet(body: &str) -> Option<String> {
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return None;
    }
    if flat.chars().count() <= SNIPPET_CHARS {
        return Some(flat);
    }
    let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
    Some(format!("{}…", cut.trim_end()))
}

/// Rank documents, outputs, folders and conversations by name and content
pub async fn search_project_items(pool: &SqlitePool, project_id: &str, query: &str) -> Result<Vec<SearchResult>> {
    let mut candidates = Vec::new();

    for doc in documents::list_context_documents(pool, project_id).await? {
        candidates.push(Candidate {
            item_type: "document",
            id: doc.id,
            name: doc.name,
            folder_id: doc.folder_id,
            body: doc.content,
        });
    }
    for output in outputs::list_framework_outputs(pool, project_id).await? {
        candidates.push(Candidate {
            item_type: "output",
            id: output.id,
            name: output.name,
            folder_id: output.folder_id,
            body: output.generated_content,
        });
    }
    for folder in folders::list_folders(pool, project_id).await? {
        candidates.push(Candidate {
            item_type: "folder",
            id: folder.id,
            name: folder.name,
            folder_id: folder.parent_id,
            body: String::new(),
        });
    }
    for conversation in conversations::list_conversations(pool, project_id).await? {
        candidates.push(Candidate {
            item_type: "conversation",
            id: conversation.id,
            name: conversation.title,
            folder_id: None,
            body: String::new(),
        });
    }

    let ranked = rank_fields(query, candidates, |c| {
        vec![(c.name.as_str(), NAME_WEIGHT), (c.body.as_str(), CONTENT_WEIGHT)]
    });

    Ok(ranked
        .into_iter()
        .take(MAX_RESULTS)
        .map(|r| SearchResult {
            item_type: r.item.item_type.to_string(),
            snippet: snippet(&r.item.body),
            id: r.item.id,
            name: r.item.name,
            folder_id: r.item.folder_id,
            score: r.score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_flattens_and_truncates() {
        assert_eq!(snippet(""), None);
        assert_eq!(snippet("  a\n\n b  "), Some("a b".to_string()));
        let long = "word ".repeat(60);
        let s = snippet(&long).unwrap();
        assert!(s.ends_with('…'));
        assert!(s.chars().count() <= SNIPPET_CHARS + 1);
    }
}
