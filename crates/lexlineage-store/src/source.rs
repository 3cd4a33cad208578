//! Read-only, paginated statute sources.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lexlineage_core::{Province, ScopeConfig, Statute};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::StoreError;

/// A paginated collection of statutes keyed by id.
#[async_trait]
pub trait StatuteSource: Send + Sync {
    /// Up to `limit` statutes starting at `offset`. A page shorter than
    /// `limit` marks the end of the collection.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Statute>, StoreError>;

    fn describe(&self) -> String;
}

/// Statutes held in memory. Used by tests and by callers that already have
/// the records loaded.
pub struct MemorySource {
    statutes: Vec<Statute>,
}

impl MemorySource {
    pub fn new(statutes: Vec<Statute>) -> Self {
        Self { statutes }
    }
}

#[async_trait]
impl StatuteSource for MemorySource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Statute>, StoreError> {
        Ok(self
            .statutes
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        format!("memory ({} statutes)", self.statutes.len())
    }
}

/// Statutes from a JSON file: either a top-level array or JSON Lines.
///
/// The file is read once, on the first page request.
pub struct JsonFileSource {
    path: PathBuf,
    statutes: OnceCell<Vec<Statute>>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            statutes: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn statutes(&self) -> Result<&Vec<Statute>, StoreError> {
        self.statutes
            .get_or_try_init(|| async {
                if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
                    return Err(StoreError::NotFound(self.path.clone()));
                }
                let content = tokio::fs::read_to_string(&self.path).await?;
                let statutes = parse_statutes(&content)?;
                info!(path = %self.path.display(), count = statutes.len(), "loaded statute file");
                Ok(statutes)
            })
            .await
    }
}

#[async_trait]
impl StatuteSource for JsonFileSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Statute>, StoreError> {
        let statutes = self.statutes().await?;
        Ok(statutes.iter().skip(offset).take(limit).cloned().collect())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse a JSON array of statutes, or one statute per line.
pub fn parse_statutes(content: &str) -> Result<Vec<Statute>, StoreError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Record { line: i + 1, source })
        })
        .collect()
}

fn in_scope(statute: &Statute, provinces: &[Province], ids: &HashSet<&str>) -> bool {
    (provinces.is_empty() || provinces.contains(&Province::of(statute)))
        && (ids.is_empty() || ids.contains(statute.id.as_str()))
}

/// Drain a source page by page, applying the optional scope.
///
/// Repeated ids keep their first occurrence.
pub async fn load_all(
    source: &dyn StatuteSource,
    page_size: usize,
    scope: &ScopeConfig,
) -> Result<Vec<Statute>, StoreError> {
    let page_size = page_size.max(1);
    let provinces: Vec<Province> = scope
        .jurisdictions
        .iter()
        .map(|j| Province::from_label(Some(j.as_str())))
        .collect();
    let ids: HashSet<&str> = scope.statute_ids.iter().map(String::as_str).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut offset = 0;
    loop {
        let page = source.fetch_page(offset, page_size).await?;
        let fetched = page.len();
        for statute in page {
            if !in_scope(&statute, &provinces, &ids) {
                continue;
            }
            if !seen.insert(statute.id.clone()) {
                warn!(statute_id = %statute.id, "duplicate statute id, keeping first occurrence");
                continue;
            }
            out.push(statute);
        }
        if fetched < page_size {
            break;
        }
        offset += fetched;
    }

    info!(source = %source.describe(), count = out.len(), "loaded statutes");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statutes(n: usize) -> Vec<Statute> {
        (0..n)
            .map(|i| {
                let province = if i % 2 == 0 { "Punjab" } else { "Sindh" };
                Statute::titled(format!("s{i}"), format!("Act {i}")).with_jurisdiction(province)
            })
            .collect()
    }

    #[tokio::test]
    async fn memory_source_pages() {
        let source = MemorySource::new(statutes(5));
        assert_eq!(source.fetch_page(0, 2).await.unwrap().len(), 2);
        assert_eq!(source.fetch_page(4, 2).await.unwrap().len(), 1);
        assert!(source.fetch_page(10, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_all_drains_every_page() {
        let source = MemorySource::new(statutes(7));
        let all = load_all(&source, 3, &ScopeConfig::default()).await.unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all[6].id, "s6");
    }

    #[tokio::test]
    async fn load_all_exact_multiple_of_page_size() {
        let source = MemorySource::new(statutes(6));
        let all = load_all(&source, 3, &ScopeConfig::default()).await.unwrap();
        assert_eq!(all.len(), 6);
    }

    #[tokio::test]
    async fn scope_filters_by_province_and_id() {
        let source = MemorySource::new(statutes(6));
        let scope = ScopeConfig {
            jurisdictions: vec!["punjab".into()],
            statute_ids: vec![],
        };
        let punjab = load_all(&source, 100, &scope).await.unwrap();
        assert_eq!(
            punjab.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["s0", "s2", "s4"]
        );

        let scope = ScopeConfig {
            jurisdictions: vec!["Punjab".into()],
            statute_ids: vec!["s2".into(), "s3".into()],
        };
        let both = load_all(&source, 100, &scope).await.unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "s2");
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first() {
        let mut records = statutes(2);
        let mut dup = records[0].clone();
        dup.title = Some("Other".into());
        records.push(dup);
        let all = load_all(&MemorySource::new(records), 10, &ScopeConfig::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title.as_deref(), Some("Act 0"));
    }

    #[test]
    fn parses_array_and_lines() {
        let array = r#"[{"id":"a","title":"A Act"},{"id":"b"}]"#;
        let parsed = parse_statutes(array).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[1].title.is_none());

        let lines = "{\"id\":\"a\"}\n\n{\"id\":\"b\",\"jurisdiction\":\"KP\"}\n";
        let parsed = parse_statutes(lines).unwrap();
        assert_eq!(parsed[1].jurisdiction.as_deref(), Some("KP"));
    }

    #[test]
    fn bad_line_reports_line_number() {
        let lines = "{\"id\":\"a\"}\n{not json}\n";
        let err = parse_statutes(lines).unwrap_err();
        assert!(matches!(err, StoreError::Record { line: 2, .. }));
    }

    #[tokio::test]
    async fn json_file_source_reads_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("statutes.jsonl");
        std::fs::write(&path, "{\"id\":\"a\"}\n{\"id\":\"b\"}\n").unwrap();
        let source = JsonFileSource::new(&path);
        assert_eq!(source.fetch_page(0, 10).await.unwrap().len(), 2);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(source.fetch_page(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn json_file_source_missing_file() {
        let source = JsonFileSource::new("/nonexistent/statutes.json");
        let err = source.fetch_page(0, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
