//! Symbol name lookup, independent of the full-text and vector indexes.

use crate::model::{Symbol, SymbolKind};

use super::{MetadataStore, StoreError};

/// A symbol match paired with the ID of the chunk it was found in.
#[derive(Debug, Clone)]
pub struct SymbolMatch {
    pub chunk_id: String,
    pub symbol: Symbol,
}

impl MetadataStore {
    /// Substring match on symbol name, scoped to a project's chunks.
    pub fn search_symbols(
        &self,
        project_id: &str,
        substring: &str,
        limit: u32,
    ) -> Result<Vec<SymbolMatch>, StoreError> {
        let project_id = project_id.to_string();
        let pattern = format!("%{substring}%");
        let rows: Vec<(String, String, String, i64, i64, String, Option<String>)> =
            self.runtime.block_on(async {
                sqlx::query_as(
                    "SELECT s.chunk_id, s.name, s.kind, s.start_line, s.end_line, s.signature, s.doc_comment
                     FROM symbols s
                     JOIN chunks c ON s.chunk_id = c.id
                     JOIN files f ON c.file_id = f.id
                     WHERE f.project_id = ? AND s.name LIKE ? ESCAPE '\\'
                     ORDER BY LENGTH(s.name), s.name
                     LIMIT ?",
                )
                .bind(&project_id)
                .bind(&pattern)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            })?;

        Ok(rows
            .into_iter()
            .map(
                |(chunk_id, name, kind, start_line, end_line, signature, doc_comment)| SymbolMatch {
                    chunk_id,
                    symbol: Symbol {
                        name,
                        kind: kind.parse().unwrap_or(SymbolKind::Function),
                        start_line: start_line as u32,
                        end_line: end_line as u32,
                        signature,
                        doc_comment,
                    },
                },
            )
            .collect())
    }
}
