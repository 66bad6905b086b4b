//! File-level bookkeeping used by the reconciliation pass that decides which
//! files changed since the last index run.

use crate::model::{ContentType, FileRecord};

use super::{cursor, MetadataStore, Page, StoreError};

type FileRow = (String, String, String, i64, i64, String, String, String, i64);

fn row_to_file(row: FileRow) -> FileRecord {
    let (id, project_id, path, size, mod_time, content_hash, language, content_type, indexed_at) =
        row;
    FileRecord {
        id,
        project_id,
        path,
        size: size as u64,
        mod_time,
        content_hash,
        language,
        content_type: content_type.parse().unwrap_or(ContentType::Text),
        indexed_at,
    }
}

impl MetadataStore {
    pub fn save_files(&self, files: &[FileRecord]) -> Result<(), StoreError> {
        let files = files.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for file in &files {
                sqlx::query(
                    "INSERT INTO files (id, project_id, path, size, mod_time, content_hash, language, content_type, indexed_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(project_id, path) DO UPDATE SET
                         size = excluded.size,
                         mod_time = excluded.mod_time,
                         content_hash = excluded.content_hash,
                         language = excluded.language,
                         content_type = excluded.content_type,
                         indexed_at = excluded.indexed_at",
                )
                .bind(&file.id)
                .bind(&file.project_id)
                .bind(&file.path)
                .bind(file.size as i64)
                .bind(file.mod_time)
                .bind(&file.content_hash)
                .bind(&file.language)
                .bind(file.content_type.as_str())
                .bind(file.indexed_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    pub fn get_file_by_path(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        let project_id = project_id.to_string();
        let path = path.to_string();
        self.runtime.block_on(async {
            let row: Option<FileRow> = sqlx::query_as(
                "SELECT id, project_id, path, size, mod_time, content_hash, language, content_type, indexed_at
                 FROM files WHERE project_id = ? AND path = ?",
            )
            .bind(&project_id)
            .bind(&path)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(row_to_file))
        })
    }

    /// Files in `project_id` whose recorded `content_hash` no longer matches
    /// the on-disk hash the caller just computed, keyed by path. Used to
    /// narrow a reindex to only the files that actually changed.
    pub fn get_changed_files(
        &self,
        project_id: &str,
        current_hashes: &[(String, String)],
    ) -> Result<Vec<String>, StoreError> {
        let mut changed = Vec::new();
        for (path, hash) in current_hashes {
            match self.get_file_by_path(project_id, path)? {
                Some(existing) if existing.content_hash == *hash => {}
                _ => changed.push(path.clone()),
            }
        }
        Ok(changed)
    }

    pub fn list_files(
        &self,
        project_id: &str,
        cursor_token: Option<&str>,
        limit: u32,
    ) -> Result<Page<FileRecord>, StoreError> {
        let offset = match cursor_token {
            Some(c) => cursor::decode(c)?,
            None => 0,
        };
        let project_id = project_id.to_string();
        let rows: Vec<FileRow> = self.runtime.block_on(async {
            sqlx::query_as(
                "SELECT id, project_id, path, size, mod_time, content_hash, language, content_type, indexed_at
                 FROM files WHERE project_id = ? ORDER BY path LIMIT ? OFFSET ?",
            )
            .bind(&project_id)
            .bind(limit as i64 + 1)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
        })?;

        let has_more = rows.len() as u32 > limit;
        let mut items: Vec<FileRecord> = rows.into_iter().map(row_to_file).collect();
        items.truncate(limit as usize);
        let next_cursor = has_more.then(|| cursor::encode(offset + limit as u64));
        Ok(Page { items, next_cursor })
    }

    pub fn get_file_paths_by_project(&self, project_id: &str) -> Result<Vec<String>, StoreError> {
        let project_id = project_id.to_string();
        self.runtime.block_on(async {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT path FROM files WHERE project_id = ?")
                    .bind(&project_id)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(p,)| p).collect())
        })
    }

    /// All tracked `(path, content_hash)` pairs for a project, the shape a
    /// reconciliation pass needs to diff against a fresh filesystem scan.
    pub fn get_files_for_reconciliation(
        &self,
        project_id: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let project_id = project_id.to_string();
        self.runtime.block_on(async {
            let rows: Vec<(String, String)> =
                sqlx::query_as("SELECT path, content_hash FROM files WHERE project_id = ?")
                    .bind(&project_id)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        })
    }

    pub fn list_file_paths_under(
        &self,
        project_id: &str,
        path_prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        let project_id = project_id.to_string();
        let pattern = format!("{path_prefix}%");
        self.runtime.block_on(async {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT path FROM files WHERE project_id = ? AND path LIKE ? ESCAPE '\\'",
            )
            .bind(&project_id)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(p,)| p).collect())
        })
    }

    /// Remove a file and, via `ON DELETE CASCADE`, every chunk and symbol
    /// that belonged to it.
    pub fn delete_file(&self, project_id: &str, path: &str) -> Result<(), StoreError> {
        let project_id = project_id.to_string();
        let path = path.to_string();
        self.runtime.block_on(async {
            sqlx::query("DELETE FROM files WHERE project_id = ? AND path = ?")
                .bind(&project_id)
                .bind(&path)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    pub fn delete_files_by_project(&self, project_id: &str) -> Result<(), StoreError> {
        let project_id = project_id.to_string();
        self.runtime.block_on(async {
            sqlx::query("DELETE FROM files WHERE project_id = ?")
                .bind(&project_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{file_id, now_unix};

    fn sample_file(project_id: &str, path: &str, hash: &str) -> FileRecord {
        FileRecord {
            id: file_id(path),
            project_id: project_id.to_string(),
            path: path.to_string(),
            size: 100,
            mod_time: now_unix(),
            content_hash: hash.to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            indexed_at: now_unix(),
        }
    }

    #[test]
    fn save_and_fetch_by_path() {
        let store = MetadataStore::open_in_memory().unwrap();
        let file = sample_file("p1", "src/lib.rs", "hash1");
        store.save_files(&[file.clone()]).unwrap();

        let loaded = store.get_file_by_path("p1", "src/lib.rs").unwrap().unwrap();
        assert_eq!(loaded.content_hash, "hash1");
    }

    #[test]
    fn changed_files_detects_hash_drift() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .save_files(&[
                sample_file("p1", "a.rs", "hash_a"),
                sample_file("p1", "b.rs", "hash_b"),
            ])
            .unwrap();

        let changed = store
            .get_changed_files(
                "p1",
                &[
                    ("a.rs".to_string(), "hash_a".to_string()),
                    ("b.rs".to_string(), "hash_b_modified".to_string()),
                    ("c.rs".to_string(), "hash_c".to_string()),
                ],
            )
            .unwrap();

        assert_eq!(changed.len(), 2);
        assert!(changed.contains(&"b.rs".to_string()));
        assert!(changed.contains(&"c.rs".to_string()));
    }

    #[test]
    fn list_files_paginates() {
        let store = MetadataStore::open_in_memory().unwrap();
        let files: Vec<_> = (0..5)
            .map(|i| sample_file("p1", &format!("file{i}.rs"), "h"))
            .collect();
        store.save_files(&files).unwrap();

        let page1 = store.list_files("p1", None, 2).unwrap();
        assert_eq!(page1.items.len(), 2);
        assert!(page1.next_cursor.is_some());

        let page2 = store
            .list_files("p1", page1.next_cursor.as_deref(), 2)
            .unwrap();
        assert_eq!(page2.items.len(), 2);

        let page3 = store
            .list_files("p1", page2.next_cursor.as_deref(), 2)
            .unwrap();
        assert_eq!(page3.items.len(), 1);
        assert!(page3.next_cursor.is_none());
    }

    #[test]
    fn delete_file_removes_it() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .save_files(&[sample_file("p1", "a.rs", "hash_a")])
            .unwrap();
        store.delete_file("p1", "a.rs").unwrap();
        assert!(store.get_file_by_path("p1", "a.rs").unwrap().is_none());
    }
}
