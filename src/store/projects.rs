//! Project registration and aggregate stat bookkeeping.

use crate::model::Project;

use super::{MetadataStore, StoreError};

impl MetadataStore {
    pub fn save_project(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        self.runtime.block_on(async {
            sqlx::query(
                "INSERT INTO projects (id, name, root_path, type, file_count, chunk_count, indexed_at, version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     root_path = excluded.root_path,
                     type = excluded.type,
                     indexed_at = excluded.indexed_at,
                     version = excluded.version",
            )
            .bind(&project.id)
            .bind(&project.name)
            .bind(&project.root_path)
            .bind(&project.project_type)
            .bind(project.file_count as i64)
            .bind(project.chunk_count as i64)
            .bind(project.indexed_at)
            .bind(&project.version)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let id = id.to_string();
        self.runtime.block_on(async {
            let row: Option<(String, String, String, String, i64, i64, i64, String)> =
                sqlx::query_as(
                    "SELECT id, name, root_path, type, file_count, chunk_count, indexed_at, version
                     FROM projects WHERE id = ?",
                )
                .bind(&id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(
                |(id, name, root_path, project_type, file_count, chunk_count, indexed_at, version)| {
                    Project {
                        id,
                        name,
                        root_path,
                        project_type,
                        file_count: file_count as u64,
                        chunk_count: chunk_count as u64,
                        indexed_at,
                        version,
                    }
                },
            ))
        })
    }

    /// Set `file_count`/`chunk_count` to caller-supplied values directly,
    /// without touching the `files`/`chunks` tables. Use when the caller
    /// already knows the counts cheaply; use [`Self::refresh_project_stats`]
    /// to recompute them from storage instead.
    pub fn update_project_stats(
        &self,
        project_id: &str,
        file_count: u64,
        chunk_count: u64,
    ) -> Result<(), StoreError> {
        let project_id = project_id.to_string();
        self.runtime.block_on(async {
            sqlx::query("UPDATE projects SET file_count = ?, chunk_count = ? WHERE id = ?")
                .bind(file_count as i64)
                .bind(chunk_count as i64)
                .bind(&project_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    /// Recompute `file_count`/`chunk_count` from the `files`/`chunks` tables.
    /// Call after any bulk add/delete so project-level stats stay accurate
    /// without every mutation site needing to maintain a running counter.
    pub fn refresh_project_stats(&self, project_id: &str) -> Result<(), StoreError> {
        let project_id = project_id.to_string();
        self.runtime.block_on(async {
            let (file_count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM files WHERE project_id = ?")
                    .bind(&project_id)
                    .fetch_one(&self.pool)
                    .await?;
            let (chunk_count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM chunks c JOIN files f ON c.file_id = f.id WHERE f.project_id = ?",
            )
            .bind(&project_id)
            .fetch_one(&self.pool)
            .await?;
            sqlx::query("UPDATE projects SET file_count = ?, chunk_count = ? WHERE id = ?")
                .bind(file_count)
                .bind(chunk_count)
                .bind(&project_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }
}
