//! Chunk storage, including the optional embedding blob attached once the
//! embedding stage of an indexing run completes.

use crate::model::{Chunk, ChunkEmbedding, ContentType, Symbol, SymbolKind};

use super::{MetadataStore, StoreError};

type ChunkRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    i64,
    i64,
);

fn row_to_chunk(row: ChunkRow) -> Chunk {
    let (
        id,
        file_id,
        file_path,
        content,
        raw_content,
        context,
        content_type,
        language,
        start_line,
        end_line,
        metadata_json,
        created_at,
        updated_at,
    ) = row;
    let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    Chunk {
        id,
        file_id,
        file_path,
        content,
        raw_content,
        context,
        content_type: content_type.parse().unwrap_or(ContentType::Text),
        language,
        start_line: start_line as u32,
        end_line: end_line as u32,
        symbols: Vec::new(),
        metadata,
        embedding: None,
        created_at,
        updated_at,
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl MetadataStore {
    pub fn save_chunks(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        let chunks = chunks.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for chunk in &chunks {
                let metadata_json = serde_json::to_string(&chunk.metadata).unwrap_or_default();
                let (embedding_bytes, embedding_model): (Option<Vec<u8>>, Option<&str>) =
                    match &chunk.embedding {
                        Some(e) => (Some(encode_embedding(&e.vector)), Some(e.model.as_str())),
                        None => (None, None),
                    };

                sqlx::query(
                    "INSERT INTO chunks (id, file_id, file_path, content, raw_content, context, content_type, language, start_line, end_line, metadata_json, embedding_bytes, embedding_model, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                         content = excluded.content,
                         raw_content = excluded.raw_content,
                         context = excluded.context,
                         content_type = excluded.content_type,
                         language = excluded.language,
                         start_line = excluded.start_line,
                         end_line = excluded.end_line,
                         metadata_json = excluded.metadata_json,
                         embedding_bytes = excluded.embedding_bytes,
                         embedding_model = excluded.embedding_model,
                         updated_at = excluded.updated_at",
                )
                .bind(&chunk.id)
                .bind(&chunk.file_id)
                .bind(&chunk.file_path)
                .bind(&chunk.content)
                .bind(&chunk.raw_content)
                .bind(&chunk.context)
                .bind(chunk.content_type.as_str())
                .bind(&chunk.language)
                .bind(chunk.start_line as i64)
                .bind(chunk.end_line as i64)
                .bind(&metadata_json)
                .bind(embedding_bytes)
                .bind(embedding_model)
                .bind(chunk.created_at)
                .bind(chunk.updated_at)
                .execute(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM symbols WHERE chunk_id = ?")
                    .bind(&chunk.id)
                    .execute(&mut *tx)
                    .await?;
                for symbol in &chunk.symbols {
                    sqlx::query(
                        "INSERT INTO symbols (chunk_id, name, kind, start_line, end_line, signature, doc_comment)
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(&chunk.id)
                    .bind(&symbol.name)
                    .bind(symbol.kind.as_str())
                    .bind(symbol.start_line as i64)
                    .bind(symbol.end_line as i64)
                    .bind(&symbol.signature)
                    .bind(&symbol.doc_comment)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            tx.commit().await?;
            Ok(())
        })
    }

    pub fn get_chunk(&self, id: &str) -> Result<Option<Chunk>, StoreError> {
        let id = id.to_string();
        let chunk = self.runtime.block_on(async {
            let row: Option<ChunkRow> = sqlx::query_as(
                "SELECT id, file_id, file_path, content, raw_content, context, content_type, language, start_line, end_line, metadata_json, created_at, updated_at
                 FROM chunks WHERE id = ?",
            )
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row.map(row_to_chunk))
        })?;
        match chunk {
            Some(mut c) => {
                c.symbols = self.load_symbols(&c.id)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    pub fn get_chunks(&self, ids: &[String]) -> Result<Vec<Chunk>, StoreError> {
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = self.get_chunk(id)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    pub fn get_chunks_by_file(&self, file_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let file_id = file_id.to_string();
        let rows: Vec<ChunkRow> = self.runtime.block_on(async {
            sqlx::query_as(
                "SELECT id, file_id, file_path, content, raw_content, context, content_type, language, start_line, end_line, metadata_json, created_at, updated_at
                 FROM chunks WHERE file_id = ? ORDER BY start_line",
            )
            .bind(&file_id)
            .fetch_all(&self.pool)
            .await
        })?;
        let mut chunks: Vec<Chunk> = rows.into_iter().map(row_to_chunk).collect();
        for chunk in &mut chunks {
            chunk.symbols = self.load_symbols(&chunk.id)?;
        }
        Ok(chunks)
    }

    fn load_symbols(&self, chunk_id: &str) -> Result<Vec<Symbol>, StoreError> {
        let chunk_id = chunk_id.to_string();
        let rows: Vec<(String, String, i64, i64, String, Option<String>)> =
            self.runtime.block_on(async {
                sqlx::query_as(
                    "SELECT name, kind, start_line, end_line, signature, doc_comment
                     FROM symbols WHERE chunk_id = ?",
                )
                .bind(&chunk_id)
                .fetch_all(&self.pool)
                .await
            })?;
        Ok(rows
            .into_iter()
            .map(|(name, kind, start_line, end_line, signature, doc_comment)| Symbol {
                name,
                kind: kind.parse().unwrap_or(SymbolKind::Function),
                start_line: start_line as u32,
                end_line: end_line as u32,
                signature,
                doc_comment,
            })
            .collect())
    }

    pub fn delete_chunks(&self, ids: &[String]) -> Result<(), StoreError> {
        let ids = ids.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for id in &ids {
                sqlx::query("DELETE FROM chunks WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    pub fn delete_chunks_by_file(&self, file_id: &str) -> Result<(), StoreError> {
        let file_id = file_id.to_string();
        self.runtime.block_on(async {
            sqlx::query("DELETE FROM chunks WHERE file_id = ?")
                .bind(&file_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    pub fn save_chunk_embeddings(
        &self,
        embeddings: &[(String, ChunkEmbedding)],
    ) -> Result<(), StoreError> {
        let embeddings = embeddings.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (chunk_id, embedding) in &embeddings {
                let bytes = encode_embedding(&embedding.vector);
                sqlx::query(
                    "UPDATE chunks SET embedding_bytes = ?, embedding_model = ? WHERE id = ?",
                )
                .bind(bytes)
                .bind(&embedding.model)
                .bind(chunk_id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    /// Every `(chunk_id, vector)` pair currently stored, for rebuilding the
    /// vector index from scratch (e.g. after a metric/dimension change).
    pub fn get_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
        let rows: Vec<(String, Vec<u8>)> = self.runtime.block_on(async {
            sqlx::query_as(
                "SELECT id, embedding_bytes FROM chunks WHERE embedding_bytes IS NOT NULL",
            )
            .fetch_all(&self.pool)
            .await
        })?;
        Ok(rows
            .into_iter()
            .map(|(id, bytes)| (id, decode_embedding(&bytes)))
            .collect())
    }

    /// `(embedded_count, total_count)` for the current chunk population,
    /// used to report embedding progress and decide whether embedding is complete.
    pub fn get_embedding_stats(&self) -> Result<(u64, u64), StoreError> {
        self.runtime.block_on(async {
            let (embedded,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE embedding_bytes IS NOT NULL")
                    .fetch_one(&self.pool)
                    .await?;
            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
                .fetch_one(&self.pool)
                .await?;
            Ok((embedded as u64, total as u64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{chunk_id, file_id, now_unix, FileRecord};
    use std::collections::HashMap;

    fn seed_file(store: &MetadataStore) -> String {
        let fid = file_id("src/lib.rs");
        store
            .save_files(&[FileRecord {
                id: fid.clone(),
                project_id: "p1".to_string(),
                path: "src/lib.rs".to_string(),
                size: 10,
                mod_time: now_unix(),
                content_hash: "h".to_string(),
                language: "rust".to_string(),
                content_type: ContentType::Code,
                indexed_at: now_unix(),
            }])
            .unwrap();
        fid
    }

    fn sample_chunk(file_id: &str) -> Chunk {
        Chunk {
            id: chunk_id("src/lib.rs", "chunk-hash-1"),
            file_id: file_id.to_string(),
            file_path: "src/lib.rs".to_string(),
            content: "fn add(a: i32, b: i32) -> i32 { a + b }".to_string(),
            raw_content: "fn add(a: i32, b: i32) -> i32 { a + b }".to_string(),
            context: String::new(),
            content_type: ContentType::Code,
            language: "rust".to_string(),
            start_line: 1,
            end_line: 1,
            symbols: vec![Symbol {
                name: "add".to_string(),
                kind: SymbolKind::Function,
                start_line: 1,
                end_line: 1,
                signature: "fn add(a: i32, b: i32) -> i32".to_string(),
                doc_comment: None,
            }],
            metadata: HashMap::new(),
            embedding: None,
            created_at: now_unix(),
            updated_at: now_unix(),
        }
    }

    #[test]
    fn save_and_get_chunk_round_trips_symbols() {
        let store = MetadataStore::open_in_memory().unwrap();
        let fid = seed_file(&store);
        let chunk = sample_chunk(&fid);
        store.save_chunks(&[chunk.clone()]).unwrap();

        let loaded = store.get_chunk(&chunk.id).unwrap().unwrap();
        assert_eq!(loaded.content, chunk.content);
        assert_eq!(loaded.symbols.len(), 1);
        assert_eq!(loaded.symbols[0].name, "add");
    }

    #[test]
    fn embeddings_round_trip_through_blob() {
        let store = MetadataStore::open_in_memory().unwrap();
        let fid = seed_file(&store);
        let chunk = sample_chunk(&fid);
        store.save_chunks(&[chunk.clone()]).unwrap();

        let embedding = ChunkEmbedding {
            model: "test-embedder".to_string(),
            vector: vec![0.1, 0.2, 0.3],
        };
        store
            .save_chunk_embeddings(&[(chunk.id.clone(), embedding.clone())])
            .unwrap();

        let all = store.get_all_embeddings().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, chunk.id);
        for (a, b) in all[0].1.iter().zip(embedding.vector.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        let (embedded, total) = store.get_embedding_stats().unwrap();
        assert_eq!(embedded, 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn deleting_file_cascades_to_chunks_and_symbols() {
        let store = MetadataStore::open_in_memory().unwrap();
        let fid = seed_file(&store);
        let chunk = sample_chunk(&fid);
        store.save_chunks(&[chunk.clone()]).unwrap();

        store.delete_file("p1", "src/lib.rs").unwrap();
        assert!(store.get_chunk(&chunk.id).unwrap().is_none());
    }
}
