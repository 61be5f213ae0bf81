use rusqlite::{Connection, params};

use super::RunLease;
use super::lock::renew_lease;
use super::schema::{META_EMBEDDING_DESCRIPTOR, get_metadata, set_metadata};
use crate::embedding::{decode_embedding_blob, encode_embedding_blob};
use crate::error::StorageError;
use crate::model::{EmbeddingDescriptor, FaqEntry, StoredEmbeddingRow};

pub(super) fn replace_rows(
    connection: &mut Connection,
    lease: &RunLease<'_>,
    entries: &[FaqEntry],
    embeddings: &[Vec<f32>],
    descriptor: &EmbeddingDescriptor,
) -> Result<usize, StorageError> {
    let descriptor_json = serde_json::to_string(descriptor)?;

    let tx = connection.transaction()?;
    renew_lease(&tx, &lease.name, &lease.holder, lease.ttl)?;
    tx.execute("DELETE FROM faq_embeddings", [])?;

    let mut inserted = 0usize;
    {
        let mut statement = tx.prepare(
            "INSERT INTO faq_embeddings(question, answer, embedding) VALUES(?1, ?2, ?3)",
        )?;
        for (entry, embedding) in entries.iter().zip(embeddings.iter()) {
            statement.execute(params![
                entry.question,
                entry.answer,
                encode_embedding_blob(embedding),
            ])?;
            inserted += 1;
        }
    }

    set_metadata(&tx, META_EMBEDDING_DESCRIPTOR, &descriptor_json)?;
    tx.commit()?;

    Ok(inserted)
}

pub(super) fn row_count(connection: &Connection) -> Result<i64, StorageError> {
    let count =
        connection.query_row("SELECT COUNT(*) FROM faq_embeddings", [], |row| row.get(0))?;
    Ok(count)
}

pub(super) fn embedding_descriptor(
    connection: &Connection,
) -> Result<Option<EmbeddingDescriptor>, StorageError> {
    let Some(raw) = get_metadata(connection, META_EMBEDDING_DESCRIPTOR)? else {
        return Ok(None);
    };

    Ok(Some(serde_json::from_str(&raw)?))
}

pub(super) fn load_rows(
    connection: &Connection,
    dimensions: usize,
) -> Result<Vec<StoredEmbeddingRow>, StorageError> {
    let mut statement = connection.prepare(
        "
        SELECT id, question, answer, embedding
        FROM faq_embeddings
        ORDER BY id ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::<StoredEmbeddingRow>::new();

    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let blob: Vec<u8> = row.get(3)?;
        let embedding =
            decode_embedding_blob(&blob, dimensions).ok_or(StorageError::CorruptEmbedding {
                id,
                len: blob.len(),
                expected: dimensions.saturating_mul(4),
            })?;

        out.push(StoredEmbeddingRow {
            id,
            question: row.get(1)?,
            answer: row.get(2)?,
            embedding,
        });
    }

    Ok(out)
}
