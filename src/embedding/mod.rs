mod local;
mod openai;

pub use local::{LOCAL_DEFAULT_DIMENSIONS, LOCAL_MODEL_ID, LocalHashProvider};
pub use openai::{
    OPENAI_DEFAULT_BASE_URL, OPENAI_DEFAULT_DIMENSIONS, OPENAI_DEFAULT_MODEL_ID, OpenAiConfig,
    OpenAiProvider, openai_model_dimensions,
};

use crate::error::EmbeddingError;

pub const EMBEDDING_ENCODING: &str = "f32-le";

pub trait EmbeddingProvider {
    fn name(&self) -> &str;

    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

pub fn validate_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    dimensions: usize,
) -> Result<(), EmbeddingError> {
    if embeddings.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: embeddings.len(),
        });
    }

    if let Some((index, vector)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != dimensions)
    {
        return Err(EmbeddingError::DimensionMismatch {
            index,
            expected: dimensions,
            actual: vector.len(),
        });
    }

    Ok(())
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_encoding_is_little_endian_f32_in_index_order() {
        let blob = encode_embedding_blob(&[1.0, -2.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0_f32.to_le_bytes());
        assert_eq!(&blob[4..], &(-2.5_f32).to_le_bytes());
        assert_eq!(decode_embedding_blob(&blob, 2), Some(vec![1.0, -2.5]));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let blob = encode_embedding_blob(&[1.0, 2.0, 3.0]);
        assert_eq!(decode_embedding_blob(&blob, 2), None);
        assert_eq!(decode_embedding_blob(&blob[..5], 1), None);
        assert_eq!(decode_embedding_blob(&[], 0), None);
    }

    #[test]
    fn validate_embeddings_flags_count_and_width() {
        let vectors = vec![vec![0.0; 3], vec![0.0; 3]];
        assert!(validate_embeddings(&vectors, 2, 3).is_ok());
        assert!(matches!(
            validate_embeddings(&vectors, 3, 3),
            Err(EmbeddingError::CountMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let ragged = vec![vec![0.0; 3], vec![0.0; 2]];
        assert!(matches!(
            validate_embeddings(&ragged, 2, 3),
            Err(EmbeddingError::DimensionMismatch { index: 1, .. })
        ));
    }
}
