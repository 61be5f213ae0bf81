use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::EmbeddingError;

pub const LOCAL_MODEL_ID: &str = "local-hash-v1";
pub const LOCAL_DEFAULT_DIMENSIONS: usize = 384;

#[derive(Debug, Clone)]
pub struct LocalHashProvider {
    model_id: String,
    dimensions: usize,
}

impl LocalHashProvider {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions: dimensions.max(8),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0_f32; self.dimensions];

        for feature in tokenize(text) {
            let hash = stable_hash(&feature);
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
            vector[index] += sign * weight;
        }

        normalize_vector(&mut vector);
        vector
    }
}

impl Default for LocalHashProvider {
    fn default() -> Self {
        Self::new(LOCAL_MODEL_ID, LOCAL_DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for LocalHashProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

// SHA-256 rather than DefaultHasher: vectors must not change between builds.
fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn tokenize(text: &str) -> Vec<String> {
    let words = text
        .split_whitespace()
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_embeddings_are_deterministic_and_normalized() {
        let provider = LocalHashProvider::default();
        let first = provider.embed_text("What is the capital of France?");
        let second = provider.embed_text("What is the capital of France?");
        assert_eq!(first, second);
        assert_eq!(first.len(), LOCAL_DEFAULT_DIMENSIONS);

        let norm = first.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let provider = LocalHashProvider::new(LOCAL_MODEL_ID, 16);
        assert!(provider.embed_text("  ?! ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn embed_batch_preserves_input_order() {
        let provider = LocalHashProvider::new(LOCAL_MODEL_ID, 32);
        let texts = vec!["alpha beta".to_string(), "gamma".to_string()];
        let batch = provider.embed_batch(&texts).expect("local embed");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed_text("alpha beta"));
        assert_eq!(batch[1], provider.embed_text("gamma"));
    }

    #[test]
    fn dimensions_have_a_floor() {
        assert_eq!(LocalHashProvider::new("tiny", 2).dimensions(), 8);
    }
}
