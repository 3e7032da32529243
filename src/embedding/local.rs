//! Local ONNX bi-encoder backend.
//!
//! Runs a BERT-style sentence encoder (e.g. BAAI/bge-base-en-v1.5) through ONNX
//! Runtime. Token states are mean-pooled under the attention mask and L2
//! normalised, so cosine similarity between two outputs is their dot product.

use async_trait::async_trait;
use ndarray::{Array2, ArrayView3, Axis};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

use super::{Embedder, EmbeddingError};

/// Single ONNX session plus its tokenizer. `Session::run` needs `&mut self`.
struct BiEncoder {
    session: Session,
    tokenizer: Tokenizer,
    max_length: usize,
}

impl BiEncoder {
    fn load(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> Result<Self, EmbeddingError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Local(format!("failed to load tokenizer: {e}")))?;

        let session = Session::builder()
            .map_err(|e| EmbeddingError::Local(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Local(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| EmbeddingError::Local(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::Local(format!("failed to load encoder: {e}")))?;

        Ok(Self {
            session,
            tokenizer,
            max_length,
        })
    }

    /// Tokenize and pad to the longest sequence in the batch (capped at `max_length`).
    fn tokenize(&self, texts: &[String]) -> Result<(Array2<i64>, Array2<i64>), EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Local(format!("tokenization failed: {e}")))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut ids = Array2::<i64>::zeros((texts.len(), seq_len));
        let mut mask = Array2::<i64>::zeros((texts.len(), seq_len));
        for (row, encoding) in encodings.iter().enumerate() {
            let pairs = encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .take(seq_len);
            for (col, (&id, &m)) in pairs.enumerate() {
                ids[[row, col]] = i64::from(id);
                mask[[row, col]] = i64::from(m);
            }
        }

        Ok((ids, mask))
    }

    fn encode_batch(&mut self, texts: &[String]) -> Result<Array2<f32>, EmbeddingError> {
        let (ids, mask) = self.tokenize(texts)?;
        let (batch, seq_len) = ids.dim();
        let shape = [batch, seq_len];

        let to_tensor = |data: Vec<i64>| {
            Tensor::from_array((shape, data)).map_err(|e| EmbeddingError::Local(e.to_string()))
        };
        let ids_tensor = to_tensor(ids.iter().copied().collect())?;
        let mask_tensor = to_tensor(mask.iter().copied().collect())?;
        let type_ids_tensor = to_tensor(vec![0i64; batch * seq_len])?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_ids_tensor,
            ])
            .map_err(|e| EmbeddingError::Local(format!("encoder inference failed: {e}")))?;

        let hidden = outputs
            .get("last_hidden_state")
            .ok_or_else(|| EmbeddingError::Local("no 'last_hidden_state' output".to_string()))?;
        let (hidden_shape, data) = hidden
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Local(e.to_string()))?;

        let hidden = hidden_size(&hidden_shape[..])?;
        let states = ArrayView3::from_shape((batch, seq_len, hidden), data)
            .map_err(|e| EmbeddingError::Local(format!("unexpected output shape: {e}")))?;

        Ok(mean_pool(states, &mask))
    }
}

/// Width of a `[batch, seq, hidden]` encoder output.
fn hidden_size(shape: &[i64]) -> Result<usize, EmbeddingError> {
    let [_, _, hidden] = shape else {
        return Err(EmbeddingError::Local(format!(
            "expected a rank-3 hidden state, got shape {shape:?}"
        )));
    };
    usize::try_from(*hidden).map_err(|_| EmbeddingError::Local("negative hidden size".to_string()))
}

/// Masked mean over the sequence axis, then L2 normalisation per row.
fn mean_pool(states: ArrayView3<'_, f32>, mask: &Array2<i64>) -> Array2<f32> {
    let (batch, _, hidden) = states.dim();
    let mut pooled = Array2::<f32>::zeros((batch, hidden));

    for (b, mut row) in pooled.axis_iter_mut(Axis(0)).enumerate() {
        let mut count = 0.0f32;
        for (t, token) in states.index_axis(Axis(0), b).axis_iter(Axis(0)).enumerate() {
            if mask[[b, t]] == 1 {
                row += &token;
                count += 1.0;
            }
        }
        if count > 0.0 {
            row /= count;
        }
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }

    pooled
}

/// [`Embedder`] over a local bi-encoder. Inference runs on the blocking pool.
pub struct LocalEmbedder {
    model_id: String,
    encoder: Arc<Mutex<BiEncoder>>,
}

impl LocalEmbedder {
    pub fn load(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> Result<Self, EmbeddingError> {
        let encoder = BiEncoder::load(model_path, tokenizer_path, max_length)?;

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            max_length,
            "Local bi-encoder loaded"
        );

        Ok(Self {
            model_id: format!("local:{}", model_path.display()),
            encoder: Arc::new(Mutex::new(encoder)),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encoder = Arc::clone(&self.encoder);
        let texts = texts.to_vec();
        let expected = texts.len();

        let matrix = tokio::task::spawn_blocking(move || {
            let mut encoder = encoder
                .lock()
                .map_err(|_| EmbeddingError::Local("encoder lock poisoned".to_string()))?;
            encoder.encode_batch(&texts)
        })
        .await
        .map_err(|e| EmbeddingError::Local(format!("encoder task join error: {e}")))??;

        if matrix.nrows() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                actual: matrix.nrows(),
            });
        }

        Ok(matrix.outer_iter().map(|row| row.to_vec()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_mean_pool_ignores_padding_and_normalises() {
        // One sequence, two real tokens and one padding token.
        let states = Array3::from_shape_vec(
            (1, 3, 2),
            vec![3.0, 0.0, 1.0, 0.0, 100.0, 100.0],
        )
        .unwrap();
        let mask = Array2::from_shape_vec((1, 3), vec![1, 1, 0]).unwrap();

        let pooled = mean_pool(states.view(), &mask);

        assert!((pooled[[0, 0]] - 1.0).abs() < 1e-6);
        assert!(pooled[[0, 1]].abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_all_padding_yields_zero_vector() {
        let states = Array3::<f32>::ones((1, 2, 3));
        let mask = Array2::<i64>::zeros((1, 2));

        let pooled = mean_pool(states.view(), &mask);

        assert!(pooled.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hidden_size_requires_rank_three() {
        assert_eq!(hidden_size(&[2, 7, 384]).unwrap(), 384);
        assert!(matches!(hidden_size(&[2, 384]), Err(EmbeddingError::Local(_))));
        assert!(matches!(hidden_size(&[1, 2, 3, 4]), Err(EmbeddingError::Local(_))));
        assert!(matches!(hidden_size(&[1, 2, -1]), Err(EmbeddingError::Local(_))));
    }

    #[test]
    #[ignore = "Requires bi-encoder model files - run with --ignored"]
    fn test_load_local_encoder() {
        let embedder = LocalEmbedder::load(
            Path::new("./bi-encoder-model/model_int8.onnx"),
            Path::new("./bi-encoder-model/tokenizer.json"),
            512,
        )
        .expect("model files present");
        assert!(embedder.model_id().starts_with("local:"));
    }
}
