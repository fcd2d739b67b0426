//! Text-to-vector encoder and the assets it is built from.
//!
//! The [`Encoder`] trait turns a batch of texts into mean-pooled, L2-normalized
//! vectors. A [`ModelSource`] acquires whatever an encoder needs (downloading
//! files and reporting byte progress) and builds one. Both are owned by the
//! inference worker; nothing else holds an encoder.

pub mod hub;
pub mod local;

use anyhow::Result;

/// Byte-level progress for one model asset during acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct FileProgress {
    pub file: String,
    pub loaded: u64,
    /// `None` when the server did not announce a content length.
    pub total: Option<u64>,
}

impl FileProgress {
    /// Completion in percent, clamped to `[0, 100]`.
    ///
    /// Unknown totals report 0 until the caller sends `loaded == total`.
    pub fn percent(&self) -> f64 {
        match self.total {
            Some(0) => 100.0,
            Some(total) => (self.loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }
}

/// Turns texts into fixed-length, unit-length vectors.
///
/// Implementations are driven from a single thread and may keep mutable
/// session state between calls.
pub trait Encoder {
    /// Embed a batch, one vector per text, in input order.
    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Acquires model assets and instantiates an [`Encoder`] from them.
#[allow(async_fn_in_trait)]
pub trait ModelSource {
    type Encoder: Encoder;

    /// Fetch (or locate) every asset, calling `progress` as bytes arrive,
    /// then build the encoder.
    async fn acquire(&self, progress: &mut dyn FnMut(FileProgress)) -> Result<Self::Encoder>;
}

/// Average token vectors whose attention mask is set.
///
/// `tokens` is row-major `[seq_len, hidden]`. Returns a zero vector if the
/// mask selects nothing.
pub fn mean_pool(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (row, &m) in tokens.chunks_exact(hidden).zip(mask) {
        if m > 0 {
            let weight = m as f32;
            for (acc, &x) in sum.iter_mut().zip(row) {
                *acc += x * weight;
            }
            count += weight;
        }
    }

    if count > 0.0 {
        for acc in &mut sum {
            *acc /= count;
        }
    }
    sum
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = vec![3.0, 4.0];
        let normalized = l2_normalize(&v);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = vec![0.0, 0.0, 0.0];
        let normalized = l2_normalize(&v);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_pool_ignores_padding() {
        // three tokens of width 2, last one is padding
        let tokens = [1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let mask = [1, 1, 0];
        assert_eq!(mean_pool(&tokens, &mask, 2), vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_empty_mask_is_zero() {
        let tokens = [1.0, 2.0];
        assert_eq!(mean_pool(&tokens, &[0], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn percent_handles_unknown_and_empty_totals() {
        let p = |loaded, total| FileProgress {
            file: "tokenizer.json".into(),
            loaded,
            total,
        };
        assert_eq!(p(50, Some(200)).percent(), 25.0);
        assert_eq!(p(10, None).percent(), 0.0);
        assert_eq!(p(0, Some(0)).percent(), 100.0);
        assert_eq!(p(300, Some(200)).percent(), 100.0);
    }
}
