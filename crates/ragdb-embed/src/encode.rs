//! Fixed-width model input and the device it runs on.

use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::info;

/// XLM-RoBERTa `<pad>` token id.
pub const PAD_TOKEN_ID: u32 = 1;

/// Token ids and attention mask cut or padded to exactly one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWindow {
    pub ids: Vec<u32>,
    pub mask: Vec<u32>,
}

impl TokenWindow {
    /// Overflow is dropped from the tail; missing slots become `<pad>` with a zero mask.
    pub fn fit(ids: &[u32], mask: &[u32], width: usize) -> Self {
        let keep = ids.len().min(width);
        let ids = ids[..keep].iter().copied().chain(std::iter::repeat(PAD_TOKEN_ID)).take(width).collect();
        let mask = mask.iter().copied().take(keep).chain(std::iter::repeat(0)).take(width).collect();
        Self { ids, mask }
    }

    pub fn encode(tokenizer: &Tokenizer, text: &str, width: usize) -> Result<Self> {
        let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("tokenizing input: {e}"))?;
        Ok(Self::fit(enc.get_ids(), enc.get_attention_mask(), width))
    }

    pub fn width(&self) -> usize { self.ids.len() }

    pub fn real_tokens(&self) -> usize { self.mask.iter().filter(|&&m| m != 0).count() }

    /// `[1, width]` id and mask tensors.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let shape = (1, self.width());
        let ids = Tensor::new(self.ids.as_slice(), device)?.reshape(shape)?;
        let mask = Tensor::new(self.mask.as_slice(), device)?.reshape(shape)?;
        Ok((ids, mask))
    }
}

/// Metal when built with the `metal` feature and a GPU is present, CPU otherwise.
pub fn embedding_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!(device = "metal", "embedding device selected");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "metal unavailable"),
        }
    }
    info!(device = "cpu", "embedding device selected");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_padded_with_zero_mask() {
        let w = TokenWindow::fit(&[0, 42, 2], &[1, 1, 1], 5);
        assert_eq!(w.ids, vec![0, 42, 2, PAD_TOKEN_ID, PAD_TOKEN_ID]);
        assert_eq!(w.mask, vec![1, 1, 1, 0, 0]);
        assert_eq!(w.real_tokens(), 3);
    }

    #[test]
    fn long_input_keeps_the_head() {
        let w = TokenWindow::fit(&[0, 5, 6, 7, 2], &[1; 5], 3);
        assert_eq!(w.ids, vec![0, 5, 6]);
        assert_eq!(w.mask, vec![1, 1, 1]);
    }

    #[test]
    fn tensors_have_a_batch_of_one() {
        let w = TokenWindow::fit(&[0, 9], &[1, 1], 4);
        let (ids, mask) = w.to_tensors(&Device::Cpu).expect("tensors");
        assert_eq!(ids.dims(), &[1, 4]);
        assert_eq!(mask.to_vec2::<u32>().expect("mask"), vec![vec![1, 1, 0, 0]]);
    }
}
