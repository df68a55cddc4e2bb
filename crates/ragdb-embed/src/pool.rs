//! Sentence pooling over encoder hidden states.

use anyhow::{bail, Result};
use candle_core::Tensor;

/// Average the hidden states of real tokens: `[B,T,H]` with mask `[B,T]` gives `[B,H]`.
/// A row with no real tokens averages to zero instead of dividing by zero.
pub fn mean_over_mask(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let &[batch, tokens, _] = hidden.dims() else {
        bail!("expected hidden states [batch, tokens, hidden], got {:?}", hidden.dims());
    };
    if attention_mask.dims() != [batch, tokens] {
        bail!("attention mask {:?} does not cover hidden states {:?}", attention_mask.dims(), hidden.dims());
    }
    let weights = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&weights.unsqueeze(2)?)?.sum(1)?;
    let counts = weights.sum_keepdim(1)?.maximum(1.0)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Scale each row of `[B,H]` to unit length; all-zero rows stay zero.
pub fn l2_normalize(rows: &Tensor) -> Result<Tensor> {
    let norms = rows.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;
    Ok(rows.broadcast_div(&norms)?)
}

/// The vector stored for a passage: masked mean, then unit length.
pub fn sentence_embedding(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&mean_over_mask(hidden, attention_mask)?)
}
