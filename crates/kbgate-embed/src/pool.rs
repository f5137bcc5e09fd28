use anyhow::{ensure, Result};
use candle_core::Tensor;

/// Average of the hidden states at unmasked positions, scaled to unit length.
/// `hidden` is `[batch, tokens, hidden]`, `attention_mask` is `[batch, tokens]`;
/// the result is `[batch, hidden]`. An all-padding row pools to zeros.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = match hidden.dims() {
        [b, t, h] => (*b, *t, *h),
        other => return Err(anyhow::anyhow!("hidden shape must be [B,T,H], got {:?}", other)),
    };
    ensure!(attention_mask.dims() == [batch, tokens], "mask shape {:?} does not match hidden {:?}", attention_mask.dims(), hidden.dims());

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.maximum(1e-9f64)?;
    let mean = summed.broadcast_div(&counts)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12f64)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, width], "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}
