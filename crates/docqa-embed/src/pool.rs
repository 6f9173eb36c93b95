use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Sentence embedding from token states: average the positions the attention
/// mask keeps, then scale each row to unit length. `[B,T,H]` in, `[B,H]` out.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (rows, _tokens, width) = match hidden.dims() {
        [b, t, h] => (*b, *t, *h),
        other => anyhow::bail!("expected token states shaped [batch, tokens, hidden], got {other:?}"),
    };
    let dtype = hidden.dtype();
    let device = hidden.device();

    // [B,T] -> [B,T,1] so it scales every hidden unit of a token.
    let keep = attention_mask.to_device(device)?.to_dtype(dtype)?;
    let weights = keep.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let summed = hidden.mul(&weights)?.sum(1)?;

    // An all-padding row would divide by zero; count at least one token.
    let kept = keep.sum_keepdim(1)?.maximum(1f64)?;
    let mean = summed.broadcast_div(&kept)?;

    let floor = if dtype == DType::F16 { 1e-6 } else { 1e-12 };
    let length = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + floor)?;
    let unit = mean.broadcast_div(&length)?;

    ensure!(unit.dims() == [rows, width], "pooled shape {:?}, expected [{rows}, {width}]", unit.dims());
    Ok(unit)
}
