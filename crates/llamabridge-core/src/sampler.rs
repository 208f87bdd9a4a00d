use llamabridge_abi::{Model, SamplerStage};

use crate::error::Result;

pub const DEFAULT_TOP_P: f32 = 0.95;

/// Stage list for one request: nucleus filter first, then either argmax or
/// temperature plus a seeded draw.
pub fn sampler_stages(top_p: f32, temperature: f32) -> Vec<SamplerStage> {
    let p = if top_p > 0.0 && top_p <= 1.0 {
        top_p
    } else {
        DEFAULT_TOP_P
    };

    let mut stages = vec![SamplerStage::TopP { p, min_keep: 1 }];
    // NaN compares false, so it lands on the greedy arm.
    if temperature > 0.0 {
        stages.push(SamplerStage::Temperature(temperature));
        stages.push(SamplerStage::Distribution { seed: 0 });
    } else {
        stages.push(SamplerStage::Greedy);
    }
    stages
}

/// Build the chain on `model`. Drop any previous sampler before calling this.
pub fn build_sampler<M: Model>(model: &M, top_p: f32, temperature: f32) -> Result<M::Sampler> {
    let stages = sampler_stages(top_p, temperature);
    tracing::debug!(?stages, "building sampler chain");
    Ok(model.new_sampler(&stages)?)
}
