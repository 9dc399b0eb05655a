//! Global-norm gradient clipping.
//!
//! All gradients of a model are treated as one vector:
//!
//! ```text
//! norm = sqrt(sum over params of sum(g²))
//! if norm > max_norm:  g ← g * max_norm / (norm + 1e-6)
//! ```
//!
//! Burn's optimizer-level clipping works per parameter tensor, so the
//! combined update of a many-tensor model could still exceed `max_norm`.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const NORM_EPSILON: f64 = 1e-6;

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: Option<Tensor<B::InnerBackend, 1>>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let squared = grad.powf_scalar(2.0).sum();
            self.total = Some(match self.total.take() {
                Some(total) => total + squared,
                None        => squared,
            });
        }
    }
}

struct ScaleGrads<'a> {
    grads: &'a mut GradientsParams,
    scale: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleGrads<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm of every gradient `model` has in `grads`, taken together.
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, total: None };
    model.visit(&mut visitor);
    visitor
        .total
        .map(|t| t.into_scalar().elem::<f64>().sqrt())
        .unwrap_or(0.0)
}

/// Rescale `grads` so their global norm is at most `max_norm`.
/// Returns the norm measured before clipping.
pub fn clip_global_norm<B, M>(model: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, grads);
    if norm > max_norm {
        let mut visitor = ScaleGrads { grads, scale: max_norm / (norm + NORM_EPSILON) };
        model.visit(&mut visitor);
    }
    norm
}
