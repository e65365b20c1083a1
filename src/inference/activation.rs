//! Output activations.

use crate::core::types::Activation;
use ndarray::ArrayViewMut1;

/// Logistic function.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax, in place.
pub fn softmax_in_place(mut values: ArrayViewMut1<f32>) {
    let max = values.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    values.mapv_inplace(|v| (v - max).exp());
    let sum = values.sum();
    if sum > 0.0 {
        values.mapv_inplace(|v| v / sum);
    }
}

/// Applies `activation` to the raw outputs of one example.
pub fn apply_activation(activation: Activation, mut values: ArrayViewMut1<f32>) {
    match activation {
        Activation::Identity => {}
        Activation::Sigmoid => values.mapv_inplace(sigmoid),
        Activation::Softmax => softmax_in_place(values),
    }
}
