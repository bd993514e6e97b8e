//! Feed-forward disease classifier.
//!
//! Layout: input batch normalization, then one block per hidden width of
//! Dense + ReLU -> BatchNorm -> Dropout, then a dense softmax output.

use anyhow::Result;
use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::optim::Adam;

const BN_MOMENTUM: f32 = 0.99;
const BN_EPSILON: f32 = 1e-3;
/// Probabilities are clipped here before taking the log.
const PROB_FLOOR: f32 = 1e-7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Array2<f32>,
    /// Shape `(1, out)`.
    pub bias: Array2<f32>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn new<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        Self {
            weights: Array2::random_using((fan_in, fan_out), Uniform::new(-limit, limit), rng),
            bias: Array2::zeros((1, fan_out)),
        }
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weights) + &self.bias
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm {
    pub gamma: Array2<f32>,
    pub beta: Array2<f32>,
    pub running_mean: Array2<f32>,
    pub running_var: Array2<f32>,
}

struct NormCache {
    xhat: Array2<f32>,
    inv_std: Array2<f32>,
}

impl BatchNorm {
    fn new(width: usize) -> Self {
        Self {
            gamma: Array2::ones((1, width)),
            beta: Array2::zeros((1, width)),
            running_mean: Array2::zeros((1, width)),
            running_var: Array2::ones((1, width)),
        }
    }

    fn forward_train(&mut self, x: &Array2<f32>) -> (Array2<f32>, NormCache) {
        let n = x.nrows().max(1) as f32;
        let mean = x.sum_axis(Axis(0)).insert_axis(Axis(0)) / n;
        let centered = x - &mean;
        let var = (&centered * &centered).sum_axis(Axis(0)).insert_axis(Axis(0)) / n;
        let inv_std = var.mapv(|v| 1.0 / (v + BN_EPSILON).sqrt());
        let xhat = &centered * &inv_std;
        let y = &xhat * &self.gamma + &self.beta;

        self.running_mean = &self.running_mean * BN_MOMENTUM + &(mean * (1.0 - BN_MOMENTUM));
        self.running_var = &self.running_var * BN_MOMENTUM + &(var * (1.0 - BN_MOMENTUM));
        (y, NormCache { xhat, inv_std })
    }

    fn forward_infer(&self, x: &Array2<f32>) -> Array2<f32> {
        let inv_std = self.running_var.mapv(|v| 1.0 / (v + BN_EPSILON).sqrt());
        (x - &self.running_mean) * &inv_std * &self.gamma + &self.beta
    }

    /// Returns `(dx, dgamma, dbeta)`.
    fn backward(&self, dy: &Array2<f32>, cache: &NormCache) -> (Array2<f32>, Array2<f32>, Array2<f32>) {
        let n = dy.nrows().max(1) as f32;
        let dgamma = (dy * &cache.xhat).sum_axis(Axis(0)).insert_axis(Axis(0));
        let dbeta = dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        let dxhat = dy * &self.gamma;
        let sum_dxhat = dxhat.sum_axis(Axis(0)).insert_axis(Axis(0));
        let sum_dxhat_xhat = (&dxhat * &cache.xhat).sum_axis(Axis(0)).insert_axis(Axis(0));
        let dx = (&dxhat * n - &sum_dxhat - &cache.xhat * &sum_dxhat_xhat) * &cache.inv_std / n;
        (dx, dgamma, dbeta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenBlock {
    pub dense: Dense,
    pub norm: BatchNorm,
}

struct BlockCache {
    input: Array2<f32>,
    pre_activation: Array2<f32>,
    norm: NormCache,
    mask: Array2<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseNet {
    pub input_norm: BatchNorm,
    pub blocks: Vec<HiddenBlock>,
    pub output: Dense,
    pub dropout: f32,
}

impl DiseaseNet {
    pub fn new<R: Rng>(input_dim: usize, hidden: &[usize], n_classes: usize, dropout: f32, rng: &mut R) -> Self {
        let mut blocks = Vec::with_capacity(hidden.len());
        let mut fan_in = input_dim;
        for &units in hidden {
            blocks.push(HiddenBlock {
                dense: Dense::new(fan_in, units, rng),
                norm: BatchNorm::new(units),
            });
            fan_in = units;
        }
        Self {
            input_norm: BatchNorm::new(input_dim),
            blocks,
            output: Dense::new(fan_in, n_classes, rng),
            dropout,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_norm.gamma.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.output.weights.ncols()
    }

    pub fn hidden_units(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.dense.weights.ncols()).collect()
    }

    /// Class probabilities in inference mode (running statistics, no dropout).
    pub fn predict_proba(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut h = self.input_norm.forward_infer(x);
        for block in &self.blocks {
            let a = relu(&block.dense.forward(&h));
            h = block.norm.forward_infer(&a);
        }
        softmax(&self.output.forward(&h))
    }

    /// Trainable parameters, in the same order as the gradients produced by
    /// [`DiseaseNet::train_batch`].
    pub fn parameters_mut(&mut self) -> Vec<&mut Array2<f32>> {
        let mut params = vec![&mut self.input_norm.gamma, &mut self.input_norm.beta];
        for block in &mut self.blocks {
            params.push(&mut block.dense.weights);
            params.push(&mut block.dense.bias);
            params.push(&mut block.norm.gamma);
            params.push(&mut block.norm.beta);
        }
        params.push(&mut self.output.weights);
        params.push(&mut self.output.bias);
        params
    }

    /// One optimisation step on a mini-batch with per-sample loss weights.
    ///
    /// Returns the weighted cross-entropy of the batch before the update.
    pub fn train_batch<R: Rng>(
        &mut self,
        x: &Array2<f32>,
        y: &[usize],
        sample_weights: &[f32],
        optimizer: &mut Adam,
        rng: &mut R,
    ) -> f32 {
        let batch = x.nrows().max(1) as f32;
        let keep = 1.0 - self.dropout;

        // forward
        let (mut h, input_cache) = self.input_norm.forward_train(x);
        let mut caches = Vec::with_capacity(self.blocks.len());
        for block in &mut self.blocks {
            let pre_activation = block.dense.forward(&h);
            let (normed, norm) = block.norm.forward_train(&relu(&pre_activation));
            let mask = if self.dropout > 0.0 {
                Array2::from_shape_fn(normed.raw_dim(), |_| {
                    if rng.gen::<f32>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                })
            } else {
                Array2::ones(normed.raw_dim())
            };
            let out = &normed * &mask;
            caches.push(BlockCache {
                input: std::mem::replace(&mut h, out),
                pre_activation,
                norm,
                mask,
            });
        }
        let probs = softmax(&self.output.forward(&h));

        // weighted sparse cross-entropy and its gradient w.r.t. the logits
        let mut loss = 0.0f32;
        let mut dlogits = probs.clone();
        for (i, (&class, &w)) in y.iter().zip(sample_weights).enumerate() {
            loss -= w * probs[[i, class]].max(PROB_FLOOR).ln();
            dlogits[[i, class]] -= 1.0;
            dlogits.row_mut(i).mapv_inplace(|g| g * w / batch);
        }
        loss /= batch;

        // backward
        let grad_out_w = h.t().dot(&dlogits);
        let grad_out_b = dlogits.sum_axis(Axis(0)).insert_axis(Axis(0));
        let mut dh = dlogits.dot(&self.output.weights.t());

        let mut block_grads = Vec::with_capacity(self.blocks.len());
        for (block, cache) in self.blocks.iter().zip(caches.iter()).rev() {
            let dnormed = &dh * &cache.mask;
            let (da, dgamma, dbeta) = block.norm.backward(&dnormed, &cache.norm);
            let dz = da * &cache.pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            let dw = cache.input.t().dot(&dz);
            let db = dz.sum_axis(Axis(0)).insert_axis(Axis(0));
            dh = dz.dot(&block.dense.weights.t());
            block_grads.push([dw, db, dgamma, dbeta]);
        }
        let (_, in_dgamma, in_dbeta) = self.input_norm.backward(&dh, &input_cache);

        let mut grads = vec![in_dgamma, in_dbeta];
        for block in block_grads.into_iter().rev() {
            grads.extend(block);
        }
        grads.push(grad_out_w);
        grads.push(grad_out_b);

        optimizer.step(self.parameters_mut(), &grads);
        loss
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = bincode::serialize(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

fn relu(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v.max(0.0))
}

fn softmax(x: &Array2<f32>) -> Array2<f32> {
    let max_x = x.fold_axis(Axis(1), f32::NEG_INFINITY, |&a, &b| a.max(b));
    let exp_x = (x - &max_x.insert_axis(Axis(1))).mapv(f32::exp);
    let sum_exp_x = exp_x.sum_axis(Axis(1)).insert_axis(Axis(1));
    exp_x / sum_exp_x
}

/// Mean (optionally weighted) cross-entropy of predicted probabilities.
pub fn cross_entropy(probs: &Array2<f32>, y: &[usize], weights: Option<&[f32]>) -> f32 {
    if y.is_empty() {
        return 0.0;
    }
    let total: f32 = y
        .iter()
        .enumerate()
        .map(|(i, &class)| {
            let w = weights.map_or(1.0, |w| w[i]);
            -w * probs[[i, class]].max(PROB_FLOOR).ln()
        })
        .sum();
    total / y.len() as f32
}

/// Index of the largest entry of each row.
pub fn argmax_rows(probs: &Array2<f32>) -> Vec<usize> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn toy_problem() -> (Array2<f32>, Vec<usize>) {
        let x = array![
            [1.0f32, 0.0, 0.0],
            [1.0, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.1, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.1, 1.0],
        ];
        (x, vec![0, 0, 1, 1, 2, 2])
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let p = softmax(&array![[1.0f32, 2.0, 3.0], [1000.0, 1000.0, 1000.0]]);
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        assert_eq!(argmax_rows(&p)[0], 2);
    }

    #[test]
    fn shapes_follow_layer_sizes() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut net = DiseaseNet::new(3, &[8, 4], 5, 0.4, &mut rng);
        assert_eq!(net.input_dim(), 3);
        assert_eq!(net.n_classes(), 5);
        assert_eq!(net.hidden_units(), vec![8, 4]);
        // 2 input-norm params + 4 per block + 2 output params
        assert_eq!(net.parameters_mut().len(), 2 + 4 * 2 + 2);
        let (x, _) = toy_problem();
        assert_eq!(net.predict_proba(&x).dim(), (6, 5));
    }

    #[test]
    fn training_reduces_loss_on_separable_data() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut net = DiseaseNet::new(3, &[16, 8], 3, 0.0, &mut rng);
        let mut adam = Adam::new(1e-2);
        let (x, y) = toy_problem();
        let weights = vec![1.0; y.len()];
        let first = net.train_batch(&x, &y, &weights, &mut adam, &mut rng);
        let mut last = first;
        for _ in 0..200 {
            last = net.train_batch(&x, &y, &weights, &mut adam, &mut rng);
        }
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn inference_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(2);
        let net = DiseaseNet::new(3, &[8], 3, 0.4, &mut rng);
        let (x, _) = toy_problem();
        assert_eq!(net.predict_proba(&x), net.predict_proba(&x));
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("net.bin");
        let mut rng = StdRng::seed_from_u64(4);
        let net = DiseaseNet::new(3, &[4], 2, 0.4, &mut rng);
        net.save(&path).unwrap();
        let loaded = DiseaseNet::load(&path).unwrap();
        let (x, _) = toy_problem();
        assert_eq!(net.predict_proba(&x), loaded.predict_proba(&x));
    }

    #[test]
    fn weighted_cross_entropy_scales_with_weights() {
        let p = array![[0.5f32, 0.5], [0.9, 0.1]];
        let plain = cross_entropy(&p, &[0, 0], None);
        let doubled = cross_entropy(&p, &[0, 0], Some(&[2.0, 2.0]));
        assert!((doubled - 2.0 * plain).abs() < 1e-6);
    }
}
