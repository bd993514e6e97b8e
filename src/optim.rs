use ndarray::Array2;

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    moments: Vec<(Array2<f32>, Array2<f32>)>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            moments: Vec::new(),
        }
    }

    /// Applies one update. `grads[i]` must have the shape of `params[i]`.
    pub fn step(&mut self, params: Vec<&mut Array2<f32>>, grads: &[Array2<f32>]) {
        debug_assert_eq!(params.len(), grads.len());
        if self.moments.len() != params.len() {
            self.moments = params
                .iter()
                .map(|p| (Array2::zeros(p.raw_dim()), Array2::zeros(p.raw_dim())))
                .collect();
        }
        self.step += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let lr_t = self.learning_rate * (1.0 - b2.powi(self.step)).sqrt() / (1.0 - b1.powi(self.step));
        let eps = self.epsilon;

        for ((param, grad), (m, v)) in params.into_iter().zip(grads).zip(self.moments.iter_mut()) {
            m.zip_mut_with(grad, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
            v.zip_mut_with(grad, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);
            ndarray::Zip::from(param)
                .and(&*m)
                .and(&*v)
                .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + eps));
        }
    }
}
