use candle_core::{DType, Device, Result, Shape, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// The one random stream of a run.
///
/// Reparameterized sampling, minibatch shuffling and row subsampling
/// all draw from here, so fixing the seed fixes the whole run. It is
/// passed around explicitly as `&mut RandomSource`.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// `eps ~ N(0, I)` of `shape`, created on `device`
    pub fn randn<S: Into<Shape>>(&mut self, shape: S, dtype: DType, device: &Device) -> Result<Tensor> {
        let shape = shape.into();
        let eps: Vec<f32> = (&mut self.rng)
            .sample_iter(StandardNormal)
            .take(shape.elem_count())
            .collect();
        Tensor::from_vec(eps, shape, device)?.to_dtype(dtype)
    }

    /// `eps ~ N(0, I)` with the same shape, dtype and device as `t`
    pub fn randn_like(&mut self, t: &Tensor) -> Result<Tensor> {
        self.randn(t.shape().clone(), t.dtype(), t.device())
    }

    pub fn shuffle(&mut self, xs: &mut [usize]) {
        xs.shuffle(&mut self.rng);
    }

    /// `k` distinct indexes out of `0..n`, sorted
    pub fn subsample(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut idx = rand::seq::index::sample(&mut self.rng, n, k.min(n)).into_vec();
        idx.sort_unstable();
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_noise() -> Result<()> {
        let dev = Device::Cpu;
        let a = RandomSource::seeded(11).randn((3, 4), DType::F32, &dev)?;
        let b = RandomSource::seeded(11).randn((3, 4), DType::F32, &dev)?;
        let c = RandomSource::seeded(12).randn((3, 4), DType::F32, &dev)?;

        assert_eq!(a.to_vec2::<f32>()?, b.to_vec2::<f32>()?);
        assert_ne!(a.to_vec2::<f32>()?, c.to_vec2::<f32>()?);
        Ok(())
    }

    #[test]
    fn subsample_is_distinct_and_sorted() {
        let mut rng = RandomSource::seeded(3);
        let idx = rng.subsample(100, 30);
        assert_eq!(idx.len(), 30);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert!(idx.iter().all(|&i| i < 100));
        assert_eq!(rng.subsample(5, 10).len(), 5);
    }
}
