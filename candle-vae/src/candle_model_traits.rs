use crate::candle_random::RandomSource;
use candle_core::{Result, Tensor};

/// A deterministic network that maps data to the parameters of a
/// diagonal Gaussian
pub trait GaussianParamsModuleT {
    /// # Returns `(mean_nk, second_nk)`
    /// * `mean_nk` - unconstrained location (n x k)
    /// * `second_nk` - strictly positive spread term (n x k)
    fn gaussian_params(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

/// A reparameterized latent draw together with the parameters it was
/// drawn from
pub struct LatentSample {
    pub z: Tensor,
    pub mean: Tensor,
    pub std: Tensor,
}

pub trait EncoderModuleT {
    /// An encoder that spits out a latent sample and its Gaussian
    /// parameters
    ///
    /// # Arguments
    /// * `x_nd` - input data (n x d)
    /// * `rng` - where the noise `eps` is drawn from
    ///
    /// # Returns `LatentSample { z, mean, std }`, each (n x k)
    fn forward_t(&self, x_nd: &Tensor, rng: &mut RandomSource) -> Result<LatentSample>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out reconstruction
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor>;

    /// A decoder that spits out reconstruction and log-likelihood
    /// * `z_nk` - latent states
    /// * `x_nd` - observed data to validate with
    ///
    /// # Returns `(recon_nd, llik_n)`
    fn forward_with_llik(&self, z_nk: &Tensor, x_nd: &Tensor) -> Result<(Tensor, Tensor)>;

    /// Observation noise parameter (log scale), shared by all
    /// examples and features
    fn log_variance(&self) -> &Tensor;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}
