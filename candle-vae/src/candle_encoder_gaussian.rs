use crate::candle_loss_functions::gaussian_log_density;
use crate::candle_model_traits::*;
use crate::candle_random::RandomSource;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

////////////////////////////////////
// Encoder network: x -> (mu, sd) //
////////////////////////////////////

pub struct GaussianEncoderNet {
    n_features: usize,
    n_latent: usize,
    fc: Linear,
    act: Activation,
    z_mean: Linear,
    z_lnvar: Linear,
}

impl GaussianEncoderNet {
    /// Will create a new encoder network with these variables:
    ///
    /// * `enc.fc.{weight,bias}`
    /// * `enc.z.mean.{weight,bias}`
    /// * `enc.z.lnvar.{weight,bias}`
    ///
    /// # Arguments
    /// * `n_features` - input dimension (d)
    /// * `n_latent` - latent dimension (k)
    /// * `n_hidden` - width of the hidden layer
    /// * `vs` - variable builder
    pub fn new(n_features: usize, n_latent: usize, n_hidden: usize, vs: VarBuilder) -> Result<Self> {
        let fc = candle_nn::linear(n_features, n_hidden, vs.pp("enc.fc"))?;
        let z_mean = candle_nn::linear(n_hidden, n_latent, vs.pp("enc.z.mean"))?;
        let z_lnvar = candle_nn::linear(n_hidden, n_latent, vs.pp("enc.z.lnvar"))?;

        Ok(Self {
            n_features,
            n_latent,
            fc,
            act: Activation::Relu,
            z_mean,
            z_lnvar,
        })
    }
}

impl GaussianParamsModuleT for GaussianEncoderNet {
    /// `(mu, sigma)` where `sigma = exp(linear(h))`
    fn gaussian_params(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)> {
        let x_nd = x_nd.flatten_from(1)?;
        let h_nh = self.act.forward(&self.fc.forward(&x_nd)?)?;
        let mu_nk = self.z_mean.forward(&h_nh)?;
        let sigma_nk = self.z_lnvar.forward(&h_nh)?.exp()?;
        Ok((mu_nk, sigma_nk))
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

///////////////////////////////////////
// Stochastic encoder: x -> z ~ q(z) //
///////////////////////////////////////

/// Adds reparameterized sampling on top of a parameter network
pub struct GaussianEncoder<N>
where
    N: GaussianParamsModuleT,
{
    net: N,
}

impl<N> GaussianEncoder<N>
where
    N: GaussianParamsModuleT,
{
    pub fn new(net: N) -> Self {
        Self { net }
    }

    pub fn network(&self) -> &N {
        &self.net
    }

    ///
    /// z = mu + sigma * eps
    ///
    /// Differentiable in `z_mean` and `z_std` for fixed `eps`.
    pub fn reparameterize(z_mean: &Tensor, z_std: &Tensor, eps: &Tensor) -> Result<Tensor> {
        z_mean + (z_std * eps)?
    }

    /// Draw `z ~ N(z_mean, z_std^2)` with fresh noise from `rng`
    pub fn sample(z_mean: &Tensor, z_std: &Tensor, rng: &mut RandomSource) -> Result<Tensor> {
        let eps = rng.randn_like(z_mean)?;
        Self::reparameterize(z_mean, z_std, &eps)
    }

    /// log q(z) summed over the latent dimension, one value per example
    pub fn log_prob(z_mean: &Tensor, z_std: &Tensor, z: &Tensor) -> Result<Tensor> {
        gaussian_log_density(z, z_mean, z_std)?.sum(z.rank() - 1)
    }
}

impl<N> EncoderModuleT for GaussianEncoder<N>
where
    N: GaussianParamsModuleT,
{
    /// The network's second output is read as a log-variance,
    /// `std = exp(lnvar / 2)`.
    fn forward_t(&self, x_nd: &Tensor, rng: &mut RandomSource) -> Result<LatentSample> {
        let (mean, lnvar) = self.net.gaussian_params(x_nd)?;
        let std = (lnvar * 0.5)?.exp()?;
        let z = Self::sample(&mean, &std, rng)?;
        Ok(LatentSample { z, mean, std })
    }

    fn dim_obs(&self) -> usize {
        self.net.dim_obs()
    }

    fn dim_latent(&self) -> usize {
        self.net.dim_latent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn encoder_shapes_and_positive_sd() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let net = GaussianEncoderNet::new(10, 3, 8, vb)?;
        let x = Tensor::randn(0f32, 1f32, (4, 10), &dev)?;
        let (mu, sigma) = net.gaussian_params(&x)?;

        assert_eq!(mu.dims(), &[4, 3]);
        assert_eq!(sigma.dims(), &[4, 3]);
        assert!(sigma.min_all()?.to_scalar::<f32>()? > 0.0);

        let encoder = GaussianEncoder::new(net);
        let mut rng = RandomSource::seeded(1);
        let LatentSample { z, mean, std } = encoder.forward_t(&x, &mut rng)?;
        assert_eq!(z.dims(), &[4, 3]);
        assert_eq!(mean.dims(), &[4, 3]);
        assert!(std.min_all()?.to_scalar::<f32>()? > 0.0);
        Ok(())
    }

    #[test]
    fn higher_rank_input_is_flattened() -> Result<()> {
        let dev = Device::Cpu;
        let net = GaussianEncoderNet::new(6, 2, 4, VarBuilder::zeros(DType::F32, &dev))?;
        let x = Tensor::ones((5, 2, 3), DType::F32, &dev)?;
        let (mu, _) = net.gaussian_params(&x)?;
        assert_eq!(mu.dims(), &[5, 2]);
        Ok(())
    }

    #[test]
    fn log_prob_at_mean() -> Result<()> {
        let dev = Device::Cpu;
        let mean = Tensor::new(&[[0.3f32, -1.0], [2.0, 0.0]], &dev)?;
        let std = Tensor::ones((2, 2), DType::F32, &dev)?;
        let lp = GaussianEncoder::<GaussianEncoderNet>::log_prob(&mean, &std, &mean)?;

        let expected = -(2.0 * std::f32::consts::PI).ln();
        for v in lp.to_vec1::<f32>()? {
            approx::assert_abs_diff_eq!(v, expected, epsilon = 1e-5);
        }
        Ok(())
    }
}
