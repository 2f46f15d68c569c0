use crate::candle_loss_functions::gaussian_likelihood;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{ops, Activation, Linear, Module, VarBuilder};

///////////////////////////////////////
// Decoder network: z -> xhat in [0,1] //
///////////////////////////////////////

pub struct SigmoidDecoderNet {
    fc: Linear,
    act: Activation,
    out: Linear,
}

impl SigmoidDecoderNet {
    /// Will create a new decoder network with these variables:
    ///
    /// * `dec.fc.{weight,bias}`
    /// * `dec.out.{weight,bias}`
    pub fn new(n_features: usize, n_latent: usize, n_hidden: usize, vs: VarBuilder) -> Result<Self> {
        let fc = candle_nn::linear(n_latent, n_hidden, vs.pp("dec.fc"))?;
        let out = candle_nn::linear(n_hidden, n_features, vs.pp("dec.out"))?;
        Ok(Self {
            fc,
            act: Activation::Relu,
            out,
        })
    }
}

impl Module for SigmoidDecoderNet {
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        let h_nh = self.act.forward(&self.fc.forward(z_nk)?)?;
        ops::sigmoid(&self.out.forward(&h_nh)?)
    }
}

////////////////////////////////////////////
// Stochastic decoder: p(x|z) = N(xhat, s) //
////////////////////////////////////////////

/// Gaussian observation model on top of a mean network. One learned
/// scalar `dec.log_variance` (initialised at 0) sets the noise level of
/// every feature of every example.
pub struct GaussianDecoder<N>
where
    N: Module,
{
    n_features: usize,
    n_latent: usize,
    net: N,
    log_variance: Tensor,
}

impl<N> GaussianDecoder<N>
where
    N: Module,
{
    /// * `dec.log_variance` - shape `[1]`
    pub fn new(n_features: usize, n_latent: usize, net: N, vs: VarBuilder) -> Result<Self> {
        let log_variance = vs.get_with_hints(1, "dec.log_variance", candle_nn::Init::Const(0.0))?;
        Ok(Self {
            n_features,
            n_latent,
            net,
            log_variance,
        })
    }

    pub fn network(&self) -> &N {
        &self.net
    }
}

impl<N> DecoderModuleT for GaussianDecoder<N>
where
    N: Module,
{
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.net.forward(z_nk)
    }

    fn forward_with_llik(&self, z_nk: &Tensor, x_nd: &Tensor) -> Result<(Tensor, Tensor)> {
        let recon_nd = self.net.forward(z_nk)?;
        let llik_n = gaussian_likelihood(x_nd, &recon_nd, &self.log_variance)?;
        Ok((recon_nd, llik_n))
    }

    fn log_variance(&self) -> &Tensor {
        &self.log_variance
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn build(n_features: usize, n_latent: usize) -> Result<(VarMap, GaussianDecoder<SigmoidDecoderNet>)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = SigmoidDecoderNet::new(n_features, n_latent, 8, vb.clone())?;
        let dec = GaussianDecoder::new(n_features, n_latent, net, vb)?;
        Ok((varmap, dec))
    }

    #[test]
    fn recon_is_bounded() -> Result<()> {
        let (_, dec) = build(7, 3)?;
        let z = (Tensor::randn(0f32, 1f32, (16, 3), &Device::Cpu)? * 10.0)?;
        let recon = dec.forward(&z)?;
        assert_eq!(recon.dims(), &[16, 7]);
        assert!(recon.min_all()?.to_scalar::<f32>()? >= 0.0);
        assert!(recon.max_all()?.to_scalar::<f32>()? <= 1.0);
        Ok(())
    }

    #[test]
    fn exactly_one_shared_noise_parameter() -> Result<()> {
        let (varmap, dec) = build(5, 2)?;
        assert_eq!(dec.log_variance().dims(), &[1]);
        assert_eq!(dec.log_variance().to_vec1::<f32>()?, vec![0.0]);

        let data = varmap.data().lock().unwrap();
        let lv = data.get("dec.log_variance").expect("registered");
        assert_eq!(lv.as_tensor().elem_count(), 1);
        Ok(())
    }

    #[test]
    fn llik_is_per_example() -> Result<()> {
        let (_, dec) = build(5, 2)?;
        let z = Tensor::randn(0f32, 1f32, (9, 2), &Device::Cpu)?;
        let x = Tensor::rand(0f32, 1f32, (9, 5), &Device::Cpu)?;
        let (recon, llik) = dec.forward_with_llik(&z, &x)?;
        assert_eq!(recon.dims(), &[9, 5]);
        assert_eq!(llik.dims(), &[9]);
        Ok(())
    }
}
