use crate::candle_decoder_gaussian::{GaussianDecoder, SigmoidDecoderNet};
use crate::candle_encoder_gaussian::{GaussianEncoder, GaussianEncoderNet};
use crate::candle_loss_functions::{batch_gaussian_kl, gaussian_kl_loss};
use crate::candle_model_traits::*;
use crate::candle_random::RandomSource;

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the KL term enters the ELBO
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum KlMode {
    /// one scalar summed over the whole minibatch, broadcast against
    /// every example's log-likelihood (effective beta grows with the
    /// batch size)
    #[default]
    BatchSum,
    /// closed-form KL(q || N(0, I)) for each example
    PerExample,
}

/// Architecture and objective of a tabular VAE
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    pub n_features: usize,
    pub n_latent: usize,
    pub n_hidden: usize,
    pub beta: f64,
    #[serde(default)]
    pub kl_mode: KlMode,
    /// column names of the training data, if known
    #[serde(default)]
    pub feature_names: Vec<Box<str>>,
}

impl VaeConfig {
    pub fn new(n_features: usize, n_latent: usize, n_hidden: usize, beta: f64) -> Self {
        Self {
            n_features,
            n_latent,
            n_hidden,
            beta,
            kl_mode: KlMode::default(),
            feature_names: vec![],
        }
    }

    pub fn with_kl_mode(mut self, kl_mode: KlMode) -> Self {
        self.kl_mode = kl_mode;
        self
    }

    pub fn with_feature_names(mut self, feature_names: Vec<Box<str>>) -> Self {
        self.feature_names = feature_names;
        self
    }

    pub fn to_json(&self, file: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(file, json)?;
        Ok(())
    }

    pub fn from_json(file: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(file)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", file, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Result of one forward pass over a minibatch
pub struct VaeOutput {
    /// scalar loss to minimise, `mean_n(beta * Dkl - llik_n)`
    pub elbo: Tensor,
    /// mean KL term (diagnostic)
    pub kl: Tensor,
    /// mean reconstruction log-likelihood (diagnostic)
    pub recon_llik: Tensor,
    /// latent sample (n x k)
    pub z: Tensor,
}

pub struct Vae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    encoder: Enc,
    decoder: Dec,
    variable_map: VarMap,
    beta: f64,
    kl_mode: KlMode,
}

impl<Enc, Dec> Vae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    /// * `variable_map` - the variables of both modules
    /// * `beta` - weight of the KL term
    /// * `kl_mode` - how the KL term is aggregated
    pub fn build(
        encoder: Enc,
        decoder: Dec,
        variable_map: VarMap,
        beta: f64,
        kl_mode: KlMode,
    ) -> Result<Self> {
        if encoder.dim_latent() != decoder.dim_latent() || encoder.dim_obs() != decoder.dim_obs() {
            candle_core::bail!(
                "encoder ({} -> {}) and decoder ({} -> {}) do not match",
                encoder.dim_obs(),
                encoder.dim_latent(),
                decoder.dim_latent(),
                decoder.dim_obs()
            );
        }

        Ok(Self {
            encoder,
            decoder,
            variable_map,
            beta,
            kl_mode,
        })
    }

    pub fn encoder(&self) -> &Enc {
        &self.encoder
    }

    pub fn decoder(&self) -> &Dec {
        &self.decoder
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn kl_mode(&self) -> KlMode {
        self.kl_mode
    }

    /// All trainable variables, for the optimizer
    pub fn variables(&self) -> Vec<Var> {
        self.variable_map.all_vars()
    }

    /// KL term: a scalar in `BatchSum` mode, one value per example in
    /// `PerExample` mode
    pub fn kl_divergence(&self, z_mean: &Tensor, z_std: &Tensor) -> Result<Tensor> {
        match self.kl_mode {
            KlMode::BatchSum => batch_gaussian_kl(z_mean, z_std),
            KlMode::PerExample => gaussian_kl_loss(z_mean, z_std),
        }
    }

    /// x -> q(z|x) -> z -> p(x|z)
    pub fn forward(&self, x_nd: &Tensor, rng: &mut RandomSource) -> Result<VaeOutput> {
        let LatentSample { z, mean, std } = self.encoder.forward_t(x_nd, rng)?;
        let (_, llik_n) = self.decoder.forward_with_llik(&z, x_nd)?;
        let kl = self.kl_divergence(&mean, &std)?;

        let elbo = (kl.affine(self.beta, 0.)?.broadcast_sub(&llik_n)?).mean_all()?;

        Ok(VaeOutput {
            elbo,
            kl: kl.mean_all()?,
            recon_llik: llik_n.mean_all()?,
            z,
        })
    }

    /// Draw `x ~ N(mean, exp(log_variance))`, with `exp(log_variance)`
    /// as the scale. Not differentiable.
    pub fn sample(&self, mean: &Tensor, log_variance: &Tensor, rng: &mut RandomSource) -> Result<Tensor> {
        let scale = log_variance.exp()?;
        let eps = rng.randn_like(mean)?;
        Ok(mean.broadcast_add(&eps.broadcast_mul(&scale)?)?.detach())
    }

    /// Generate `n` new rows: `z ~ N(0, I)` through the decoder, then
    /// observation noise from the learned `log_variance`
    pub fn generate(&self, n: usize, device: &Device, rng: &mut RandomSource) -> Result<Tensor> {
        let z_nk = rng.randn((n, self.decoder.dim_latent()), DType::F32, device)?;
        let mean_nd = self.decoder.forward(&z_nk)?;
        let log_variance = self.decoder.log_variance().reshape((1, 1))?;
        self.sample(&mean_nd, &log_variance, rng)
    }

    /// Write all the learned parameters (safetensors)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.variable_map.save(path)
    }

    /// Overwrite the parameters with those saved in `path`
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.variable_map.load(path)
    }
}

/// The tabular model: one hidden ReLU layer on each side, Gaussian
/// posterior, sigmoid-bounded Gaussian likelihood
pub type TabularVae = Vae<GaussianEncoder<GaussianEncoderNet>, GaussianDecoder<SigmoidDecoderNet>>;

impl TabularVae {
    /// Create a freshly initialised model on `device`
    pub fn new(config: &VaeConfig, device: &Device) -> Result<Self> {
        let variable_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&variable_map, DType::F32, device);
        Self::with_var_builder(config, variable_map, vb)
    }

    /// Create a model whose parameters all start at zero. The
    /// variables are registered as usual, so they can be trained and
    /// saved.
    pub fn zeros(config: &VaeConfig, device: &Device) -> Result<Self> {
        let vae = Self::new(config, device)?;
        for var in vae.variables() {
            var.set(&var.as_tensor().zeros_like()?)?;
        }
        Ok(vae)
    }

    fn with_var_builder(config: &VaeConfig, variable_map: VarMap, vb: VarBuilder) -> Result<Self> {
        let (d, k, h) = (config.n_features, config.n_latent, config.n_hidden);

        let encoder = GaussianEncoder::new(GaussianEncoderNet::new(d, k, h, vb.clone())?);
        let decoder_net = SigmoidDecoderNet::new(d, k, h, vb.clone())?;
        let decoder = GaussianDecoder::new(d, k, decoder_net, vb)?;

        Self::build(encoder, decoder, variable_map, config.beta, config.kl_mode)
    }

    /// Rebuild a trained model from its config and parameter file
    pub fn from_files(config: &VaeConfig, model_file: &str, device: &Device) -> anyhow::Result<Self> {
        let mut vae = Self::new(config, device)?;
        vae.load(model_file)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {}", model_file, e))?;
        Ok(vae)
    }
}
