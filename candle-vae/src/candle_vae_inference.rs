use crate::candle_data_loader::*;
use crate::candle_random::RandomSource;
use crate::candle_vae::{TabularVae, VaeConfig};

use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use table_util::traits::IoOps;

pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub device: Device,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Per-epoch averages of the three training signals on both splits
#[derive(Default, Debug, Clone)]
pub struct LossTraces {
    pub train_elbo: Vec<f32>,
    pub train_kl: Vec<f32>,
    pub train_recon_llik: Vec<f32>,
    pub test_elbo: Vec<f32>,
    pub test_kl: Vec<f32>,
    pub test_recon_llik: Vec<f32>,
}

impl LossTraces {
    pub fn num_epochs(&self) -> usize {
        self.train_elbo.len()
    }

    pub fn column_names() -> Vec<Box<str>> {
        [
            "train_elbo",
            "train_kl",
            "train_recon_llik",
            "test_elbo",
            "test_kl",
            "test_recon_llik",
        ]
        .into_iter()
        .map(Box::from)
        .collect()
    }

    /// epochs x 6 matrix, columns in the order of `column_names`
    pub fn to_tensor(&self) -> anyhow::Result<Tensor> {
        let traces = [
            &self.train_elbo,
            &self.train_kl,
            &self.train_recon_llik,
            &self.test_elbo,
            &self.test_kl,
            &self.test_recon_llik,
        ];
        let nepoch = self.num_epochs();
        if traces.iter().any(|t| t.len() != nepoch) {
            return Err(anyhow::anyhow!("loss traces of unequal length"));
        }

        let flat: Vec<f32> = (0..nepoch)
            .flat_map(|e| traces.iter().map(move |t| t[e]))
            .collect();
        Ok(Tensor::from_vec(flat, (nepoch, traces.len()), &Device::Cpu)?)
    }

    /// One row per epoch, named `1..=num_epochs`
    pub fn to_parquet(&self, file_path: &str) -> anyhow::Result<()> {
        let epochs: Vec<Box<str>> = (1..=self.num_epochs())
            .map(|e| e.to_string().into_boxed_str())
            .collect();
        self.to_tensor()?
            .to_parquet(Some(&epochs), Some(&Self::column_names()), file_path)
    }
}

pub struct TrainOut {
    pub scores: LossTraces,
    /// test-set latent samples of the final epoch (n_test x k), on CPU
    pub latent: Tensor,
    /// names of the `latent` rows
    pub latent_rows: Vec<Box<str>>,
}

/// The latent space may not be wider than the data
pub fn check_latent_dim(latent_dim: usize, n_columns: usize) -> anyhow::Result<()> {
    if latent_dim > n_columns {
        return Err(anyhow::anyhow!(
            "Latent dimension cannot be greater than the number of columns in the dataset."
        ));
    }
    Ok(())
}

struct EpochStat {
    elbo: f32,
    kl: f32,
    recon_llik: f32,
}

impl EpochStat {
    fn new() -> Self {
        Self {
            elbo: 0.,
            kl: 0.,
            recon_llik: 0.,
        }
    }

    fn add(&mut self, elbo: &Tensor, kl: &Tensor, recon_llik: &Tensor) -> candle_core::Result<()> {
        self.elbo += elbo.to_scalar::<f32>()?;
        self.kl += kl.to_scalar::<f32>()?;
        self.recon_llik += recon_llik.to_scalar::<f32>()?;
        Ok(())
    }

    fn averaged(self, nbatch: usize) -> Self {
        let n = nbatch.max(1) as f32;
        Self {
            elbo: self.elbo / n,
            kl: self.kl / n,
            recon_llik: self.recon_llik / n,
        }
    }
}

///
/// Train a `TabularVae` on `train` and track the same losses on `test`
/// after every epoch.
///
/// At least one epoch is required. Dimensions are checked before
/// anything is built: the number of features comes from the first
/// training minibatch, the latent dimension may not exceed it, and the
/// test data must have as many columns.
///
/// # Arguments
/// * `train` - training rows (reshuffled every epoch)
/// * `test` - evaluation rows (kept in order; no parameter update)
/// * `config` - architecture; `config.n_features` is overwritten by the data
/// * `train_config` - optimizer and device settings
/// * `rng` - the single random stream of the run
///
pub fn fit_tabular_vae(
    train: &mut TabularLoader,
    test: &mut TabularLoader,
    config: &VaeConfig,
    train_config: &TrainConfig,
    rng: &mut RandomSource,
) -> anyhow::Result<(TabularVae, TrainOut)> {
    let device = &train_config.device;

    if train_config.num_epochs == 0 {
        return Err(anyhow::anyhow!("number of epochs must be positive"));
    }

    let n_features = train.minibatch_data(0, &Device::Cpu)?.input.dims()[1];
    check_latent_dim(config.n_latent, n_features)?;

    if test.num_columns() != n_features {
        return Err(anyhow::anyhow!(
            "training data has {} columns, test data has {}",
            n_features,
            test.num_columns()
        ));
    }

    let config = VaeConfig {
        n_features,
        ..config.clone()
    };

    info!(
        "VAE: {} -> {} (hidden {}), beta = {}, KL {:?}",
        config.n_features, config.n_latent, config.n_hidden, config.beta, config.kl_mode
    );

    let vae = TabularVae::new(&config, device)?;

    let mut adam = AdamW::new(
        vae.variables(),
        ParamsAdamW {
            lr: train_config.learning_rate.into(),
            weight_decay: 0.,
            ..Default::default()
        },
    )?;

    let pb = ProgressBar::new(train_config.num_epochs as u64);
    if !train_config.show_progress || train_config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut scores = LossTraces::default();
    let mut latent_chunks = vec![];
    let mut latent_rows = vec![];

    test.sequential_minibatch();

    for epoch in 0..train_config.num_epochs {
        train.shuffle_minibatch(rng);

        let mut stat = EpochStat::new();
        for b in 0..train.num_minibatch() {
            let mb = train.minibatch_data(b, device)?;
            let out = vae.forward(&mb.input, rng)?;
            adam.backward_step(&out.elbo)?;
            stat.add(&out.elbo, &out.kl, &out.recon_llik)?;
        }
        let stat = stat.averaged(train.num_minibatch());
        scores.train_elbo.push(stat.elbo);
        scores.train_kl.push(stat.kl);
        scores.train_recon_llik.push(stat.recon_llik);

        let last_epoch = epoch + 1 == train_config.num_epochs;

        let mut test_stat = EpochStat::new();
        for b in 0..test.num_minibatch() {
            let mb = test.minibatch_data(b, device)?;
            let out = vae.forward(&mb.input, rng)?;
            test_stat.add(&out.elbo, &out.kl, &out.recon_llik)?;
            if last_epoch {
                latent_chunks.push(out.z.detach().to_device(&Device::Cpu)?);
                latent_rows.extend(test.row_names(&mb.rows));
            }
        }
        let test_stat = test_stat.averaged(test.num_minibatch());
        scores.test_elbo.push(test_stat.elbo);
        scores.test_kl.push(test_stat.kl);
        scores.test_recon_llik.push(test_stat.recon_llik);

        pb.inc(1);

        if train_config.verbose {
            info!(
                "[{}] train elbo: {:.4}, kl: {:.4}, llik: {:.4} | test elbo: {:.4}, kl: {:.4}, llik: {:.4}",
                epoch + 1,
                stat.elbo,
                stat.kl,
                stat.recon_llik,
                test_stat.elbo,
                test_stat.kl,
                test_stat.recon_llik
            );
        }
    }
    pb.finish_and_clear();

    let latent = Tensor::cat(&latent_chunks, 0)?;

    Ok((
        vae,
        TrainOut {
            scores,
            latent,
            latent_rows,
        },
    ))
}
