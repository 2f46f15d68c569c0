use crate::lentil_common::*;

use candle_vae::candle_data_loader::*;
use candle_vae::candle_random::RandomSource;
use candle_vae::candle_vae::{KlMode, VaeConfig};
use candle_vae::candle_vae_inference::*;
use table_util::common_io::mkdir_parent;
use table_util::table_io::{read_table, TableFormat};
use table_util::traits::IoOps;

#[derive(Args, Debug)]
pub struct FitArgs {
    #[arg(
        required = true,
        help = "Training data file",
        long_help = "Training table (tsv or csv, optionally gzipped).\n\
		     One row per example; all non-auxiliary columns must be numbers."
    )]
    train_file: Box<str>,

    #[arg(
        required = true,
        help = "Test data file",
        long_help = "Test table with the same columns as the training table.\n\
		     Evaluated after every epoch without updating the model."
    )]
    test_file: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results. The hyperparameters are appended:\n\
		     {out}_s{sample}_b{beta}_lr{lr}_ld{latent}_hd{hidden}_bs{batch}_epo{epochs}\n\
		     and the following files are written with that prefix:\n\
		     - {prefix}.safetensors\n\
		     - {prefix}.config.json\n\
		     - {prefix}.scores.parquet\n\
		     - {prefix}.latent.parquet\n"
    )]
    out: Box<str>,

    #[arg(long, short, default_value_t = 10, help = "Number of training epochs")]
    epochs: usize,

    #[arg(long, short, default_value_t = 64, help = "Minibatch size")]
    batch_size: usize,

    #[arg(
        long,
        short,
        default_value_t = 1.0,
        help = "Fraction of rows to use",
        long_help = "Fraction of rows in (0, 1] drawn from each table.\n\
		     Both the training and test tables are subsampled."
    )]
    sample: f64,

    #[arg(long, short = 'k', default_value_t = 2, help = "Latent dimension")]
    latent_dim: usize,

    #[arg(long, short = 'H', default_value_t = 64, help = "Hidden layer width")]
    hidden_dim: usize,

    #[arg(
        long,
        default_value_t = 1e-3,
        help = "Learning rate",
        long_help = "Learning rate for optimization.\n\
		     Controls the step size for parameter updates."
    )]
    learning_rate: f32,

    #[arg(long, default_value_t = 1.0, help = "Weight of the KL term")]
    beta: f64,

    #[arg(
        long,
        value_enum,
        default_value = "batch-sum",
        help = "KL aggregation",
        long_help = "batch-sum: one penalty summed over the whole minibatch.\n\
		     per-example: closed-form KL(q || N(0, I)) of each row."
    )]
    kl_mode: KlMode,

    #[arg(long, help = "Random seed (default: from the OS)")]
    seed: Option<u64>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Leading non-numeric columns",
        long_help = "Number of leading columns (ids, labels) carried along\n\
		     but not modelled. The first one names the latent rows."
    )]
    aux_columns: usize,

    #[arg(long, default_value_t = false, help = "Tables have no header line")]
    no_header: bool,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Candle device to use for computation.\n\
		     Options: cpu, cuda, metal."
    )]
    device: ComputeDevice,

    #[arg(
        long,
        default_value_t = 0,
        help = "A device for cuda",
        long_help = "For cuda or metal, we may want to choose a different device."
    )]
    device_no: usize,

    #[arg(
        long,
        short,
        help = "Verbosity",
        long_help = "Enable verbose output.\n\
		     Prints additional information during execution."
    )]
    verbose: bool,
}

impl FitArgs {
    /// `{out}_s{sample}_b{beta}_lr{lr}_ld{latent}_hd{hidden}_bs{batch}_epo{epochs}`
    pub fn output_prefix(&self) -> String {
        format!(
            "{}_s{:?}_b{:?}_lr{:?}_ld{}_hd{}_bs{}_epo{}",
            self.out,
            self.sample,
            self.beta,
            self.learning_rate,
            self.latent_dim,
            self.hidden_dim,
            self.batch_size,
            self.epochs
        )
    }
}

pub fn fit_vae(args: &FitArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let mut rng = match args.seed {
        Some(seed) => RandomSource::seeded(seed),
        None => RandomSource::from_os_rng(),
    };

    // 1. Read the tables
    let format = TableFormat {
        aux_columns: args.aux_columns,
        has_header: !args.no_header,
        delim: None,
    };

    let train = read_table(&args.train_file, &format)?;
    let test = read_table(&args.test_file, &format)?;
    let feature_names = train.feature_names.clone();

    let mut train = TabularLoader::new(
        TabularData::from_table(train)?,
        args.batch_size,
        args.sample,
        &mut rng,
    )?;
    let mut test = TabularLoader::new(
        TabularData::from_table(test)?,
        args.batch_size,
        args.sample,
        &mut rng,
    )?;

    info!(
        "{} training rows, {} test rows, {} features",
        train.num_rows(),
        test.num_rows(),
        train.num_columns()
    );

    // 2. Train
    let dev = args.device.open(args.device_no)?;

    let config = VaeConfig::new(
        train.num_columns(),
        args.latent_dim,
        args.hidden_dim,
        args.beta,
    )
    .with_kl_mode(args.kl_mode)
    .with_feature_names(feature_names);

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        num_epochs: args.epochs,
        device: dev,
        verbose: args.verbose,
        show_progress: true,
    };

    let (vae, out) = fit_tabular_vae(&mut train, &mut test, &config, &train_config, &mut rng)?;

    // 3. Save
    let prefix = args.output_prefix();
    mkdir_parent(&prefix)?;

    let model_file = format!("{}.safetensors", prefix);
    vae.save(&model_file)?;
    config.to_json(&format!("{}.config.json", prefix))?;
    info!("saved the model: {}", model_file);

    out.scores.to_parquet(&format!("{}.scores.parquet", prefix))?;

    let latent_names: Vec<Box<str>> = (0..config.n_latent)
        .map(|k| format!("z{}", k).into_boxed_str())
        .collect();
    out.latent.to_parquet(
        Some(&out.latent_rows),
        Some(&latent_names),
        &format!("{}.latent.parquet", prefix),
    )?;

    if let (Some(train_elbo), Some(test_elbo)) =
        (out.scores.train_elbo.last(), out.scores.test_elbo.last())
    {
        info!("final loss: train {:.4}, test {:.4}", train_elbo, test_elbo);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct Wrap {
        #[command(flatten)]
        args: FitArgs,
    }

    #[test]
    fn prefix_carries_hyperparameters() {
        let args = Wrap::parse_from([
            "fit", "tr.tsv", "te.tsv", "--out", "res/run", "--epochs", "5", "--latent-dim", "3",
        ])
        .args;
        assert_eq!(
            args.output_prefix(),
            "res/run_s1.0_b1.0_lr0.001_ld3_hd64_bs64_epo5"
        );
        assert_eq!(args.kl_mode, KlMode::BatchSum);

        let args = Wrap::parse_from([
            "fit", "a", "b", "-o", "x", "-s", "0.5", "--beta", "4", "--learning-rate", "0.01",
            "-b", "32", "--kl-mode", "per-example",
        ])
        .args;
        assert_eq!(args.output_prefix(), "x_s0.5_b4.0_lr0.01_ld2_hd64_bs32_epo10");
        assert_eq!(args.kl_mode, KlMode::PerExample);
    }
}
