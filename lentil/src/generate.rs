use crate::lentil_common::*;

use candle_vae::candle_random::RandomSource;
use candle_vae::candle_vae::{TabularVae, VaeConfig};
use table_util::common_io::mkdir_parent;
use table_util::traits::IoOps;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(
        required = true,
        help = "Model prefix",
        long_help = "Prefix of a trained model, as written by `lentil fit`.\n\
		     Reads {prefix}.config.json and {prefix}.safetensors."
    )]
    model_prefix: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output file",
        long_help = "Output file for the generated rows.\n\
		     `.parquet`, `.csv`, otherwise tab-separated; `.gz` compresses."
    )]
    out: Box<str>,

    #[arg(long, short = 'n', default_value_t = 100, help = "Number of rows")]
    num_rows: usize,

    #[arg(long, help = "Random seed (default: from the OS)")]
    seed: Option<u64>,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Candle device to use for computation.\n\
		     Options: cpu, cuda, metal."
    )]
    device: ComputeDevice,

    #[arg(long, default_value_t = 0, help = "A device for cuda")]
    device_no: usize,

    #[arg(long, short, help = "Verbosity")]
    verbose: bool,
}

pub fn generate_rows(args: &GenerateArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let mut rng = match args.seed {
        Some(seed) => RandomSource::seeded(seed),
        None => RandomSource::from_os_rng(),
    };

    let dev = args.device.open(args.device_no)?;

    let config = VaeConfig::from_json(&format!("{}.config.json", args.model_prefix))?;
    let model_file = format!("{}.safetensors", args.model_prefix);
    let vae = TabularVae::from_files(&config, &model_file, &dev)?;
    info!(
        "loaded {}: {} features, {} latent",
        model_file, config.n_features, config.n_latent
    );

    let x_nd = vae
        .generate(args.num_rows, &dev, &mut rng)?
        .to_device(&Device::Cpu)?;

    let column_names: Vec<Box<str>> = if config.feature_names.len() == config.n_features {
        config.feature_names.clone()
    } else {
        (0..config.n_features)
            .map(|j| format!("x{}", j).into_boxed_str())
            .collect()
    };

    mkdir_parent(&args.out)?;
    x_nd.to_file(None, Some(&column_names), &args.out)?;
    info!("wrote {} rows to {}", args.num_rows, args.out);
    Ok(())
}
