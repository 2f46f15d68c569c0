mod fit_vae;
mod generate;
mod lentil_common;

use fit_vae::*;
use generate::*;
use lentil_common::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Latent Embedding of Numeric Tables with Inference by Likelihood\n\
		  A beta-VAE for real-valued tabular data (tsv, csv, optionally gzipped)."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Train a beta-VAE on a table",
        long_about = "Train a Gaussian encoder/decoder pair by SGD on the training table,\n\
		      tracking the same losses on the test table after each epoch.\n\
		      Saves the model, its configuration, the loss traces and\n\
		      the test-set latent states of the last epoch.\n"
    )]
    Fit(FitArgs),

    #[command(
        about = "Generate new rows from a trained model",
        long_about = "Sample z ~ N(0, I), decode, and add observation noise\n\
		      with the learned log-variance.\n"
    )]
    Generate(GenerateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Fit(args) => {
            fit_vae(args)?;
        }
        Commands::Generate(args) => {
            generate_rows(args)?;
        }
    }

    info!("Done");
    Ok(())
}
