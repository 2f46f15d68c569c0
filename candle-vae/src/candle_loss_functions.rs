use candle_core::{Result, Tensor};

/// Elementwise Normal log-density
///
/// log N(x; mean, scale) = -0.5 * ((x - mean) / scale)^2 - ln(scale) - 0.5 * ln(2π)
///
/// * `x` - observed values
/// * `mean` - location (broadcast against `x`)
/// * `scale` - standard deviation (broadcast against `x`)
///
pub fn gaussian_log_density(x: &Tensor, mean: &Tensor, scale: &Tensor) -> Result<Tensor> {
    let half_ln_2pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
    let z = x.broadcast_sub(mean)?.broadcast_div(scale)?;
    let ln_scale = scale.log()?;
    (z.sqr()? * (-0.5))?.broadcast_sub(&ln_scale)? - half_ln_2pi
}

/// Closed-form KL divergence of a diagonal Gaussian from N(0, I),
/// one value per example
///
/// KL(i) = Σ_k 0.5 * (std(i,k)^2 + mean(i,k)^2 - 1) - ln std(i,k)
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_std` - standard deviation of Gaussian distribution
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_std: &Tensor) -> Result<Tensor> {
    let half_sq = ((z_std.sqr()? + z_mean.sqr()?)? - 1.0)? * 0.5;
    (half_sq? - z_std.log()?)?.sum(z_mean.rank() - 1)
}

/// KL penalty summed over the whole minibatch (all examples and latent
/// dimensions) into one scalar
///
/// Dkl = Σ_{i,k} std(i,k)^2 + mean(i,k)^2 - ln std(i,k) - 0.5
///
/// Non-negative for `std > 0`, but its minimum is not at the prior: each
/// element bottoms out at `0.5 * ln 2` (std = 1/√2, mean = 0). Grows
/// linearly with the batch size.
///
pub fn batch_gaussian_kl(z_mean: &Tensor, z_std: &Tensor) -> Result<Tensor> {
    let sq = (z_std.sqr()? + z_mean.sqr()?)?;
    ((sq - z_std.log()?)? - 0.5)?.sum_all()
}

/// Gaussian log-likelihood of real-valued data with one shared noise
/// parameter
///
/// llik(i) = Σ_d log N(x(i,d); xhat(i,d), exp(log_variance))
///
/// `exp(log_variance)` is passed as the scale of the Normal.
///
/// * `x_nd` - data tensor (observed data), flattened from dim 1
/// * `hat_nd` - reconstruction mean
/// * `log_variance` - shared scalar, any shape with one element
///
pub fn gaussian_likelihood(x_nd: &Tensor, hat_nd: &Tensor, log_variance: &Tensor) -> Result<Tensor> {
    let x_nd = x_nd.flatten_from(1)?;
    let scale = log_variance.reshape((1, 1))?.exp()?;
    gaussian_log_density(&x_nd, hat_nd, &scale)?.sum(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn log_density_matches_standard_normal() -> Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::new(&[0f32, 1.0, -2.0], &dev)?;
        let zero = Tensor::zeros(3, DType::F32, &dev)?;
        let one = Tensor::ones(3, DType::F32, &dev)?;

        let lp = gaussian_log_density(&x, &zero, &one)?.to_vec1::<f32>()?;
        let half_ln_2pi = 0.5 * (2.0 * std::f32::consts::PI).ln();

        approx::assert_abs_diff_eq!(lp[0], -half_ln_2pi, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(lp[1], -0.5 - half_ln_2pi, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(lp[2], -2.0 - half_ln_2pi, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn batch_kl_scales_with_batch() -> Result<()> {
        let dev = Device::Cpu;
        let mean = Tensor::zeros((1, 2), DType::F32, &dev)?;
        let std = Tensor::ones((1, 2), DType::F32, &dev)?;
        let one = batch_gaussian_kl(&mean, &std)?.to_scalar::<f32>()?;

        let mean4 = Tensor::zeros((4, 2), DType::F32, &dev)?;
        let std4 = Tensor::ones((4, 2), DType::F32, &dev)?;
        let four = batch_gaussian_kl(&mean4, &std4)?.to_scalar::<f32>()?;

        // 0.5 per element at the prior
        approx::assert_abs_diff_eq!(one, 1.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(four, 4.0, epsilon = 1e-6);
        Ok(())
    }
}
