use num::Float;

/// Probability that at least `min_count` of a set of independent events occur
///
/// `probs` holds the probability of each event. The count distribution is the poisson-binomial
/// distribution, built here by dynamic programming over the events. When every event is required
/// the product is returned directly.
///
pub fn get_poisson_binomial_tail<F: Float>(probs: &[F], min_count: usize) -> F {
    let zero = F::zero();
    let one = F::one();

    if min_count == 0 {
        return one;
    }
    if min_count > probs.len() {
        return zero;
    }
    if min_count == probs.len() {
        return probs.iter().fold(one, |acc, p| acc * *p);
    }

    let mut count_pdf = vec![zero; probs.len() + 1];
    count_pdf[0] = one;
    for (index, p) in probs.iter().enumerate() {
        let q = one - *p;
        for count in (1..=(index + 1)).rev() {
            count_pdf[count] = count_pdf[count] * q + count_pdf[count - 1] * *p;
        }
        count_pdf[0] = count_pdf[0] * q;
    }
    count_pdf[min_count..].iter().fold(zero, |acc, p| acc + *p)
}

/// Probability of at least one success in `trial_count` independent trials of probability `p`
///
/// Evaluated as `1 - (1 - p)^n` in log space so that tiny `p` keeps full precision.
///
pub fn get_any_success_prob(p: f64, trial_count: f64) -> f64 {
    if p <= 0.0 || trial_count <= 0.0 {
        0.0
    } else if p >= 1.0 {
        1.0
    } else {
        -(trial_count * (-p).ln_1p()).exp_m1()
    }
}
