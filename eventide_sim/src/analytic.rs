//! Closed-form queueing results the scenarios are checked against.

/// Offered load per server, `λ·E[S] / c`.
pub fn utilization(arrival_rate: f64, mean_service: f64, servers: usize) -> f64 {
    arrival_rate * mean_service / servers as f64
}

/// Probability that an arrival finds an M/M/1/K system full.
pub fn mm1k_blocking(rho: f64, k: usize) -> f64 {
    let k = k as i32;
    if (rho - 1.0).abs() < 1e-12 {
        return 1.0 / f64::from(k + 1);
    }
    (1.0 - rho) * rho.powi(k) / (1.0 - rho.powi(k + 1))
}

/// Probability that an arrival waits in an M/M/c queue (Erlang C), for
/// offered load `a = λ/μ` in Erlangs.
pub fn erlang_c(a: f64, servers: usize) -> f64 {
    let c = servers as f64;
    if a >= c {
        return 1.0;
    }
    // Erlang B by recursion, then convert
    let mut b = 1.0;
    for n in 1..=servers {
        b = a * b / (n as f64 + a * b);
    }
    let rho = a / c;
    b / (1.0 - rho + rho * b)
}

/// Mean number waiting in an M/M/c queue.
pub fn mmc_queue_length(a: f64, servers: usize) -> f64 {
    let rho = a / servers as f64;
    if rho >= 1.0 {
        return f64::INFINITY;
    }
    erlang_c(a, servers) * rho / (1.0 - rho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_mm1_reduces_to_rho_squared_over_one_minus_rho() {
        let rho = 0.8;
        assert_relative_eq!(erlang_c(rho, 1), rho, epsilon = 1e-12);
        assert_relative_eq!(mmc_queue_length(rho, 1), 3.2, epsilon = 1e-9);
    }

    #[test]
    fn test_known_values() {
        assert_relative_eq!(utilization(12.0, 4.0 / 60.0, 1), 0.8, epsilon = 1e-12);
        // (0.2 · 0.8^5) / (1 − 0.8^6)
        assert_relative_eq!(mm1k_blocking(0.8, 5), 0.088_819, epsilon = 1e-5);
        assert_relative_eq!(mm1k_blocking(1.0, 4), 0.2, epsilon = 1e-12);
        // two servers, a = 1: C = 1/3
        assert_relative_eq!(erlang_c(1.0, 2), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_saturated_queue_is_unbounded() {
        assert_eq!(mmc_queue_length(2.0, 2), f64::INFINITY);
        assert_eq!(erlang_c(3.0, 2), 1.0);
    }

    proptest! {
        #[test]
        fn test_blocking_falls_with_room(rho in 0.05f64..0.95, k in 1usize..20) {
            let p = mm1k_blocking(rho, k);
            prop_assert!(p > 0.0 && p < 1.0);
            prop_assert!(mm1k_blocking(rho, k + 1) < p);
        }
    }
}
