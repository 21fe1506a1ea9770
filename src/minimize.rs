use std::cell::Cell;

/// Result of a simplex minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fx: f64,
    pub evals: usize,
    pub converged: bool,
}

/// Nelder-Mead downhill simplex.
///
/// `steps` sets the initial simplex size per parameter. Converges when the
/// spread of function values over the simplex drops below
/// `tolerance * (1 + |f_best|)`.
pub fn nelder_mead(
    f: impl Fn(&[f64]) -> f64,
    start: &[f64],
    steps: &[f64],
    max_evals: usize,
    tolerance: f64,
) -> Minimum {
    const ALPHA: f64 = 1.0;
    const GAMMA: f64 = 2.0;
    const RHO: f64 = 0.5;
    const SIGMA: f64 = 0.5;

    let n = start.len();
    let evals = Cell::new(0usize);
    let eval = |x: &[f64]| {
        evals.set(evals.get() + 1);
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), eval(start)));
    for i in 0..n {
        let mut x = start.to_vec();
        x[i] += steps.get(i).copied().unwrap_or(1.0);
        let fx = eval(&x);
        simplex.push((x, fx));
    }

    let mut converged = false;
    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let f_best = simplex[0].1;
        let f_worst = simplex[n].1;

        if (f_worst - f_best).abs() <= tolerance * (1.0 + f_best.abs()) {
            converged = true;
            break;
        }
        if evals.get() >= max_evals {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let along = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, w)| c + t * (w - c))
                .collect()
        };

        let reflected = along(-ALPHA);
        let f_reflected = eval(&reflected);

        if f_reflected < f_best {
            let expanded = along(-GAMMA);
            let f_expanded = eval(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
            continue;
        }

        let contracted = if f_reflected < f_worst {
            along(-RHO)
        } else {
            along(RHO)
        };
        let f_contracted = eval(&contracted);
        if f_contracted < f_worst.min(f_reflected) {
            simplex[n] = (contracted, f_contracted);
            continue;
        }

        // shrink towards the best vertex
        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let x: Vec<f64> = best
                .iter()
                .zip(&vertex.0)
                .map(|(b, v)| b + SIGMA * (v - b))
                .collect();
            let fx = eval(&x);
            *vertex = (x, fx);
        }
    }

    let (x, fx) = simplex.swap_remove(0);
    Minimum {
        x,
        fx,
        evals: evals.get(),
        converged,
    }
}
