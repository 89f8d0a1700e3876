use crate::traits::{Scalar, Steppable, VectorField};

// Classic 4th-order Runge-Kutta.
static RK4_A: [&[f64]; 3] = [&[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]];
static RK4_B: [f64; 4] = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0];
static RK4_C: [f64; 4] = [0.0, 0.5, 0.5, 1.0];

// Tsitouras 5/4 coefficients (fixed-step update only).
static TSIT5_A: [&[f64]; 5] = [
    &[0.161],
    &[-0.008480655492356989, 0.335480655492357],
    &[2.898, -6.359447987781783, 4.361447987781783],
    &[
        5.325864858437957,
        -11.748883564062828,
        7.495539342889693,
        -0.09249506636030195,
    ],
    &[
        5.86145544294642,
        -12.92096931784711,
        8.159367898576159,
        -0.071584973281401,
        -0.02826857949054663,
    ],
];
static TSIT5_B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436099,
    2.324710524099774,
];
static TSIT5_C: [f64; 6] = [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0];

/// Explicit Runge-Kutta stepper driven by a Butcher tableau. One body
/// serves every method; the tableau decides the order.
pub struct ExplicitRk<T: Scalar> {
    a: &'static [&'static [f64]],
    b: &'static [f64],
    c: &'static [f64],
    k: Vec<Vec<T>>,
    tmp: Vec<T>,
}

impl<T: Scalar> ExplicitRk<T> {
    fn with_tableau(
        a: &'static [&'static [f64]],
        b: &'static [f64],
        c: &'static [f64],
        dim: usize,
    ) -> Self {
        let zero = T::from_f64(0.0).unwrap();
        Self {
            a,
            b,
            c,
            k: vec![vec![zero; dim]; b.len()],
            tmp: vec![zero; dim],
        }
    }

    pub fn rk4(dim: usize) -> Self {
        Self::with_tableau(&RK4_A, &RK4_B, &RK4_C, dim)
    }

    pub fn tsit5(dim: usize) -> Self {
        Self::with_tableau(&TSIT5_A, &TSIT5_B, &TSIT5_C, dim)
    }
}

impl<T: Scalar> Steppable<T> for ExplicitRk<T> {
    fn step(&mut self, system: &impl VectorField<T>, t: &mut T, state: &mut [T], dt: T) {
        let zero = T::from_f64(0.0).unwrap();
        let stages = self.b.len();
        let t0 = *t;

        system.apply(t0, state, &mut self.k[0]);
        for s in 1..stages {
            let row = self.a[s - 1];
            for i in 0..state.len() {
                let mut acc = zero;
                for (j, &coeff) in row.iter().enumerate() {
                    if coeff != 0.0 {
                        acc = acc + T::from_f64(coeff).unwrap() * self.k[j][i];
                    }
                }
                self.tmp[i] = state[i] + dt * acc;
            }
            let stage_time = t0 + dt * T::from_f64(self.c[s]).unwrap();
            system.apply(stage_time, &self.tmp, &mut self.k[s]);
        }

        for i in 0..state.len() {
            let mut acc = zero;
            for (s, &weight) in self.b.iter().enumerate() {
                acc = acc + T::from_f64(weight).unwrap() * self.k[s][i];
            }
            state[i] = state[i] + dt * acc;
        }

        *t = t0 + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl VectorField<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }
        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    fn integrate(mut stepper: ExplicitRk<f64>, dt: f64, t_end: f64) -> f64 {
        let mut t = 0.0;
        let mut state = [1.0];
        while t < t_end - 1e-12 {
            stepper.step(&Decay, &mut t, &mut state, dt);
        }
        state[0]
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let value = integrate(ExplicitRk::rk4(1), 0.01, 1.0);
        assert!(
            (value - (-1.0f64).exp()).abs() < 1e-8,
            "rk4 drifted: {value}"
        );
    }

    #[test]
    fn tsit5_matches_exponential_decay() {
        let value = integrate(ExplicitRk::tsit5(1), 0.01, 1.0);
        assert!(
            (value - (-1.0f64).exp()).abs() < 1e-10,
            "tsit5 drifted: {value}"
        );
    }
}
