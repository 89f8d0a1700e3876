//! Closed-form root solving over the expression AST.
//!
//! The solver handles the two shapes that cover most model right-hand
//! sides once fixed variables and parameters are bound: polynomials of
//! degree <= 2 in the target variable (with coefficients that may still
//! contain the other dynamical variable), and expressions where the
//! target occurs exactly once under an invertible chain of operations.
//! Everything else reports failure and the caller falls back to the
//! numeric optimizer; these failures never reach the user.

use crate::equation_engine::Expr;
use anyhow::{bail, Result};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Tagged outcome of a bounded closed-form solve attempt.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// Root expressions in the remaining free variable(s). May be empty
    /// when the equation provably has no roots.
    Solved(Vec<Expr>),
    /// The equation's form is outside the solver's reach.
    Unsupported,
    /// The time budget expired; the worker was abandoned.
    TimedOut,
}

/// Attempts `solve_zero` on a worker thread, abandoning it when `timeout`
/// expires. Symbolic rewriting is not interruptible mid-flight, so expiry
/// leaves the detached worker to finish (and be discarded) on its own.
pub fn solve_zero_with_timeout(expr: &Expr, var: &str, timeout: Duration) -> SolveOutcome {
    if timeout.is_zero() {
        return SolveOutcome::TimedOut;
    }
    let expr = expr.clone();
    let var = var.to_string();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(solve_zero(&expr, &var));
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(roots)) => SolveOutcome::Solved(roots),
        Ok(Err(_)) => SolveOutcome::Unsupported,
        Err(_) => SolveOutcome::TimedOut,
    }
}

/// Solves `expr = 0` for `var` in closed form.
pub fn solve_zero(expr: &Expr, var: &str) -> Result<Vec<Expr>> {
    let folded = fold(expr);
    if !folded.contains(var) {
        bail!("expression does not involve `{var}`");
    }
    if let Some(coeffs) = polynomial_in(&folded, var) {
        return polynomial_roots(coeffs);
    }
    if folded.occurrences(var) == 1 {
        return isolate(&folded, var, Expr::number(0.0));
    }
    bail!("no closed form found for `{var}`")
}

// --- Constant folding ---

/// Recursively evaluates constant subtrees and strips arithmetic
/// identities (x+0, x*1, x*0, x/1, x^1).
pub fn fold(expr: &Expr) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
        Expr::Binary(l, op, r) => {
            let l = fold(l);
            let r = fold(r);
            if let (Expr::Number(a), Expr::Number(b)) = (&l, &r) {
                return Expr::Number(apply_binary(*a, *op, *b));
            }
            match (op, &l, &r) {
                ('+', Expr::Number(z), _) if *z == 0.0 => return r,
                ('+', _, Expr::Number(z)) if *z == 0.0 => return l,
                ('-', _, Expr::Number(z)) if *z == 0.0 => return l,
                ('*', Expr::Number(u), _) if *u == 1.0 => return r,
                ('*', _, Expr::Number(u)) if *u == 1.0 => return l,
                ('*', Expr::Number(z), _) | ('*', _, Expr::Number(z)) if *z == 0.0 => {
                    return Expr::Number(0.0)
                }
                ('/', _, Expr::Number(u)) if *u == 1.0 => return l,
                ('^', _, Expr::Number(u)) if *u == 1.0 => return l,
                _ => {}
            }
            Expr::Binary(Box::new(l), *op, Box::new(r))
        }
        Expr::Unary(op, e) => {
            let e = fold(e);
            if let (Expr::Number(n), '-') = (&e, *op) {
                return Expr::Number(-n);
            }
            Expr::Unary(*op, Box::new(e))
        }
        Expr::Call(func, a) => {
            let a = fold(a);
            if let Expr::Number(n) = a {
                return Expr::Number(apply_function(func, n));
            }
            Expr::Call(func.clone(), Box::new(a))
        }
    }
}

fn apply_binary(a: f64, op: char, b: f64) -> f64 {
    match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => a / b,
        '^' => a.powf(b),
        _ => f64::NAN,
    }
}

fn apply_function(func: &str, a: f64) -> f64 {
    match func {
        "sin" => a.sin(),
        "cos" => a.cos(),
        "tan" => a.tan(),
        "exp" => a.exp(),
        "ln" | "log" => a.ln(),
        "sqrt" => a.sqrt(),
        "sinh" => a.sinh(),
        "cosh" => a.cosh(),
        "tanh" => a.tanh(),
        _ => f64::NAN,
    }
}

// --- Polynomial collection ---

// Degree cap keeps convolution bounded on adversarial input; anything past
// quadratic is unsolvable here regardless.
const MAX_DEGREE: usize = 8;

/// Collects `expr` as a polynomial in `var`, returning coefficients in
/// ascending degree order. Coefficients are expressions free of `var`.
fn polynomial_in(expr: &Expr, var: &str) -> Option<Vec<Expr>> {
    if !expr.contains(var) {
        return Some(vec![expr.clone()]);
    }
    match expr {
        Expr::Variable(name) if name == var => {
            Some(vec![Expr::Number(0.0), Expr::Number(1.0)])
        }
        Expr::Binary(l, op, r) => match op {
            '+' => Some(poly_combine(
                polynomial_in(l, var)?,
                polynomial_in(r, var)?,
                false,
            )),
            '-' => Some(poly_combine(
                polynomial_in(l, var)?,
                polynomial_in(r, var)?,
                true,
            )),
            '*' => poly_mul(&polynomial_in(l, var)?, &polynomial_in(r, var)?),
            '/' => {
                if r.contains(var) {
                    return None;
                }
                let divisor = (**r).clone();
                Some(
                    polynomial_in(l, var)?
                        .into_iter()
                        .map(|c| fold(&(c / divisor.clone())))
                        .collect(),
                )
            }
            '^' => {
                let n = match &**r {
                    Expr::Number(n) => *n,
                    _ => return None,
                };
                if n < 0.0 || n.fract() != 0.0 || n > MAX_DEGREE as f64 {
                    return None;
                }
                let base = polynomial_in(l, var)?;
                let mut acc = vec![Expr::Number(1.0)];
                for _ in 0..(n as usize) {
                    acc = poly_mul(&acc, &base)?;
                }
                Some(acc)
            }
            _ => None,
        },
        Expr::Unary('-', e) => Some(
            polynomial_in(e, var)?
                .into_iter()
                .map(|c| fold(&-c))
                .collect(),
        ),
        // The variable sits under a function call or an unknown operator.
        _ => None,
    }
}

fn poly_combine(a: Vec<Expr>, b: Vec<Expr>, subtract: bool) -> Vec<Expr> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let ca = a.get(i).cloned().unwrap_or(Expr::Number(0.0));
        let cb = b.get(i).cloned().unwrap_or(Expr::Number(0.0));
        out.push(fold(&if subtract { ca - cb } else { ca + cb }));
    }
    out
}

fn poly_mul(a: &[Expr], b: &[Expr]) -> Option<Vec<Expr>> {
    if a.len() + b.len() > MAX_DEGREE + 2 {
        return None;
    }
    let mut out = vec![Expr::Number(0.0); a.len() + b.len() - 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let term = fold(&(ca.clone() * cb.clone()));
            out[i + j] = fold(&(out[i + j].clone() + term));
        }
    }
    Some(out)
}

fn polynomial_roots(mut coeffs: Vec<Expr>) -> Result<Vec<Expr>> {
    while coeffs.len() > 1
        && matches!(coeffs.last(), Some(Expr::Number(n)) if *n == 0.0)
    {
        coeffs.pop();
    }
    match coeffs.len() {
        1 => match &coeffs[0] {
            Expr::Number(n) if *n == 0.0 => bail!("equation is identically zero"),
            _ => Ok(Vec::new()),
        },
        2 => {
            let c1 = coeffs.pop().expect("degree-1 coefficient");
            let c0 = coeffs.pop().expect("degree-0 coefficient");
            Ok(vec![fold(&(-c0 / c1))])
        }
        3 => {
            let c2 = coeffs.pop().expect("degree-2 coefficient");
            let c1 = coeffs.pop().expect("degree-1 coefficient");
            let c0 = coeffs.pop().expect("degree-0 coefficient");
            let disc = fold(
                &(c1.clone() * c1.clone() - Expr::number(4.0) * c2.clone() * c0),
            );
            let sq = Expr::call("sqrt", disc);
            let two_a = fold(&(Expr::number(2.0) * c2));
            let plus = fold(&((-c1.clone() + sq.clone()) / two_a.clone()));
            let minus = fold(&((-c1 - sq) / two_a));
            Ok(vec![plus, minus])
        }
        n => bail!("degree-{} polynomial has no closed form here", n - 1),
    }
}

// --- Single-occurrence isolation ---

/// Inverts the operation chain between the root of `expr` and the single
/// occurrence of `var`, accumulating the inverse onto `rhs`.
fn isolate(expr: &Expr, var: &str, rhs: Expr) -> Result<Vec<Expr>> {
    match expr {
        Expr::Variable(name) if name == var => Ok(vec![fold(&rhs)]),
        Expr::Binary(l, op, r) => {
            let var_left = l.contains(var);
            match op {
                '+' => {
                    if var_left {
                        isolate(l, var, rhs - (**r).clone())
                    } else {
                        isolate(r, var, rhs - (**l).clone())
                    }
                }
                '-' => {
                    if var_left {
                        isolate(l, var, rhs + (**r).clone())
                    } else {
                        isolate(r, var, (**l).clone() - rhs)
                    }
                }
                '*' => {
                    if var_left {
                        isolate(l, var, rhs / (**r).clone())
                    } else {
                        isolate(r, var, rhs / (**l).clone())
                    }
                }
                '/' => {
                    if var_left {
                        isolate(l, var, rhs * (**r).clone())
                    } else {
                        isolate(r, var, (**l).clone() / rhs)
                    }
                }
                '^' => {
                    if var_left {
                        match &**r {
                            Expr::Number(n) if *n == 2.0 => {
                                let sq = Expr::call("sqrt", rhs);
                                let mut roots = isolate(l, var, sq.clone())?;
                                roots.extend(isolate(l, var, -sq)?);
                                Ok(roots)
                            }
                            Expr::Number(n) if *n == 0.5 => {
                                isolate(l, var, rhs.clone() * rhs)
                            }
                            _ => bail!("cannot invert exponent"),
                        }
                    } else {
                        // a ^ g = rhs  =>  g = ln(rhs) / ln(a)
                        isolate(
                            r,
                            var,
                            Expr::call("ln", rhs) / Expr::call("ln", (**l).clone()),
                        )
                    }
                }
                _ => bail!("unknown operator `{op}`"),
            }
        }
        Expr::Unary('-', e) => isolate(e, var, -rhs),
        Expr::Call(func, a) => match func.as_str() {
            "exp" => isolate(a, var, Expr::call("ln", rhs)),
            "ln" | "log" => isolate(a, var, Expr::call("exp", rhs)),
            "sqrt" => isolate(a, var, rhs.clone() * rhs),
            "tanh" => {
                // atanh(r) = ln((1 + r) / (1 - r)) / 2
                let one = Expr::number(1.0);
                let ratio = (one.clone() + rhs.clone()) / (one - rhs);
                isolate(a, var, Expr::call("ln", ratio) / Expr::number(2.0))
            }
            _ => bail!("cannot invert function `{func}`"),
        },
        _ => bail!("cannot isolate through this node"),
    }
}
