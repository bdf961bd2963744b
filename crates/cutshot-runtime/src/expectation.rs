//! Expectation reducer.
//!
//! A Pauli string observable is diagonal in its own measurement basis, so
//! its eigenvalue for computational state `s` is the product of per-qubit
//! eigenvalues: `+1` for `I`, and `(-1)^bit` for `X`, `Y`, `Z`. Bitstrings
//! are big-endian: the first character is qubit 0, the first observable
//! character. The counting step has already normalized adapter bit order.

use cutshot_core::{Distribution, Error, Fragment, Observable, ProbabilityTable, Result};
use ndarray::{array, Array1};

use crate::types::ExpectationValues;

/// Above this width the eigenvalue table is not materialized.
const MAX_TABLE_QUBITS: usize = 16;

/// Eigenvalue of every computational basis state, indexed by the state's
/// big-endian integer value. Length `2^n`.
pub fn eigenvalues(observable: &Observable) -> Array1<f64> {
    let identity = array![1.0, 1.0];
    let pauli = array![1.0, -1.0];
    observable.paulis().fold(array![1.0], |acc, p| {
        let factor = if p.is_identity() { &identity } else { &pauli };
        kron(&acc, factor)
    })
}

fn kron(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    Array1::from_iter(a.iter().flat_map(|x| b.iter().map(move |y| x * y)))
}

fn state_index(state: &str, width: usize) -> Result<usize> {
    if state.len() != width {
        return Err(Error::InvalidBitstring(format!(
            "'{}' has {} bits, observable has {}",
            state,
            state.len(),
            width
        )));
    }
    state.chars().try_fold(0usize, |acc, c| match c {
        '0' => Ok(acc << 1),
        '1' => Ok((acc << 1) | 1),
        _ => Err(Error::InvalidBitstring(state.to_string())),
    })
}

/// Parity form of the eigenvalue, for observables too wide for a table.
fn parity_eigenvalue(state: &str, observable: &Observable) -> Result<f64> {
    if state.len() != observable.num_qubits() {
        return Err(Error::InvalidBitstring(format!(
            "'{}' has {} bits, observable has {}",
            state,
            state.len(),
            observable.num_qubits()
        )));
    }
    let mut sign = 1.0;
    for (c, p) in state.chars().zip(observable.paulis()) {
        match c {
            '0' => {}
            '1' if !p.is_identity() => sign = -sign,
            '1' => {}
            _ => return Err(Error::InvalidBitstring(state.to_string())),
        }
    }
    Ok(sign)
}

/// `Σ p(s) · λ(s)` over a probability distribution.
pub fn reduce(probabilities: &Distribution, observable: &Observable) -> Result<f64> {
    let n = observable.num_qubits();
    if n > MAX_TABLE_QUBITS {
        return probabilities
            .iter()
            .map(|(state, p)| parity_eigenvalue(state, observable).map(|ev| p * ev))
            .sum();
    }
    let table = eigenvalues(observable);
    probabilities
        .iter()
        .map(|(state, p)| state_index(state, n).map(|i| p * table[i]))
        .sum()
}

/// Expectation value of every fragment from the merged probability table.
///
/// A fragment with no probability entry is an aggregation fault: it means
/// the fragment was never executed.
pub fn expectation_values(
    probabilities: &ProbabilityTable,
    fragments: &[Fragment],
) -> Result<ExpectationValues> {
    let mut values = ExpectationValues::new();
    for fragment in fragments {
        let key = fragment.key();
        let dist = probabilities.get(&key).ok_or_else(|| {
            Error::Aggregation(format!("no probabilities for fragment {}", key))
        })?;
        let value = reduce(dist, fragment.observable())?;
        values.insert(key, value);
    }
    Ok(values)
}
