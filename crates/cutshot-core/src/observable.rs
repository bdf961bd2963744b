//! Pauli-string observables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Single-qubit Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(Self::I),
            'X' => Some(Self::X),
            'Y' => Some(Self::Y),
            'Z' => Some(Self::Z),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::I => 'I',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Whether this factor contributes a sign to the eigenvalue.
    ///
    /// Fragments are measured in the eigenbasis of their observable, so
    /// X, Y and Z all have eigenvalues (+1, -1) on the measured bit.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::I)
    }
}

/// Tensor-product observable, one Pauli per qubit in string order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Observable(String);

impl Observable {
    /// Parse a Pauli string such as `"ZIZ"`.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidObservable("empty observable".into()));
        }
        if let Some((pos, c)) = s.char_indices().find(|(_, c)| Pauli::from_char(*c).is_none()) {
            return Err(Error::InvalidObservable(format!(
                "invalid Pauli '{}' at position {} in {:?}",
                c, pos, s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of qubits the observable acts on.
    pub fn num_qubits(&self) -> usize {
        self.0.len()
    }

    pub fn paulis(&self) -> impl Iterator<Item = Pauli> + '_ {
        // Validated on construction.
        self.0.chars().filter_map(Pauli::from_char)
    }
}

impl std::fmt::Display for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Observable {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Observable> for String {
    fn from(value: Observable) -> Self {
        value.0
    }
}

impl std::str::FromStr for Observable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let obs = Observable::parse("ZIXY").unwrap();
        assert_eq!(obs.num_qubits(), 4);
        let paulis: Vec<Pauli> = obs.paulis().collect();
        assert_eq!(paulis, vec![Pauli::Z, Pauli::I, Pauli::X, Pauli::Y]);
    }

    #[test]
    fn test_parse_rejects_bad_chars() {
        assert!(Observable::parse("ZQ").is_err());
        assert!(Observable::parse("zz").is_err());
        assert!(Observable::parse("").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let obs = Observable::parse("ZZ").unwrap();
        let json = serde_json::to_string(&obs).unwrap();
        assert_eq!(json, "\"ZZ\"");
        let back: Observable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
        assert!(serde_json::from_str::<Observable>("\"AB\"").is_err());
    }
}
