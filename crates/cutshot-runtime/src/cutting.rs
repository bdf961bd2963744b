//! Circuit cutting collaborator.

use cutshot_core::{Error, Observable, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::ExpectationValues;

/// Output of [`CircuitCutter::cut`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutOutput {
    /// Each sub-circuit with the observables it must be measured against.
    pub fragments: Vec<(String, Vec<String>)>,
    /// Opaque data handed back to [`CircuitCutter::sew`].
    pub sew_data: Value,
    #[serde(default)]
    pub cut_info: Option<Value>,
}

/// Splits a circuit into fragments and recombines fragment expectation
/// values into the value of the original observable.
pub trait CircuitCutter: Send + Sync {
    fn name(&self) -> &str;

    fn cut(&self, circuit: &str, observable: &str) -> Result<CutOutput>;

    fn sew(&self, values: &ExpectationValues, sew_data: &Value) -> Result<f64>;
}

/// No cut: the whole circuit is a single fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCutter;

impl CircuitCutter for IdentityCutter {
    fn name(&self) -> &str {
        "identity"
    }

    fn cut(&self, circuit: &str, observable: &str) -> Result<CutOutput> {
        let observable = Observable::parse(observable)?;
        Ok(CutOutput {
            fragments: vec![(circuit.to_string(), vec![observable.to_string()])],
            sew_data: json!({ "circuit": circuit, "observable": observable.as_str() }),
            cut_info: None,
        })
    }

    fn sew(&self, values: &ExpectationValues, sew_data: &Value) -> Result<f64> {
        let circuit = sew_data["circuit"]
            .as_str()
            .ok_or_else(|| Error::Cut("sew data has no circuit".into()))?;
        let observable = sew_data["observable"]
            .as_str()
            .ok_or_else(|| Error::Cut("sew data has no observable".into()))?;
        values.for_circuit(circuit, observable).ok_or_else(|| {
            Error::Cut(format!("no expectation value for observable {}", observable))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutshot_core::{content_hash, FragmentKey};

    #[test]
    fn test_identity_roundtrip() {
        let cutter = IdentityCutter;
        let out = cutter.cut("OPENQASM 2.0;", "ZZ").unwrap();
        assert_eq!(out.fragments.len(), 1);
        assert_eq!(out.fragments[0].1, vec!["ZZ".to_string()]);

        let mut values = ExpectationValues::new();
        values.insert(
            FragmentKey::new(content_hash("OPENQASM 2.0;"), Observable::parse("ZZ").unwrap()),
            -0.5,
        );
        assert_eq!(cutter.sew(&values, &out.sew_data).unwrap(), -0.5);
    }

    #[test]
    fn test_identity_rejects_bad_observable() {
        assert!(IdentityCutter.cut("c", "ZQ").is_err());
    }

    #[test]
    fn test_sew_without_value() {
        let out = IdentityCutter.cut("c", "Z").unwrap();
        let err = IdentityCutter.sew(&ExpectationValues::new(), &out.sew_data);
        assert!(matches!(err, Err(Error::Cut(_))));
    }
}
