//! Line-oriented OpenQASM introspection.
//!
//! Extracts the handful of statistics allocation policies use as features
//! (qubit count, gate counts by arity, depth). This is a heuristic reader
//! for OpenQASM 2 and simple OpenQASM 3 programs, not a parser: custom gate
//! bodies are skipped and classical control is ignored.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::fragment::{CircuitIntrospector, FragmentStats};

static GATE_DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\b(gate|opaque)\s+[^{;]*(\{[^}]*\}|;)").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").unwrap());
static QREG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^qreg\s+(\w+)\s*\[\s*(\d+)\s*\]$").unwrap());
static QUBIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^qubit\s*(?:\[\s*(\d+)\s*\])?\s+(\w+)$").unwrap());
static IF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^if\s*\([^)]*\)\s*(.+)$").unwrap());
static MEASURE_ARROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^measure\s+(.+?)\s*->\s*.+$").unwrap());
static MEASURE_ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^=]+=\s*measure\s+(.+)$").unwrap());
static APPLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*(?:\([^)]*\))?\s+(.+)$").unwrap());
static OPERAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*(?:\[\s*(\d+)\s*\])?$").unwrap());

const SKIPPED: &[&str] = &["OPENQASM", "include", "creg", "bit", "barrier", "input", "output"];

/// Introspector for OpenQASM circuit text.
#[derive(Debug, Clone, Copy, Default)]
pub struct QasmIntrospector;

impl QasmIntrospector {
    pub fn new() -> Self {
        Self
    }
}

impl CircuitIntrospector for QasmIntrospector {
    fn describe(&self, circuit: &str) -> Result<FragmentStats> {
        let mut walker = Walker::default();
        let source = COMMENT_RE.replace_all(circuit, "");
        let source = GATE_DEF_RE.replace_all(&source, "");
        for statement in source.split(';') {
            let statement = statement.split_whitespace().collect::<Vec<_>>().join(" ");
            if !statement.is_empty() {
                walker.statement(&statement)?;
            }
        }
        Ok(walker.finish())
    }
}

#[derive(Default)]
struct Walker {
    /// Register name → (offset, size).
    registers: HashMap<String, (usize, usize)>,
    levels: Vec<u64>,
    stats: FragmentStats,
}

impl Walker {
    fn statement(&mut self, stmt: &str) -> Result<()> {
        if SKIPPED.iter().any(|kw| stmt.starts_with(kw)) {
            return Ok(());
        }
        if let Some(caps) = IF_RE.captures(stmt) {
            return self.statement(&caps[1]);
        }
        if let Some(caps) = QREG_RE.captures(stmt) {
            return self.declare(&caps[1], parse_usize(&caps[2])?);
        }
        if let Some(caps) = QUBIT_RE.captures(stmt) {
            let size = match caps.get(1) {
                Some(m) => parse_usize(m.as_str())?,
                None => 1,
            };
            return self.declare(&caps[2], size);
        }
        if let Some(caps) = MEASURE_ARROW_RE
            .captures(stmt)
            .or_else(|| MEASURE_ASSIGN_RE.captures(stmt))
        {
            let operands = caps[1].to_string();
            return self.apply("measure", &operands);
        }
        if let Some(caps) = APPLY_RE.captures(stmt) {
            let name = caps[1].to_string();
            let operands = caps[2].to_string();
            return self.apply(&name, &operands);
        }
        Err(Error::InvalidInput(format!("unrecognized QASM statement: {}", stmt)))
    }

    fn declare(&mut self, name: &str, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidInput(format!(
                "quantum register '{}' has no qubits",
                name
            )));
        }
        let offset = self.levels.len();
        self.registers.insert(name.to_string(), (offset, size));
        self.levels.resize(offset + size, 0);
        Ok(())
    }

    /// Resolve operands to qubit indices; whole-register operands broadcast.
    fn apply(&mut self, name: &str, operands: &str) -> Result<()> {
        let mut resolved: Vec<Vec<usize>> = Vec::new();
        for operand in operands.split(',') {
            let operand = operand.trim();
            let caps = OPERAND_RE
                .captures(operand)
                .ok_or_else(|| Error::InvalidInput(format!("bad operand '{}'", operand)))?;
            let (offset, size) = *self
                .registers
                .get(&caps[1])
                .ok_or_else(|| Error::InvalidInput(format!("unknown register '{}'", &caps[1])))?;
            match caps.get(2) {
                Some(idx) => {
                    let idx = parse_usize(idx.as_str())?;
                    if idx >= size {
                        return Err(Error::InvalidInput(format!(
                            "index {} out of range for register '{}'",
                            idx, &caps[1]
                        )));
                    }
                    resolved.push(vec![offset + idx]);
                }
                None => resolved.push((offset..offset + size).collect()),
            }
        }

        let width = resolved.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..width {
            let qubits: Vec<usize> = resolved
                .iter()
                .map(|q| if q.len() == 1 { q[0] } else { q[i.min(q.len() - 1)] })
                .collect();
            self.record(name, &qubits);
        }
        Ok(())
    }

    fn record(&mut self, name: &str, qubits: &[usize]) {
        let level = qubits.iter().map(|q| self.levels[*q]).max().unwrap_or(0) + 1;
        for q in qubits {
            self.levels[*q] = level;
        }
        self.stats.num_gates += 1;
        match qubits.len() {
            1 => self.stats.num_1q_gates += 1,
            2 => self.stats.num_2q_gates += 1,
            _ => {}
        }
        if name == "measure" {
            self.stats.num_measurements += 1;
        }
        *self.stats.gates.entry(name.to_string()).or_insert(0) += 1;
    }

    fn finish(mut self) -> FragmentStats {
        self.stats.qubits = self.levels.len() as u64;
        self.stats.depth = self.levels.iter().copied().max().unwrap_or(0);
        self.stats
    }
}

fn parse_usize(s: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| Error::InvalidInput(format!("invalid integer '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = r#"OPENQASM 2.0;
include "qelib1.inc";
qreg q[2];
creg c[2];
// prepare
h q[0];
cx q[0],q[1];
measure q[0] -> c[0];
measure q[1] -> c[1];
"#;

    #[test]
    fn test_bell_stats() {
        let stats = QasmIntrospector::new().describe(BELL).unwrap();
        assert_eq!(stats.qubits, 2);
        assert_eq!(stats.num_2q_gates, 1);
        assert_eq!(stats.num_1q_gates, 3);
        assert_eq!(stats.num_measurements, 2);
        assert_eq!(stats.num_gates, 4);
        assert_eq!(stats.depth, 3);
        assert_eq!(stats.gates["measure"], 2);
        assert_eq!(stats.gates["cx"], 1);
    }

    #[test]
    fn test_broadcast_and_params() {
        let src = "qreg a[3]; qreg b[1]; h a; rz(0.5) b[0]; cx a[2], b[0]; barrier a;";
        let stats = QasmIntrospector::new().describe(src).unwrap();
        assert_eq!(stats.qubits, 4);
        assert_eq!(stats.gates["h"], 3);
        assert_eq!(stats.num_2q_gates, 1);
        assert_eq!(stats.depth, 2);
    }

    #[test]
    fn test_skips_gate_definitions() {
        let src = "OPENQASM 2.0; gate foo a, b { cx a, b; h a; } qreg q[2]; foo q[0], q[1];";
        let stats = QasmIntrospector::new().describe(src).unwrap();
        assert_eq!(stats.num_gates, 1);
        assert_eq!(stats.num_2q_gates, 1);
    }

    #[test]
    fn test_qasm3_declarations() {
        let src = "OPENQASM 3.0; qubit[2] q; bit[2] c; x q[1]; c[1] = measure q[1];";
        let stats = QasmIntrospector::new().describe(src).unwrap();
        assert_eq!(stats.qubits, 2);
        assert_eq!(stats.num_measurements, 1);
    }

    #[test]
    fn test_empty_register_rejected() {
        let err = QasmIntrospector::new().describe("qreg a[0]; qreg b[2]; cx a, b;");
        assert!(matches!(err, Err(Error::InvalidInput(_))));
        assert!(QasmIntrospector::new().describe("qubit[0] q;").is_err());
    }

    #[test]
    fn test_unknown_register() {
        let err = QasmIntrospector::new().describe("qreg q[1]; h r[0];");
        assert!(err.is_err());
    }
}
