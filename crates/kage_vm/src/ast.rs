//! Syntax tree for Kage source.
//!
//! A `Program` owns its top-level statements in source order; each
//! `Encrypt`/`Decrypt` node owns exactly one operand. Nodes carry the byte
//! offset where they start in the source.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Str { offset: usize, value: String },
    Encrypt { offset: usize, operand: Box<Expr> },
    Decrypt { offset: usize, operand: Box<Expr> },
}

impl Expr {
    pub fn string(offset: usize, value: impl Into<String>) -> Self {
        Expr::Str { offset, value: value.into() }
    }

    pub fn encrypt(offset: usize, operand: Expr) -> Self {
        Expr::Encrypt { offset, operand: Box::new(operand) }
    }

    pub fn decrypt(offset: usize, operand: Expr) -> Self {
        Expr::Decrypt { offset, operand: Box::new(operand) }
    }

    pub fn offset(&self) -> usize {
        match self {
            Expr::Str { offset, .. } | Expr::Encrypt { offset, .. } | Expr::Decrypt { offset, .. } => *offset,
        }
    }

    pub fn operand(&self) -> Option<&Expr> {
        match self {
            Expr::Str { .. } => None,
            Expr::Encrypt { operand, .. } | Expr::Decrypt { operand, .. } => Some(operand),
        }
    }

    /// Number of keyword layers above the literal.
    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cur = self;
        while let Some(inner) = cur.operand() {
            n += 1;
            cur = inner;
        }
        n
    }
}

impl Program {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Renders back to source form. Literals cannot contain `"`, so the output
/// always reparses to the same tree shape.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cur = self;
        loop {
            match cur {
                Expr::Str { value, .. } => return write!(f, "\"{value}\""),
                Expr::Encrypt { operand, .. } => {
                    f.write_str("encrypt ")?;
                    cur = operand;
                }
                Expr::Decrypt { operand, .. } => {
                    f.write_str("decrypt ")?;
                    cur = operand;
                }
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_keyword_layers() {
        let e = Expr::encrypt(0, Expr::decrypt(8, Expr::string(16, "x")));
        assert_eq!(e.depth(), 2);
        assert_eq!(Expr::string(0, "").depth(), 0);
    }

    #[test]
    fn display_renders_source() {
        let p = Program {
            statements: vec![
                Expr::encrypt(0, Expr::string(8, "First")),
                Expr::decrypt(16, Expr::encrypt(24, Expr::string(32, ""))),
            ],
        };
        assert_eq!(p.to_string(), "encrypt \"First\"\ndecrypt encrypt \"\"");
    }

    #[test]
    fn json_tags_nodes() {
        let e = Expr::encrypt(0, Expr::string(8, "s"));
        let j = serde_json::to_value(&e).unwrap();
        assert_eq!(j["node"], "encrypt");
        assert_eq!(j["operand"]["node"], "str");
        assert_eq!(j["operand"]["value"], "s");
        let back: Expr = serde_json::from_value(j).unwrap();
        assert_eq!(back, e);
    }
}
