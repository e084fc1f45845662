//! Human-readable breakdown of how a document was scored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Explanation of how a score was calculated.
///
/// A tree: each node carries the value it contributes and the details it was
/// computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Score value.
    pub value: f32,

    /// Description of how the value was calculated.
    pub description: String,

    /// Whether the document matched at this node.
    pub matched: bool,

    /// Sub-explanations.
    pub details: Vec<Explanation>,
}

impl Explanation {
    /// A matching node with the given value.
    pub fn new<S: Into<String>>(value: f32, description: S) -> Self {
        Explanation {
            value,
            description: description.into(),
            matched: true,
            details: Vec::new(),
        }
    }

    /// A non-matching node. Its value is always 0.
    pub fn no_match<S: Into<String>>(description: S) -> Self {
        Explanation {
            value: 0.0,
            description: description.into(),
            matched: false,
            details: Vec::new(),
        }
    }

    /// Append a sub-explanation.
    pub fn add_detail(&mut self, detail: Explanation) {
        self.details.push(detail);
    }

    /// Append a sub-explanation, builder style.
    pub fn with_detail(mut self, detail: Explanation) -> Self {
        self.details.push(detail);
        self
    }

    /// Whether the document matched.
    pub fn is_match(&self) -> bool {
        self.matched
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} = {}",
            "",
            self.value,
            self.description,
            indent = depth * 2
        )?;
        for detail in &self.details {
            detail.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_indents_details() {
        let explanation = Explanation::new(3.0, "sum of:")
            .with_detail(Explanation::new(1.0, "a"))
            .with_detail(Explanation::new(2.0, "b").with_detail(Explanation::new(2.0, "c")));

        assert_eq!(
            explanation.to_string(),
            "3 = sum of:\n  1 = a\n  2 = b\n    2 = c\n"
        );
    }

    #[test]
    fn test_no_match_has_zero_value() {
        let explanation = Explanation::no_match("missing");
        assert!(!explanation.is_match());
        assert_eq!(explanation.value, 0.0);
        assert!(explanation.details.is_empty());
    }

    #[test]
    fn test_serializes_as_json() {
        let explanation = Explanation::new(0.5, "leaf");
        let json = serde_json::to_string(&explanation).unwrap();
        let parsed: Explanation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, explanation);
    }
}
