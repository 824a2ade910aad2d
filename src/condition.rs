//! MSBuild condition parser and evaluator.
//!
//! Only the flat comparison form found on `<PropertyGroup>` guards is
//! understood, for example:
//!
//! - `'$(Configuration)|$(Platform)' == 'Debug|AnyCPU'`
//! - `'$(Configuration)' != ''`
//!
//! Uses [`chumsky`] for the parsing grammar.
//!
//! ## Grammar
//!
//! ```text
//! condition  = quoted ('==' | '!=') quoted
//! quoted     = "'" chars "'"
//! ```
//!
//! Anything else (`and`/`or`, `Exists(...)`, bare words) fails to parse, and a
//! condition that fails to parse evaluates to `false`.

use chumsky::prelude::*;
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════════
//  AST
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed `'lhs' op 'rhs'` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: Vec<ExprValue>,
    pub op: CompareOp,
    pub rhs: Vec<ExprValue>,
}

/// Comparison operator used inside a [`Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
}

/// A fragment of a string value that may contain `$(Variable)` references.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    /// Literal text (no variable expansion needed).
    Literal(String),
    /// A `$(VarName)` reference that will be expanded during evaluation.
    Variable(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  String-part splitting
// ═══════════════════════════════════════════════════════════════════════════════

/// Split the raw text between single quotes into [`ExprValue`] fragments.
fn parse_string_parts(s: &str) -> Vec<ExprValue> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'(') {
            if !literal.is_empty() {
                parts.push(ExprValue::Literal(std::mem::take(&mut literal)));
            }
            chars.next(); // consume '('
            let var_name: String = chars.by_ref().take_while(|&ch| ch != ')').collect();
            parts.push(ExprValue::Variable(var_name));
        } else {
            literal.push(c);
        }
    }

    if !literal.is_empty() {
        parts.push(ExprValue::Literal(literal));
    }

    parts
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Chumsky parser
// ═══════════════════════════════════════════════════════════════════════════════

fn condition_parser<'a>() -> impl Parser<'a, &'a str, Comparison, extra::Err<Simple<'a, char>>> {
    // ── Single-quoted string value ───────────────────────────────────────
    let quoted = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(parse_string_parts);

    // ── Comparison operators ─────────────────────────────────────────────
    let cmp_op = just("==")
        .to(CompareOp::Equal)
        .or(just("!=").to(CompareOp::NotEqual));

    // ── Comparison:  'lhs' op 'rhs' ─────────────────────────────────────
    quoted
        .clone()
        .padded()
        .then(cmp_op.padded())
        .then(quoted.padded())
        .then_ignore(end())
        .map(|((lhs, op), rhs)| Comparison { lhs, op, rhs })
}

/// Parse a condition attribute string into a [`Comparison`].
pub fn parse_condition(input: &str) -> Result<Comparison, String> {
    condition_parser()
        .parse(input)
        .into_result()
        .map_err(|errs| {
            let messages: Vec<String> = errs.iter().map(|e| format!("{e}")).collect();
            format!(
                "Failed to parse condition '{}': {}",
                input,
                messages.join("; ")
            )
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

/// Expand `$(Var)` references. Unknown variables are left as written.
fn expand_string(parts: &[ExprValue], vars: &HashMap<String, String>) -> String {
    parts
        .iter()
        .map(|part| match part {
            ExprValue::Literal(s) => s.clone(),
            ExprValue::Variable(name) => vars
                .get(name.as_str())
                .cloned()
                .unwrap_or_else(|| format!("$({name})")),
        })
        .collect()
}

/// Evaluate a parsed comparison against a set of variable bindings.
pub fn evaluate(expr: &Comparison, vars: &HashMap<String, String>) -> bool {
    let l = expand_string(&expr.lhs, vars);
    let r = expand_string(&expr.rhs, vars);
    match expr.op {
        CompareOp::Equal => l == r,
        CompareOp::NotEqual => l != r,
    }
}

/// Evaluate an optional `Condition` attribute. No condition holds; one that
/// does not parse does not.
pub fn holds(condition: Option<&str>, vars: &HashMap<String, String>) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    match parse_condition(condition) {
        Ok(expr) => evaluate(&expr, vars),
        Err(message) => {
            tracing::debug!("{message}");
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // ── String-part splitting ────────────────────────────────────────────

    #[test]
    fn string_parts_literal_only() {
        assert_eq!(
            parse_string_parts("hello"),
            vec![ExprValue::Literal("hello".into())]
        );
    }

    #[test]
    fn string_parts_mixed() {
        assert_eq!(
            parse_string_parts("$(Configuration)|$(Platform)"),
            vec![
                ExprValue::Variable("Configuration".into()),
                ExprValue::Literal("|".into()),
                ExprValue::Variable("Platform".into()),
            ]
        );
    }

    #[test]
    fn string_parts_empty() {
        assert_eq!(parse_string_parts(""), Vec::<ExprValue>::new());
    }

    // ── Condition parsing ────────────────────────────────────────────────

    #[test]
    fn parse_configuration_platform_guard() {
        let expr = parse_condition(" '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ").unwrap();
        assert_eq!(expr.op, CompareOp::Equal);
        assert_eq!(expr.rhs, vec![ExprValue::Literal("Debug|AnyCPU".into())]);
    }

    #[test]
    fn parse_inequality_with_empty_rhs() {
        let expr = parse_condition("'$(Configuration)'!=''").unwrap();
        assert_eq!(
            expr,
            Comparison {
                lhs: vec![ExprValue::Variable("Configuration".into())],
                op: CompareOp::NotEqual,
                rhs: vec![],
            }
        );
    }

    #[test]
    fn combinators_are_rejected() {
        assert!(parse_condition("'a'=='a' and 'b'=='b'").is_err());
        assert!(parse_condition("Exists('foo.props')").is_err());
        assert!(parse_condition("'a' = 'a'").is_err());
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    fn make_vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn eval_guard_matches_bindings() {
        let vars = make_vars(&[("Configuration", "Debug"), ("Platform", "AnyCPU")]);
        assert!(holds(Some("'$(Configuration)|$(Platform)' == 'Debug|AnyCPU'"), &vars));
        assert!(!holds(Some("'$(Configuration)|$(Platform)' == 'Release|AnyCPU'"), &vars));
    }

    #[test]
    fn eval_unresolved_variable_stays_literal() {
        let vars = HashMap::new();
        assert!(holds(Some("'$(Missing)' == '$(Missing)'"), &vars));
        assert!(holds(Some("'$(Missing)' != ''"), &vars));
    }

    #[test]
    fn eval_absent_condition_is_true() {
        assert!(holds(None, &HashMap::new()));
    }

    #[test]
    fn eval_malformed_condition_is_false() {
        let vars = make_vars(&[("Configuration", "Debug")]);
        assert!(!holds(Some("'$(Configuration)' == 'Debug"), &vars));
        assert!(!holds(Some("'$(Configuration)'=='Debug' or 'a'=='a'"), &vars));
        assert!(!holds(Some(""), &vars));
    }
}
