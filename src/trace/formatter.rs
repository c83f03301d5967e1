use crate::ast::{ExpressionTrace, TraceToken, Value};

/// Formats expression traces into human-readable strings.
pub struct TraceFormatter;

impl TraceFormatter {
    /// Renders a trace such as `( row.item.price (was 12) + 3 ) * 2`.
    ///
    /// Variables show the value they resolved to, or `unset_display` when they
    /// had none. Text literals are quoted so they can be told apart from numbers.
    pub fn format_trace(trace: &ExpressionTrace, unset_display: &str) -> String {
        let mut result = String::new();
        for token in &trace.tokens {
            if !result.is_empty() {
                result.push(' ');
            }
            match token {
                TraceToken::Variable { path, value } => {
                    let shown = value
                        .as_ref()
                        .map(Self::format_value)
                        .unwrap_or_else(|| unset_display.to_string());
                    result.push_str(&format!("{} (was {})", path, shown));
                }
                TraceToken::Literal(value) => result.push_str(&Self::format_value(value)),
                TraceToken::Operator(op) => result.push_str(op.symbol()),
                TraceToken::Open => result.push('('),
                TraceToken::Close => result.push(')'),
            }
        }
        result
    }

    /// Format a value for display.
    fn format_value(value: &Value) -> String {
        match value {
            Value::Text(s) => format!("\"{}\"", s),
            Value::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(Self::format_value)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            other => other.to_string(),
        }
    }
}
