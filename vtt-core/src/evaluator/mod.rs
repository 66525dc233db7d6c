//! Macro body evaluation.
//!
//! The interpreter only needs something implementing [`ExpressionEvaluator`].
//! [`LineEvaluator`] is the stock one: a body is literal text with inline
//! segments, each holding an expression and optional output flags.
//!
//! ```text
//! Hello [r: getName()], you have {hp} hit points.[h: x = 2d6]
//! [e: 1 + 2]                     -> 1 + 2 = 3
//! [macro("greet@Lib:Util"): "Bob"]
//! ```

mod eval;
mod lexer;
mod parser;

pub use parser::{parse, Expr};

use crate::error::{Flow, MacroError};
use crate::frame::Frame;
use crate::value::Value;

/// Runs a macro body inside a frame, emitting output as it goes.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, body: &str, frame: &mut Frame<'_>) -> Flow<()>;
}

/// Evaluates a single expression string and returns its value.
pub fn evaluate_expression(source: &str, frame: &mut Frame<'_>) -> Flow<Value> {
    let mut value = Value::empty();
    for statement in parse(source)? {
        value = eval::eval(&statement, frame)?;
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputMode {
    Hidden,
    Result,
    Expanded,
    #[default]
    Tooltip,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Options {
    output: OutputMode,
    macro_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Inline { options: Options, expression: &'a str },
}

/// Evaluator for `[options: expression]` and `{expression}` segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineEvaluator;

impl LineEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn run_segment(&self, options: &Options, expression: &str, frame: &mut Frame<'_>) -> Flow<()> {
        let value = evaluate_expression(expression, frame)?;

        let shown = match &options.macro_name {
            Some(name) => frame.run_macro(name, &value.to_string())?,
            None => value.to_string(),
        };

        match options.output {
            OutputMode::Hidden => {}
            OutputMode::Result | OutputMode::Tooltip => frame.emit(&shown),
            OutputMode::Expanded => frame.emit(&format!("{} = {shown}", expression.trim())),
        }
        Ok(())
    }
}

impl ExpressionEvaluator for LineEvaluator {
    fn evaluate(&self, body: &str, frame: &mut Frame<'_>) -> Flow<()> {
        for segment in split_segments(body)? {
            match segment {
                Segment::Text(text) => frame.emit(text),
                Segment::Inline {
                    options,
                    expression,
                } => self.run_segment(&options, expression, frame)?,
            }
        }
        Ok(())
    }
}

fn split_segments(body: &str) -> Result<Vec<Segment<'_>>, MacroError> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    let bytes = body.as_bytes();

    while pos < bytes.len() {
        let close = match bytes[pos] {
            b'[' => b']',
            b'{' => b'}',
            _ => {
                pos += 1;
                continue;
            }
        };

        if literal_start < pos {
            segments.push(Segment::Text(&body[literal_start..pos]));
        }
        let end = find_close(body, pos, bytes[pos], close).ok_or_else(|| {
            MacroError::Evaluation(format!("Unclosed '{}' in macro body", bytes[pos] as char))
        })?;
        let inner = &body[pos + 1..end];

        let segment = if close == b']' {
            match split_options(inner) {
                Some((options, expression)) => Segment::Inline {
                    options,
                    expression,
                },
                None => Segment::Inline {
                    options: Options::default(),
                    expression: inner,
                },
            }
        } else {
            Segment::Inline {
                options: Options::default(),
                expression: inner,
            }
        };
        segments.push(segment);

        pos = end + 1;
        literal_start = pos;
    }

    if literal_start < body.len() {
        segments.push(Segment::Text(&body[literal_start..]));
    }
    Ok(segments)
}

/// Index of the bracket closing the one at `open_at`, skipping quoted text.
fn find_close(body: &str, open_at: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut pos = open_at;

    while pos < bytes.len() {
        let b = bytes[pos];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    pos += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == open => depth += 1,
            None if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            None => {}
        }
        pos += 1;
    }
    None
}

/// Splits `opts: expression` when everything before the first top-level
/// colon is a recognised option list.
fn split_options(inner: &str) -> Option<(Options, &str)> {
    let colon = top_level_position(inner, b':')?;
    let (head, expression) = (&inner[..colon], &inner[colon + 1..]);

    let mut options = Options::default();
    for option in split_top_level(head, b',') {
        let option = option.trim();
        match option.to_lowercase().as_str() {
            "h" => options.output = OutputMode::Hidden,
            "r" => options.output = OutputMode::Result,
            "e" => options.output = OutputMode::Expanded,
            "t" => options.output = OutputMode::Tooltip,
            lower if lower.starts_with("macro(") && lower.ends_with(')') => {
                let argument = option["macro(".len()..option.len() - 1].trim();
                let name = argument
                    .strip_prefix('"')
                    .and_then(|a| a.strip_suffix('"'))
                    .or_else(|| argument.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')))?;
                options.macro_name = Some(name.to_string());
            }
            _ => return None,
        }
    }
    Some((options, expression))
}

fn top_level_position(text: &str, target: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let b = bytes[pos];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    pos += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if b == target && depth == 0 => return Some(pos),
                _ => {}
            },
        }
        pos += 1;
    }
    None
}

fn split_top_level(text: &str, separator: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = top_level_position(rest, separator) {
        parts.push(&rest[..at]);
        rest = &rest[at + 1..];
    }
    parts.push(rest);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        let segments = split_segments("Hi [r: 1 + 1] and {x}!").unwrap();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("Hi "));
        assert_eq!(
            segments[1],
            Segment::Inline {
                options: Options {
                    output: OutputMode::Result,
                    macro_name: None
                },
                expression: " 1 + 1"
            }
        );
        assert_eq!(segments[4], Segment::Text("!"));
    }

    #[test]
    fn test_brackets_inside_strings() {
        let segments = split_segments(r#"[h: x = "[1, 2]"]"#).unwrap();
        assert_eq!(segments.len(), 1);
        match &segments[0] {
            Segment::Inline { options, expression } => {
                assert_eq!(options.output, OutputMode::Hidden);
                assert_eq!(*expression, r#" x = "[1, 2]""#);
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn test_colon_in_string_is_not_options() {
        let segments = split_segments(r#"[json.get(o, "a:b")]"#).unwrap();
        assert_eq!(
            segments[0],
            Segment::Inline {
                options: Options::default(),
                expression: r#"json.get(o, "a:b")"#
            }
        );
    }

    #[test]
    fn test_macro_option() {
        let (options, expression) = split_options(r#"h, macro("greet@Lib:Util"): 5"#).unwrap();
        assert_eq!(options.output, OutputMode::Hidden);
        assert_eq!(options.macro_name.as_deref(), Some("greet@Lib:Util"));
        assert_eq!(expression, " 5");
    }

    #[test]
    fn test_unclosed_segment() {
        assert!(split_segments("oops [r: 1").is_err());
    }
}
