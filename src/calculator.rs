// src/calculator.rs

use std::fmt;
use thiserror::Error;

/// Characters that are never accepted in a math string.
const DISALLOWED_SYMBOLS: &[char] = &[
    '[', ']', '{', '}', '=', '&', '%', '$', '#', '@', '!', '~', '`', '<', '>', '\\', '|', ';',
    ':', '\'', '"',
];
/// Operator symbols the grammar understands, besides digits.
const MATH_SYMBOLS: &[char] = &['(', ')', '+', '-', '*', '/', '.'];

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("Invalid math string: {0}")]
    InvalidExpression(String),
    #[error("Invalid result: {0}")]
    InvalidResult(String),
}

/// The numeric result of a calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Keep a decimal point on whole floats so "4/2" reads as 2.0, not 2.
            Number::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{:.1}", x),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Rejects strings containing letters or shell/markup metacharacters, and
/// strings with no digit or math operator at all.
///
/// This is only a first gate; `evaluate` accepts nothing outside its grammar.
pub fn validate(math_str: &str) -> Result<(), CalcError> {
    let has_disallowed = math_str
        .chars()
        .any(|c| c.is_ascii_alphabetic() || DISALLOWED_SYMBOLS.contains(&c));
    let has_math = math_str
        .chars()
        .any(|c| c.is_ascii_digit() || MATH_SYMBOLS.contains(&c));

    if has_disallowed || !has_math {
        return Err(CalcError::InvalidExpression(format!(
            "Invalid characters detected: {}",
            math_str
        )));
    }
    Ok(())
}

/// Validates `math_str` and returns its value.
pub fn calculate(math_str: &str) -> Result<Number, CalcError> {
    validate(math_str)?;
    evaluate(math_str)
}

/// Evaluates an arithmetic expression over `+ - * /`, parentheses and decimal literals.
///
/// Integer arithmetic stays integral unless it overflows; `/` always yields a float.
///
/// # Errors
///
/// * `CalcError::InvalidExpression` if the text does not parse.
/// * `CalcError::InvalidResult` if the value is not a finite number (e.g. division by zero).
pub fn evaluate(math_str: &str) -> Result<Number, CalcError> {
    log::info!("Calculating math string: {}...", math_str);

    let tokens = tokenize(math_str)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(CalcError::InvalidExpression(format!(
            "Unexpected '{}' in: {}",
            token, math_str
        )));
    }

    match value {
        Number::Float(x) if !x.is_finite() => Err(CalcError::InvalidResult(
            "The result of the math string was unexpected or invalid.".to_string(),
        )),
        _ => Ok(value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Op(char),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Op(c) => write!(f, "{}", c),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                let mut seen_dot = false;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || (d == '.' && !seen_dot) {
                        seen_dot |= d == '.';
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(parse_literal(&input[start..end])?));
            }
            '+' | '-' | '*' | '/' => {
                chars.next();
                // `**` and `//` are not part of the grammar.
                if matches!(c, '*' | '/') && chars.peek().map(|&(_, n)| n) == Some(c) {
                    return Err(CalcError::InvalidExpression(format!(
                        "Unsupported operator '{}{}' in: {}",
                        c, c, input
                    )));
                }
                tokens.push(Token::Op(c));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => {
                return Err(CalcError::InvalidExpression(format!(
                    "Unexpected character '{}' in: {}",
                    other, input
                )))
            }
        }
    }
    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Number, CalcError> {
    let invalid = || CalcError::InvalidExpression(format!("Invalid number literal: {}", literal));
    if literal == "." {
        return Err(invalid());
    }
    if literal.contains('.') {
        return literal.parse::<f64>().map(Number::Float).map_err(|_| invalid());
    }
    match literal.parse::<i64>() {
        Ok(i) => Ok(Number::Int(i)),
        // Too large for i64; carry on in floating point.
        Err(_) => literal.parse::<f64>().map(Number::Float).map_err(|_| invalid()),
    }
}

/// Deepest parenthesis nesting `evaluate` accepts.
const MAX_NESTING: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Number, CalcError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.next();
            let rhs = self.term()?;
            lhs = apply(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Number, CalcError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.next();
            let rhs = self.unary()?;
            lhs = apply(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Number, CalcError> {
        let mut negate = false;
        while let Some(Token::Op(sign @ ('+' | '-'))) = self.peek() {
            self.next();
            negate ^= sign == '-';
        }
        let value = self.atom()?;
        if !negate {
            return Ok(value);
        }
        Ok(match value {
            Number::Int(i) => i
                .checked_neg()
                .map_or(Number::Float(-(i as f64)), Number::Int),
            Number::Float(f) => Number::Float(-f),
        })
    }

    fn atom(&mut self) -> Result<Number, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(CalcError::InvalidExpression(
                        "Expression is nested too deeply.".to_string(),
                    ));
                }
                let value = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(CalcError::InvalidExpression(
                        "Unbalanced parentheses.".to_string(),
                    )),
                }
            }
            Some(token) => Err(CalcError::InvalidExpression(format!(
                "Unexpected '{}'.",
                token
            ))),
            None => Err(CalcError::InvalidExpression(
                "Unexpected end of math string.".to_string(),
            )),
        }
    }
}

fn apply(op: char, lhs: Number, rhs: Number) -> Number {
    if let (Number::Int(a), Number::Int(b)) = (lhs, rhs) {
        let checked = match op {
            '+' => a.checked_add(b),
            '-' => a.checked_sub(b),
            '*' => a.checked_mul(b),
            _ => None,
        };
        if let Some(i) = checked {
            return Number::Int(i);
        }
    }

    let (a, b) = (lhs.as_f64(), rhs.as_f64());
    Number::Float(match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        // Division by zero yields inf/NaN and is rejected once evaluation finishes.
        _ => a / b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylisted_characters_are_rejected() {
        for input in [
            "2+2a", "os", "1;rm", "1|2", "$(1)", "[1]", "{1}", "1=1", "1&2", "5%2", "#1", "@1",
            "!1", "~1", "`1`", "<1>", "1\\2", "1:2", "'1'", "\"1\"",
        ] {
            assert!(
                matches!(validate(input), Err(CalcError::InvalidExpression(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_needs_at_least_one_math_character() {
        assert!(validate("").is_err());
        assert!(validate("   ").is_err());
        assert!(validate("1").is_ok());
        assert!(validate("(").is_ok());
    }

    #[test]
    fn test_conventional_arithmetic() {
        assert_eq!(calculate("2+2"), Ok(Number::Int(4)));
        assert_eq!(calculate("(1+2)*3"), Ok(Number::Int(9)));
        assert_eq!(calculate("10/4"), Ok(Number::Float(2.5)));
        assert_eq!(calculate("1+2*3-4"), Ok(Number::Int(3)));
        assert_eq!(calculate("((2))*(3+(4-1))"), Ok(Number::Int(12)));
        assert_eq!(calculate("8-3-2"), Ok(Number::Int(3)));
        assert_eq!(calculate("16/4/2"), Ok(Number::Float(2.0)));
        assert_eq!(calculate(" 1.5 * 2 "), Ok(Number::Float(3.0)));
        assert_eq!(calculate(".5+5."), Ok(Number::Float(5.5)));
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(calculate("-3+5"), Ok(Number::Int(2)));
        assert_eq!(calculate("--3"), Ok(Number::Int(3)));
        assert_eq!(calculate("2*-(1+1)"), Ok(Number::Int(-4)));
        assert_eq!(calculate("+7"), Ok(Number::Int(7)));
    }

    #[test]
    fn test_long_sign_runs_do_not_recurse() {
        let even = format!("{}1", "-".repeat(10_000));
        assert_eq!(calculate(&even), Ok(Number::Int(1)));

        let odd = format!("{}1", "-".repeat(10_001));
        assert_eq!(calculate(&odd), Ok(Number::Int(-1)));

        let mixed = format!("{}2", "+-".repeat(5_001));
        assert_eq!(calculate(&mixed), Ok(Number::Int(-2)));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            calculate(&deep),
            Err(CalcError::InvalidExpression(_))
        ));

        let unclosed = "(".repeat(100_000);
        assert!(matches!(
            calculate(&unclosed),
            Err(CalcError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_moderate_nesting_evaluates() {
        let nested = format!("{}1+2{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(calculate(&nested), Ok(Number::Int(3)));

        let sequential = "(1)+".repeat(1_000) + "(1)";
        assert_eq!(calculate(&sequential), Ok(Number::Int(1_001)));
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        let result = calculate("9223372036854775807+1").unwrap();
        assert!(matches!(result, Number::Float(_)));
    }

    #[test]
    fn test_malformed_expressions() {
        let inputs = [
            "(1+2", "1+2)", "1+", "*2", "1 2", "2**3", "7//2", "1..2", "()", ".", "1.2.3",
        ];
        for input in inputs {
            assert!(
                matches!(calculate(input), Err(CalcError::InvalidExpression(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_non_finite_results_are_invalid() {
        assert!(matches!(calculate("1/0"), Err(CalcError::InvalidResult(_))));
        assert!(matches!(calculate("0/0"), Err(CalcError::InvalidResult(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Number::Int(4).to_string(), "4");
        assert_eq!(Number::Float(2.5).to_string(), "2.5");
        assert_eq!(Number::Float(2.0).to_string(), "2.0");
        assert_eq!(Number::Float(-0.25).to_string(), "-0.25");
    }
}
