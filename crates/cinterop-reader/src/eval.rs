//! Integer constant expressions.
//!
//! Used for `#if` conditions, enumerator values, array lengths and bitfield
//! widths. Expressions are evaluated over C tokens with 64-bit signed
//! arithmetic; identifiers are resolved through a [`SymbolTable`].

/// What an identifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Value(i64),
    /// An object-like macro body, expanded in place.
    Tokens(Vec<String>),
    /// A function-like macro; only meaningful to `defined`.
    FunctionLike,
}

pub trait SymbolTable {
    fn lookup(&self, name: &str) -> Option<Symbol>;
}

impl<F: Fn(&str) -> Option<Symbol>> SymbolTable for F {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self(name)
    }
}

const MAX_EXPANSION_DEPTH: usize = 32;

const CAST_KEYWORDS: &[&str] = &[
    "int", "unsigned", "signed", "long", "short", "char", "_Bool", "bool", "const", "volatile",
];

/// Split C source text into tokens. Whitespace and comments must already be
/// gone from string contents the caller cares about; block comments elsewhere
/// are skipped.
pub fn tokenize(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            break;
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() {
                let ch = chars[i];
                let exponent_sign = (ch == '+' || ch == '-') && matches!(chars[i - 1], 'e' | 'E' | 'p' | 'P');
                if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(chars[start..i].iter().collect());
        } else if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            tokens.push(chars[start..i].iter().collect());
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let len = if rest.starts_with("...") || rest.starts_with("<<=") || rest.starts_with(">>=") {
                3
            } else if [
                "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "##", "->", "++", "--", "+=", "-=", "*=", "/=", "%=",
                "&=", "|=", "^=",
            ]
            .iter()
            .any(|p| rest.starts_with(p))
            {
                2
            } else {
                1
            };
            tokens.push(chars[i..i + len].iter().collect());
            i += len;
        }
    }
    tokens
}

/// Parse an integer literal such as `0x1F`, `017`, `0b101` or `42UL`.
pub fn parse_integer_literal(token: &str) -> Option<i64> {
    let lower = token.to_ascii_lowercase();
    let digits = lower.trim_end_matches(['u', 'l']);
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    let body = body.replace('\'', "");
    u64::from_str_radix(&body, radix).ok().map(|v| v as i64)
}

/// Value of a character literal such as `'a'` or `'\n'`.
pub fn parse_char_literal(token: &str) -> Option<i64> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(first as i64);
    }
    let rest: String = chars.collect();
    let value = match rest.as_str() {
        "n" => 10,
        "t" => 9,
        "r" => 13,
        "0" => 0,
        "\\" => 92,
        "'" => 39,
        "\"" => 34,
        "a" => 7,
        "b" => 8,
        "f" => 12,
        "v" => 11,
        other if other.starts_with('x') => i64::from_str_radix(&other[1..], 16).ok()?,
        other => i64::from_str_radix(other, 8).ok()?,
    };
    Some(value)
}

/// Evaluate a token sequence.
///
/// With `undefined_is_zero`, unknown identifiers evaluate to 0 as in `#if`;
/// otherwise they are an error.
pub fn evaluate(tokens: &[String], symbols: &dyn SymbolTable, undefined_is_zero: bool) -> Result<i64, String> {
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        symbols,
        undefined_is_zero,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(extra) = tokens.get(parser.pos) {
        return Err(format!("unexpected token '{extra}'"));
    }
    Ok(value)
}

struct ExprParser<'a> {
    tokens: &'a [String],
    pos: usize,
    symbols: &'a dyn SymbolTable,
    undefined_is_zero: bool,
    depth: usize,
}

fn binary_precedence(op: &str) -> Option<u8> {
    let precedence = match op {
        "*" | "/" | "%" => 10,
        "+" | "-" => 9,
        "<<" | ">>" => 8,
        "<" | "<=" | ">" | ">=" => 7,
        "==" | "!=" => 6,
        "&" => 5,
        "^" => 4,
        "|" => 3,
        "&&" => 2,
        "||" => 1,
        _ => return None,
    };
    Some(precedence)
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&str> {
        let token = self.tokens.get(self.pos).map(String::as_str);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &str) -> Result<(), String> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(format!("expected '{expected}', found '{t}'")),
            None => Err(format!("expected '{expected}', found end of expression")),
        }
    }

    fn expression(&mut self) -> Result<i64, String> {
        let condition = self.binary(1)?;
        if self.peek() == Some("?") {
            self.pos += 1;
            let then = self.expression()?;
            self.expect(":")?;
            let otherwise = self.expression()?;
            return Ok(if condition != 0 { then } else { otherwise });
        }
        Ok(condition)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek() {
            let Some(precedence) = binary_precedence(op) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let op = op.to_string();
            self.pos += 1;
            let rhs = self.binary(precedence + 1)?;
            lhs = apply_binary(&op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, String> {
        match self.peek() {
            Some("!") => {
                self.pos += 1;
                Ok(i64::from(self.unary()? == 0))
            }
            Some("~") => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some("-") => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some("+") => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i64, String> {
        let token = self
            .next()
            .ok_or_else(|| "unexpected end of expression".to_string())?
            .to_string();

        if token == "(" {
            if self.peek().is_some_and(|t| CAST_KEYWORDS.contains(&t)) {
                while let Some(t) = self.next() {
                    if t == ")" {
                        break;
                    }
                }
                return self.unary();
            }
            let value = self.expression()?;
            self.expect(")")?;
            return Ok(value);
        }
        if token == "defined" {
            let parenthesized = self.peek() == Some("(");
            if parenthesized {
                self.pos += 1;
            }
            let name = self
                .next()
                .ok_or_else(|| "expected identifier after 'defined'".to_string())?
                .to_string();
            if parenthesized {
                self.expect(")")?;
            }
            return Ok(i64::from(self.symbols.lookup(&name).is_some()));
        }
        if token.starts_with('\'') {
            return parse_char_literal(&token).ok_or_else(|| format!("invalid character literal {token}"));
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            return parse_integer_literal(&token).ok_or_else(|| format!("invalid integer literal '{token}'"));
        }
        if token.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            if token == "true" {
                return Ok(1);
            }
            if token == "false" {
                return Ok(0);
            }
            return match self.symbols.lookup(&token) {
                Some(Symbol::Value(v)) => Ok(v),
                Some(Symbol::Tokens(body)) => {
                    if self.depth >= MAX_EXPANSION_DEPTH {
                        return Err(format!("macro '{token}' expands too deeply"));
                    }
                    if body.is_empty() {
                        return if self.undefined_is_zero {
                            Ok(0)
                        } else {
                            Err(format!("macro '{token}' has no value"))
                        };
                    }
                    let mut nested = ExprParser {
                        tokens: &body,
                        pos: 0,
                        symbols: self.symbols,
                        undefined_is_zero: self.undefined_is_zero,
                        depth: self.depth + 1,
                    };
                    let value = nested.expression()?;
                    if nested.pos < body.len() {
                        return Err(format!("macro '{token}' is not an integer expression"));
                    }
                    Ok(value)
                }
                Some(Symbol::FunctionLike) | None if self.undefined_is_zero => Ok(0),
                Some(Symbol::FunctionLike) | None => Err(format!("unknown identifier '{token}'")),
            };
        }
        Err(format!("unexpected token '{token}'"))
    }
}

fn apply_binary(op: &str, lhs: i64, rhs: i64) -> Result<i64, String> {
    let value = match op {
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err("division by zero".to_string()),
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "<" => i64::from(lhs < rhs),
        "<=" => i64::from(lhs <= rhs),
        ">" => i64::from(lhs > rhs),
        ">=" => i64::from(lhs >= rhs),
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "&" => lhs & rhs,
        "^" => lhs ^ rhs,
        "|" => lhs | rhs,
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "||" => i64::from(lhs != 0 || rhs != 0),
        other => return Err(format!("unsupported operator '{other}'")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_symbols(_: &str) -> Option<Symbol> {
        None
    }

    fn eval(src: &str) -> i64 {
        evaluate(&tokenize(src), &no_symbols, true).unwrap()
    }

    #[test]
    fn tokenizes_operators_and_literals() {
        let tokens = tokenize("a<<=0x1Fu + 'x' /* c */ \"s\\\"t\" ...");
        assert_eq!(tokens, vec!["a", "<<=", "0x1Fu", "+", "'x'", "\"s\\\"t\"", "..."]);
        assert_eq!(tokenize("1.5e-3f"), vec!["1.5e-3f"]);
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7);
        assert_eq!(eval("(1 + 2) * 3"), 9);
        assert_eq!(eval("1 << 4 | 1"), 17);
        assert_eq!(eval("-5 + ~0"), -6);
        assert_eq!(eval("10 > 3 && 2 == 2"), 1);
        assert_eq!(eval("0 ? 4 : 5"), 5);
        assert_eq!(eval("(unsigned int)7"), 7);
    }

    #[test]
    fn literals() {
        assert_eq!(parse_integer_literal("0x10"), Some(16));
        assert_eq!(parse_integer_literal("010"), Some(8));
        assert_eq!(parse_integer_literal("0b11"), Some(3));
        assert_eq!(parse_integer_literal("42ULL"), Some(42));
        assert_eq!(parse_integer_literal("0"), Some(0));
        assert_eq!(parse_integer_literal("0xFFFFFFFFFFFFFFFF"), Some(-1));
        assert_eq!(parse_char_literal("'\\n'"), Some(10));
        assert_eq!(parse_char_literal("'A'"), Some(65));
    }

    #[test]
    fn defined_and_macro_expansion() {
        let symbols = |name: &str| match name {
            "FOO" => Some(Symbol::Tokens(vec![])),
            "VERSION" => Some(Symbol::Tokens(tokenize("(MAJOR * 100)"))),
            "MAJOR" => Some(Symbol::Value(3)),
            "MAX" => Some(Symbol::FunctionLike),
            _ => None,
        };
        assert_eq!(evaluate(&tokenize("defined(FOO) && !defined BAR"), &symbols, true), Ok(1));
        assert_eq!(evaluate(&tokenize("VERSION >= 300"), &symbols, true), Ok(1));
        assert_eq!(evaluate(&tokenize("defined(MAX)"), &symbols, true), Ok(1));
        assert_eq!(evaluate(&tokenize("UNKNOWN"), &symbols, true), Ok(0));
        assert!(evaluate(&tokenize("UNKNOWN"), &symbols, false).is_err());
    }

    #[test]
    fn errors() {
        assert!(evaluate(&tokenize("1 / 0"), &no_symbols, true).is_err());
        assert!(evaluate(&tokenize("(1 + 2"), &no_symbols, true).is_err());
        assert!(evaluate(&tokenize("1 2"), &no_symbols, true).is_err());
    }
}
