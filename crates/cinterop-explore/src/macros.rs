//! Object-like macros as typed constants.

use cinterop_ast::CType;
use cinterop_reader::eval::{evaluate, parse_char_literal, parse_integer_literal, SymbolTable};
use cinterop_targets::PrimitiveLayout;

/// Why a macro definition is not turned into a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroSkip {
    /// Leading underscore: reserved or private by convention.
    Reserved,
    FunctionLike,
    /// Defined without a value.
    Flag,
    /// The value is not a literal or integer constant expression.
    Untyped,
}

/// The tokens and value type of an exposable object-like macro.
pub fn macro_constant(
    name: &str,
    tokens: &[String],
    function_like: bool,
    layout: &PrimitiveLayout,
    symbols: &dyn SymbolTable,
) -> Result<(Vec<String>, CType), MacroSkip> {
    if name.starts_with('_') {
        return Err(MacroSkip::Reserved);
    }
    if function_like {
        return Err(MacroSkip::FunctionLike);
    }
    if tokens.is_empty() {
        return Err(MacroSkip::Flag);
    }
    let tokens = strip_outer_parentheses(tokens);
    let ty = literal_type(&tokens, layout)
        .or_else(|| {
            let value = evaluate(&tokens, symbols, false).ok()?;
            let spelling = if i32::try_from(value).is_ok() { "int" } else { "long long" };
            primitive(spelling, layout)
        })
        .ok_or(MacroSkip::Untyped)?;
    Ok((tokens, ty))
}

/// Drop one redundant pair of parentheses around the whole value.
fn strip_outer_parentheses(tokens: &[String]) -> Vec<String> {
    let wrapped = tokens.len() > 2
        && tokens.first().map(String::as_str) == Some("(")
        && tokens.last().map(String::as_str) == Some(")")
        && closes_at_end(tokens);
    if wrapped {
        tokens[1..tokens.len() - 1].to_vec()
    } else {
        tokens.to_vec()
    }
}

/// Whether the opening parenthesis at index 0 is matched by the last token,
/// so `(a) | (b)` is left alone.
fn closes_at_end(tokens: &[String]) -> bool {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.as_str() {
            "(" => depth += 1,
            ")" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index == tokens.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn primitive(spelling: &str, layout: &PrimitiveLayout) -> Option<CType> {
    let (size, align) = layout.size_align(spelling)?;
    Some(CType::primitive(spelling, size, align))
}

fn literal_type(tokens: &[String], layout: &PrimitiveLayout) -> Option<CType> {
    if tokens.iter().all(|t| t.starts_with('"')) {
        let char_ty = primitive("char", layout)?;
        return Some(CType::pointer(char_ty, layout.pointer_size));
    }
    let literal = match tokens {
        [single] => single.as_str(),
        [sign, number] if sign == "-" || sign == "+" => number.as_str(),
        _ => return None,
    };
    if parse_char_literal(literal).is_some() {
        return primitive("char", layout);
    }
    if !literal.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let lower = literal.to_ascii_lowercase();
    let is_hex = lower.starts_with("0x");
    if !is_hex && (lower.contains('.') || lower.contains('e')) {
        let spelling = if lower.ends_with('f') { "float" } else { "double" };
        return primitive(spelling, layout);
    }
    let value = parse_integer_literal(literal)?;
    let suffix: String = lower.chars().rev().take_while(|c| *c == 'u' || *c == 'l').collect();
    let unsigned = suffix.contains('u');
    let longs = suffix.matches('l').count();
    let spelling = match (unsigned, longs) {
        (true, 2..) => "unsigned long long",
        (false, 2..) => "long long",
        (true, 1) => "unsigned long",
        (false, 1) => "long",
        (true, _) if u32::try_from(value).is_ok() => "unsigned int",
        (true, _) => "unsigned long long",
        (false, _) if i32::try_from(value).is_ok() => "int",
        (false, _) if is_hex && u32::try_from(value).is_ok() => "unsigned int",
        (false, _) => "long long",
    };
    primitive(spelling, layout)
}

#[cfg(test)]
mod tests {
    use cinterop_reader::eval::{tokenize, Symbol};
    use cinterop_targets::TargetPlatform;

    use super::*;

    fn no_symbols(_: &str) -> Option<Symbol> {
        None
    }

    fn constant(name: &str, value: &str) -> Result<(Vec<String>, CType), MacroSkip> {
        let layout = TargetPlatform::linux_x64().primitive_layout();
        macro_constant(name, &tokenize(value), false, &layout, &no_symbols)
    }

    #[test]
    fn literal_types() {
        assert_eq!(constant("A", "42").unwrap().1.name, "int");
        assert_eq!(constant("A", "42u").unwrap().1.name, "unsigned int");
        assert_eq!(constant("A", "0xFFFFFFFF").unwrap().1.name, "unsigned int");
        assert_eq!(constant("A", "10000000000").unwrap().1.name, "long long");
        assert_eq!(constant("A", "1ULL").unwrap().1.name, "unsigned long long");
        assert_eq!(constant("A", "1.5f").unwrap().1.name, "float");
        assert_eq!(constant("A", "-2.0").unwrap().1.name, "double");
        assert_eq!(constant("A", "'x'").unwrap().1.name, "char");
        let (_, string) = constant("A", "\"1.2.3\"").unwrap();
        assert_eq!(string.name, "char*");
    }

    #[test]
    fn outer_parentheses_are_stripped_once() {
        let (tokens, ty) = constant("A", "(1 << 4)").unwrap();
        assert_eq!(tokens, vec!["1", "<<", "4"]);
        assert_eq!(ty.name, "int");
        let (tokens, _) = constant("A", "(1) | (2)").unwrap();
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn skipped_macros() {
        assert_eq!(constant("_PRIVATE", "1").unwrap_err(), MacroSkip::Reserved);
        assert_eq!(constant("FLAG", "").unwrap_err(), MacroSkip::Flag);
        assert_eq!(constant("CALL", "foo(1)").unwrap_err(), MacroSkip::Untyped);
        let layout = TargetPlatform::linux_x64().primitive_layout();
        let err = macro_constant("MAX", &tokenize("a"), true, &layout, &no_symbols).unwrap_err();
        assert_eq!(err, MacroSkip::FunctionLike);
    }

    #[test]
    fn expressions_over_other_macros() {
        let layout = TargetPlatform::linux_x64().primitive_layout();
        let symbols = |name: &str| (name == "BASE").then(|| Symbol::Tokens(vec!["8".into()]));
        let (_, ty) = macro_constant("NEXT", &tokenize("BASE + 1"), false, &layout, &symbols).unwrap();
        assert_eq!(ty.name, "int");
    }
}
