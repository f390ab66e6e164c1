//! Names for declarations the header leaves unnamed.

use cinterop_ast::CType;

/// Name of an inline function pointer, derived from its signature so the
/// same signature always yields the same node: `FnPtr_<Params>_<Return>`,
/// with `Varargs` after the parameters of a variadic signature.
pub fn function_pointer_name(parameters: &[CType], is_variadic: bool, return_type: &CType) -> String {
    let mut parts: Vec<String> = parameters.iter().map(|p| type_word(&p.name)).collect();
    if is_variadic {
        parts.push("Varargs".to_string());
    }
    parts.push(type_word(&return_type.name));
    format!("FnPtr_{}", parts.join("_"))
}

/// Name of the `index`-th anonymous record or enum declared in `parent`.
pub fn anonymous_type_name(parent: &str, index: usize) -> String {
    format!("{parent}_anonymous_field{index}")
}

/// Name of the unnamed field holding the `index`-th anonymous record.
pub fn anonymous_field_name(index: usize) -> String {
    format!("anonymous_field{index}")
}

/// Name of a file-scope anonymous enum: the underscore-terminated prefix its
/// constants share, so `MODE_A, MODE_B` gives `MODE`. `None` for a single
/// constant or when the constants share no such prefix.
pub fn anonymous_enum_name(constants: &[&str]) -> Option<String> {
    let (first, rest) = constants.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let shared = rest.iter().fold(first.len(), |len, name| {
        first
            .bytes()
            .zip(name.bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count()
    });
    let prefix = first.get(..shared)?;
    let end = prefix.rfind('_')?;
    let name = prefix[..end].trim_end_matches('_');
    (!name.is_empty()).then(|| name.to_string())
}

/// `unsigned int*` becomes `UnsignedIntPtr`.
fn type_word(spelling: &str) -> String {
    let mut word = String::with_capacity(spelling.len());
    let mut boundary = true;
    for c in spelling.chars() {
        match c {
            '*' => {
                word.push_str("Ptr");
                boundary = true;
            }
            '[' => {
                word.push_str("Array");
                boundary = true;
            }
            c if c.is_ascii_alphanumeric() => {
                if boundary {
                    word.push(c.to_ascii_uppercase());
                } else {
                    word.push(c);
                }
                boundary = false;
            }
            _ => boundary = true,
        }
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_names() {
        let char_ptr = CType::pointer(CType::primitive("char", 1, 1), 8);
        let name = function_pointer_name(&[char_ptr.clone()], false, &CType::void());
        assert_eq!(name, "FnPtr_CharPtr_Void");
        let name = function_pointer_name(&[char_ptr], true, &CType::void());
        assert_eq!(name, "FnPtr_CharPtr_Varargs_Void");
        let name = function_pointer_name(&[], false, &CType::primitive("unsigned int", 4, 4));
        assert_eq!(name, "FnPtr_UnsignedInt");
        let arr = CType::array(CType::primitive("int", 4, 4), Some(4));
        assert_eq!(type_word(&arr.name), "IntArray4");
    }

    #[test]
    fn anonymous_enums_take_the_shared_prefix() {
        assert_eq!(anonymous_enum_name(&["FLAG_A", "FLAG_B"]).as_deref(), Some("FLAG"));
        assert_eq!(anonymous_enum_name(&["LOG_LEVEL_INFO", "LOG_LEVEL_ERROR"]).as_deref(), Some("LOG_LEVEL"));
        assert_eq!(anonymous_enum_name(&["MODE_A", "MODE_AB"]).as_deref(), Some("MODE"));
        assert_eq!(anonymous_enum_name(&["noErr"]), None);
        assert_eq!(anonymous_enum_name(&["normal", "bold"]), None);
        assert_eq!(anonymous_enum_name(&["_A", "_B"]), None);
        assert_eq!(anonymous_enum_name(&[]), None);
    }

    #[test]
    fn anonymous_names() {
        assert_eq!(anonymous_type_name("Value", 0), "Value_anonymous_field0");
        assert_eq!(anonymous_field_name(2), "anonymous_field2");
    }
}
