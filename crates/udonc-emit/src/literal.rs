//! Literal formatting (§4.8): strings JSON-quoted, booleans as
//! `true`/`false`, integers verbatim, 32-bit floats suffixed, `null` for
//! the null literal, and a commented placeholder for non-serializable
//! heap values.

use udonc_model::HeapValue;

pub fn format_literal(value: &HeapValue, type_hint: Option<&str>) -> String {
    match value {
        HeapValue::Null => "null".to_string(),
        HeapValue::Bool(b) => b.to_string(),
        HeapValue::Int(i) => i.to_string(),
        HeapValue::Float(f) => {
            if is_single_precision(type_hint) {
                format!("{f}f")
            } else {
                format!("{f}")
            }
        }
        HeapValue::Str(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}")),
        HeapValue::UInt32Array(values) => {
            let items: Vec<String> = values.iter().map(u32::to_string).collect();
            format!("new uint[] {{ {} }}", items.join(", "))
        }
        HeapValue::Opaque { to_string_hint } => match to_string_hint {
            Some(hint) => format!("/* {hint} */ null"),
            None => "/* non-serializable */ null".to_string(),
        },
    }
}

fn is_single_precision(type_hint: Option<&str>) -> bool {
    type_hint
        .map(|t| t.contains("Single") || t.contains("Float"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_json_quoted() {
        assert_eq!(
            format_literal(&HeapValue::Str("a\"b".to_string()), None),
            "\"a\\\"b\""
        );
    }

    #[test]
    fn singles_get_f_suffix() {
        assert_eq!(
            format_literal(&HeapValue::Float(1.5), Some("System.Single, mscorlib")),
            "1.5f"
        );
    }

    #[test]
    fn doubles_have_no_suffix() {
        assert_eq!(
            format_literal(&HeapValue::Float(1.5), Some("System.Double, mscorlib")),
            "1.5"
        );
    }

    #[test]
    fn opaque_renders_commented_placeholder() {
        assert_eq!(
            format_literal(
                &HeapValue::Opaque {
                    to_string_hint: Some("UnityEngine.Object".to_string())
                },
                None
            ),
            "/* UnityEngine.Object */ null"
        );
    }

    #[test]
    fn booleans_and_null() {
        assert_eq!(format_literal(&HeapValue::Bool(true), None), "true");
        assert_eq!(format_literal(&HeapValue::Null, None), "null");
    }
}
