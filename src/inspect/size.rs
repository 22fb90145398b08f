//! Wire-format size estimates for headers and bodies.

use serde_json::Value;

use crate::headers::HeaderFields;

/// Bytes of the blank line terminating a header block.
const HEADER_BLOCK_TERMINATOR: usize = 2;

/// The shapes a body can take when it is measured.
#[derive(Debug, Clone, Copy)]
pub enum BodyShape<'a> {
    Absent,
    Text(&'a str),
    Binary(&'a [u8]),
    Json(&'a Value),
    /// Anything else (numbers, booleans). Counts as zero.
    Unsupported,
}

impl<'a> From<Option<&'a Value>> for BodyShape<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => BodyShape::Absent,
            Some(Value::String(s)) => BodyShape::Text(s),
            Some(v @ (Value::Object(_) | Value::Array(_))) => BodyShape::Json(v),
            Some(Value::Bool(_) | Value::Number(_)) => BodyShape::Unsupported,
        }
    }
}

/// Size of the header block as `name: value\r\n` lines plus the blank line.
///
/// Multi-valued headers are measured as one line joined with `", "`.
pub fn compute_header_size(headers: &HeaderFields) -> usize {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value.joined()).len())
        .sum::<usize>()
        + HEADER_BLOCK_TERMINATOR
}

/// Byte length of a body in whatever shape it was given.
pub fn compute_body_size(body: BodyShape<'_>) -> usize {
    match body {
        BodyShape::Absent | BodyShape::Unsupported => 0,
        BodyShape::Text(s) => s.len(),
        BodyShape::Binary(b) => b.len(),
        BodyShape::Json(v) => serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeaderField;
    use serde_json::json;

    #[test]
    fn empty_headers_are_two_bytes() {
        assert_eq!(compute_header_size(&HeaderFields::new()), 2);
    }

    #[test]
    fn single_header_line() {
        let mut headers = HeaderFields::new();
        headers.insert("Content-Type".into(), "text/plain".into());
        assert_eq!(
            compute_header_size(&headers),
            "Content-Type: text/plain\r\n".len() + 2
        );
    }

    #[test]
    fn multi_value_header_is_joined() {
        let mut headers = HeaderFields::new();
        headers.insert(
            "set-cookie".into(),
            HeaderField::Many(vec!["a=1".into(), "b=2".into()]),
        );
        assert_eq!(compute_header_size(&headers), "set-cookie: a=1, b=2\r\n".len() + 2);
    }

    #[test]
    fn header_size_counts_utf8_bytes() {
        let mut headers = HeaderFields::new();
        headers.insert("x-name".into(), "héllo".into());
        assert_eq!(compute_header_size(&headers), "x-name: héllo\r\n".len() + 2);
        assert_eq!(compute_header_size(&headers), 18);
    }

    #[test]
    fn body_sizes_by_shape() {
        assert_eq!(compute_body_size(BodyShape::Absent), 0);
        assert_eq!(compute_body_size(BodyShape::Text("héllo")), 6);
        assert_eq!(compute_body_size(BodyShape::Binary(&[0, 1, 2, 255])), 4);

        let v = json!({"a": 1});
        assert_eq!(compute_body_size(BodyShape::Json(&v)), r#"{"a":1}"#.len());
    }

    #[test]
    fn scalars_and_null_count_as_zero() {
        for v in [json!(null), json!(42), json!(true)] {
            assert_eq!(compute_body_size(BodyShape::from(Some(&v))), 0);
        }
        assert_eq!(compute_body_size(BodyShape::from(None)), 0);
    }
}
