//! Parsing helpers for command line values

use sprig_core::{Attributes, Indent, SprigError};

/// Parse `key=value` pairs into an attribute mapping.
///
/// Returns `None` for an empty list so that searches stay unconstrained.
pub fn parse_attributes(pairs: &[String]) -> sprig_core::Result<Option<Attributes>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut attributes = Attributes::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            SprigError::InvalidArgument(format!("expected key=value, got {:?}", pair))
        })?;
        if key.is_empty() {
            return Err(SprigError::InvalidArgument(format!(
                "empty attribute name in {:?}",
                pair
            )));
        }
        attributes.insert(key, value);
    }
    Ok(Some(attributes))
}

/// A number means that many spaces, anything else is used literally
pub fn parse_indent(value: &str) -> Indent {
    match value.parse::<usize>() {
        Ok(spaces) => Indent::from(spaces),
        Err(_) => Indent::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes(&["x=1".to_string(), "y=a=b".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(attrs.get("x"), Some("1"));
        assert_eq!(attrs.get("y"), Some("a=b"));
    }

    #[test]
    fn test_parse_attributes_empty_is_none() {
        assert!(parse_attributes(&[]).unwrap().is_none());
    }

    #[test]
    fn test_parse_attributes_invalid() {
        assert!(parse_attributes(&["novalue".to_string()]).is_err());
        assert!(parse_attributes(&["=1".to_string()]).is_err());
    }

    #[test]
    fn test_parse_indent() {
        assert_eq!(parse_indent("2"), Indent::from("  "));
        assert_eq!(parse_indent("\t"), Indent::from("\t"));
        assert_eq!(parse_indent("0"), Indent::from(""));
    }
}
