//! Relationship filter grammar: `"KNOWS>,<WORKS_AT|LIKES"`.
//!
//! Tokens are separated by `,` or `|`. A `>` before or after the type name
//! means outgoing, `<` incoming, no marker both directions. A token without a
//! type name (`""`, `">"`, `"<"`) matches every relationship type.

use std::fmt;

use crate::{errors::GraphProcError, store::Direction};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeDirection {
    /// `None` is the wildcard type.
    pub rel_type: Option<String>,
    pub direction: Direction,
}

impl TypeDirection {
    pub fn new(rel_type: Option<&str>, direction: Direction) -> Self {
        Self {
            rel_type: rel_type.map(str::to_owned),
            direction,
        }
    }

    pub fn any() -> Self {
        Self::new(None, Direction::Both)
    }
}

impl fmt::Display for TypeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.rel_type.as_deref().unwrap_or("");
        match self.direction {
            Direction::Outgoing => write!(f, "{name}>"),
            Direction::Incoming => write!(f, "<{name}"),
            Direction::Both => write!(f, "{name}"),
        }
    }
}

pub fn parse_relationship_filter(spec: &str) -> Result<Vec<TypeDirection>, GraphProcError> {
    spec.split([',', '|']).map(parse_token).collect()
}

fn parse_token(raw: &str) -> Result<TypeDirection, GraphProcError> {
    let token = raw.trim();
    let incoming = token.matches('<').count();
    let outgoing = token.matches('>').count();
    if incoming + outgoing > 1 {
        return Err(GraphProcError::parse(format!(
            "relationship filter token '{token}' has more than one direction marker"
        )));
    }
    let (direction, name) = if incoming == 1 {
        (Direction::Incoming, strip_marker(token, '<')?)
    } else if outgoing == 1 {
        (Direction::Outgoing, strip_marker(token, '>')?)
    } else {
        (Direction::Both, token)
    };
    let name = name.trim();
    let quoted = is_quoted(name);
    let name = unquote(name);
    if !quoted && name.chars().any(char::is_whitespace) {
        return Err(GraphProcError::parse(format!(
            "relationship filter token '{token}' contains whitespace in its type name"
        )));
    }
    let rel_type = if name.is_empty() { None } else { Some(name) };
    Ok(TypeDirection::new(rel_type, direction))
}

fn strip_marker(token: &str, marker: char) -> Result<&str, GraphProcError> {
    if let Some(rest) = token.strip_prefix(marker) {
        Ok(rest)
    } else if let Some(rest) = token.strip_suffix(marker) {
        Ok(rest)
    } else {
        Err(GraphProcError::parse(format!(
            "relationship filter token '{token}' has '{marker}' inside the type name"
        )))
    }
}

fn is_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('`') && name.ends_with('`')
}

fn unquote(name: &str) -> &str {
    if is_quoted(name) {
        &name[1..name.len() - 1]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_and_suffix_markers() {
        let parsed = parse_relationship_filter("KNOWS>,<LIKES,WORKS_AT,>FOLLOWS,BLOCKS<").unwrap();
        assert_eq!(
            parsed,
            vec![
                TypeDirection::new(Some("KNOWS"), Direction::Outgoing),
                TypeDirection::new(Some("LIKES"), Direction::Incoming),
                TypeDirection::new(Some("WORKS_AT"), Direction::Both),
                TypeDirection::new(Some("FOLLOWS"), Direction::Outgoing),
                TypeDirection::new(Some("BLOCKS"), Direction::Incoming),
            ]
        );
    }

    #[test]
    fn empty_tokens_are_wildcards() {
        assert_eq!(parse_relationship_filter("").unwrap(), vec![TypeDirection::any()]);
        assert_eq!(
            parse_relationship_filter(">|<").unwrap(),
            vec![
                TypeDirection::new(None, Direction::Outgoing),
                TypeDirection::new(None, Direction::Incoming),
            ]
        );
    }

    #[test]
    fn malformed_token_is_named_in_error() {
        let err = parse_relationship_filter("KNOWS>,<BAD>").unwrap_err();
        assert!(matches!(err, GraphProcError::ParseError(_)));
        assert!(err.message().contains("<BAD>"));

        let err = parse_relationship_filter("KN>OWS").unwrap_err();
        assert!(err.message().contains("KN>OWS"));

        let err = parse_relationship_filter("HAS FRIEND>").unwrap_err();
        assert!(err.message().contains("HAS FRIEND>"));
    }

    #[test]
    fn backtick_quoted_names_may_contain_spaces() {
        let parsed = parse_relationship_filter("`HAS FRIEND`>").unwrap();
        assert_eq!(parsed, vec![TypeDirection::new(Some("HAS FRIEND"), Direction::Outgoing)]);
    }

    #[test]
    fn duplicates_and_order_are_preserved() {
        let parsed = parse_relationship_filter("A>,A>,B").unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], parsed[1]);
        assert_eq!(parsed[2].to_string(), "B");
    }
}
