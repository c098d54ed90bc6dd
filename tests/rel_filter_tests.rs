use graphproc::{Direction, GraphProcError, TypeDirection, parse_relationship_filter};
use rand::{Rng, SeedableRng, rngs::StdRng};

const TYPES: &[&str] = &["KNOWS", "LIKES", "WORKS_AT", "FOLLOWS", "REL_1", "a"];

fn render(rel_type: &str, direction: Direction, rng: &mut StdRng) -> String {
    match direction {
        Direction::Both => rel_type.to_string(),
        Direction::Outgoing if rng.gen_bool(0.5) => format!("{rel_type}>"),
        Direction::Outgoing => format!(">{rel_type}"),
        Direction::Incoming if rng.gen_bool(0.5) => format!("<{rel_type}"),
        Direction::Incoming => format!("{rel_type}<"),
    }
}

#[test]
fn random_filters_parse_back_in_order() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let count = rng.gen_range(1..8);
        let mut expected = Vec::with_capacity(count);
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let rel_type = TYPES[rng.gen_range(0..TYPES.len())];
            let direction = match rng.gen_range(0..3) {
                0 => Direction::Outgoing,
                1 => Direction::Incoming,
                _ => Direction::Both,
            };
            tokens.push(render(rel_type, direction, &mut rng));
            expected.push(TypeDirection::new(Some(rel_type), direction));
        }
        let filter = tokens.join(",");
        let parsed = parse_relationship_filter(&filter).unwrap();
        assert_eq!(parsed, expected, "filter {filter}");
    }
}

#[test]
fn pipe_and_comma_both_separate_alternatives() {
    let commas = parse_relationship_filter("KNOWS>,<LIKES").unwrap();
    let pipes = parse_relationship_filter("KNOWS>|<LIKES").unwrap();
    assert_eq!(commas, pipes);
    assert_eq!(commas.len(), 2);
}

#[test]
fn duplicates_are_kept() {
    let parsed = parse_relationship_filter("KNOWS,KNOWS").unwrap();
    assert_eq!(parsed.len(), 2);
}

#[test]
fn bare_markers_are_directional_wildcards() {
    assert_eq!(
        parse_relationship_filter(">").unwrap(),
        vec![TypeDirection::new(None, Direction::Outgoing)]
    );
    assert_eq!(
        parse_relationship_filter("<").unwrap(),
        vec![TypeDirection::new(None, Direction::Incoming)]
    );
}

#[test]
fn backticks_allow_spaces_in_type_names() {
    let parsed = parse_relationship_filter("`WORKS WITH`>").unwrap();
    assert_eq!(
        parsed,
        vec![TypeDirection::new(Some("WORKS WITH"), Direction::Outgoing)]
    );
}

#[test]
fn malformed_tokens_are_named_in_the_error() {
    for bad in ["KN>OWS", "<KNOWS>", "WORKS WITH"] {
        match parse_relationship_filter(&format!("LIKES,{bad}")) {
            Err(GraphProcError::ParseError(msg)) => assert!(msg.contains(bad), "{msg}"),
            other => panic!("{bad}: unexpected {other:?}"),
        }
    }
}

#[test]
fn display_renders_canonical_tokens() {
    let parsed = parse_relationship_filter(">KNOWS,LIKES<,WORKS_AT").unwrap();
    let rendered: Vec<String> = parsed.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["KNOWS>", "<LIKES", "WORKS_AT"]);
}
