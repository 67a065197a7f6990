use super::*;

#[test]
fn id_validation() {
    assert_eq!(validate_id("").unwrap_err(), IdError::Empty);
    assert_eq!(validate_id("  ").unwrap_err(), IdError::Empty);
    assert_eq!(validate_id("bad|id").unwrap_err(), IdError::ContainsPipe);
    assert_eq!(
        validate_id("bad\u{0007}id").unwrap_err(),
        IdError::ContainsControl
    );
    assert_eq!(validate_id(&"n".repeat(257)).unwrap_err(), IdError::TooLong);
    assert!(validate_id("N-123").is_ok());
}

#[test]
fn normalize_tags_is_deterministic_and_safe() {
    let out = normalize_tags(&[
        " Bearing ".to_string(),
        "#bearing".to_string(),
        "LUBE".to_string(),
        "".to_string(),
    ])
    .unwrap();
    assert_eq!(out, vec!["bearing".to_string(), "lube".to_string()]);

    assert_eq!(
        normalize_tags(&["bad\u{0000}tag".to_string()]).unwrap_err(),
        TagError::ContainsControl
    );
}

#[test]
fn node_type_and_gate_parse() {
    for ty in [
        NodeType::TopEvent,
        NodeType::IntermediateEvent,
        NodeType::BasicEvent,
        NodeType::Gate,
    ] {
        assert_eq!(NodeType::parse(ty.as_str()), Some(ty));
    }
    assert_eq!(NodeType::parse("leaf"), None);
    assert_eq!(GateType::parse("and"), Some(GateType::And));
    assert_eq!(GateType::parse(" OR "), Some(GateType::Or));
    assert_eq!(GateType::parse("xor"), None);
}

#[test]
fn node_wire_shape_uses_type_key_and_hides_collapsed() {
    let mut node = Node::new("N-1", NodeType::BasicEvent, "Seal worn");
    node.collapsed = true;
    let json = serde_json::to_value(&node).unwrap();
    assert_eq!(json["type"], "basic_event");
    assert!(json.get("collapsed").is_none());

    let back: Node = serde_json::from_value(serde_json::json!({
        "id": "N-2",
        "type": "gate",
        "label": "OR",
        "gate_type": "OR",
        "position": {"x": 10.0, "y": 20.0}
    }))
    .unwrap();
    assert_eq!(back.gate_type, Some(GateType::Or));
    assert_eq!(back.position, Position::new(10.0, 20.0));
    assert!(!back.risk.is_scored());
}

#[test]
fn patch_distinguishes_clear_from_keep() {
    let mut node = Node::new("N-1", NodeType::BasicEvent, "Seal worn");
    node.units = Some("mm".to_string());
    node.notes = Some("keep me".to_string());

    let patch = NodePatch {
        label: Some("Seal lip worn".to_string()),
        units: Some(None),
        ..NodePatch::default()
    };
    patch.apply_to(&mut node);

    assert_eq!(node.label, "Seal lip worn");
    assert_eq!(node.units, None);
    assert_eq!(node.notes.as_deref(), Some("keep me"));
}
