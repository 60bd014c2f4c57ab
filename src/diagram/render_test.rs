use super::*;
use serde_json::json;

fn data(value: serde_json::Value) -> DiagramData {
    DiagramData::from_value(&value).unwrap()
}

// =============================================================================
// Flowchart
// =============================================================================

#[test]
fn flowchart_start_and_process_nodes_with_plain_arrow() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "startNode", "type": "start", "text": "Begin" },
            { "id": "n1", "type": "process", "text": "Do work" }
        ],
        "connections": [{ "from": "startNode", "to": "n1" }]
    }));
    let code = render(&d).unwrap();
    assert_eq!(
        code,
        "graph TD\n    startNode((\"Begin\"))\n    n1[\"Do work\"]\n    startNode --> n1\n"
    );
}

#[test]
fn flowchart_shapes_per_kind() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "q", "type": "decision", "text": "Valid?" },
            { "id": "io", "type": "inputoutput", "text": "Read" },
            { "id": "sub", "type": "subroutine", "text": "Call" },
            { "id": "db", "type": "database", "text": "Store" },
            { "id": "done", "type": "end", "text": "Stop" }
        ],
        "connections": []
    }));
    let code = render(&d).unwrap();
    assert!(code.contains("q{\"Valid?\"}"));
    assert!(code.contains("io[/\"Read\"/]"));
    assert!(code.contains("sub[[\"Call\"]]"));
    assert!(code.contains("db[\"Store\"]"));
    assert!(code.contains("done((\"Stop\"))"));
}

#[test]
fn flowchart_labels_are_quoted_and_escaped() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "a", "type": "process", "text": "Say \"hi\"\nthen (wait)" },
            { "id": "b", "type": "process", "text": "B" }
        ],
        "connections": [{ "from": "a", "to": "b", "label": "yes; really" }]
    }));
    let code = render(&d).unwrap();
    assert!(code.contains("a[\"Say #quot;hi#quot;<br/>then (wait)\"]"));
    assert!(code.contains("a -- \"yes; really\" --> b"));
}

#[test]
fn flowchart_blank_label_renders_plain_arrow() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "a", "type": "process", "text": "A" },
            { "id": "b", "type": "process", "text": "B" }
        ],
        "connections": [{ "from": "a", "to": "b", "label": "  " }]
    }));
    assert!(render(&d).unwrap().contains("    a --> b\n"));
}

#[test]
fn flowchart_reserved_ids_are_suffixed_consistently() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "start", "type": "start", "text": "Go" },
            { "id": "end", "type": "end", "text": "Stop" }
        ],
        "connections": [{ "from": "start", "to": "end" }]
    }));
    let code = render(&d).unwrap();
    assert!(code.contains("start_node((\"Go\"))"));
    assert!(code.contains("end_node((\"Stop\"))"));
    assert!(code.contains("start_node --> end_node"));
}

#[test]
fn flowchart_ids_are_sanitized_like_other_identifiers() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "check (a)", "type": "decision", "text": "A?" },
            { "id": "x;\"y", "type": "process", "text": "B" }
        ],
        "connections": [{ "from": "check (a)", "to": "x;\"y" }]
    }));
    let code = render(&d).unwrap();
    assert_eq!(code, "graph TD\n    check__a_{\"A?\"}\n    x__y[\"B\"]\n    check__a_ --> x__y\n");
}

#[test]
fn flowchart_ids_colliding_after_sanitizing_are_rejected() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "a b", "type": "process", "text": "First" },
            { "id": "a_b", "type": "decision", "text": "Second" }
        ],
        "connections": [{ "from": "a b", "to": "a_b" }]
    }));
    let err = render(&d).unwrap_err();
    assert!(matches!(err, RenderError::ConversionFailed { diagram_type: DiagramType::Flowchart, .. }));
}

#[test]
fn reserved_id_suffix_cannot_merge_with_a_real_node() {
    let err = render_value(&json!({
        "diagramType": "Flowchart",
        "elements": [
            { "id": "start", "type": "start", "text": "Go" },
            { "id": "start_node", "type": "process", "text": "Work" }
        ],
        "connections": [{ "from": "start", "to": "start_node" }]
    }))
    .unwrap_err();
    assert!(matches!(err, RenderError::ConversionFailed { diagram_type: DiagramType::Flowchart, .. }));
}

#[test]
fn flowchart_dangling_reference_is_conversion_failure() {
    let d = data(json!({
        "diagramType": "Flowchart",
        "elements": [{ "id": "a", "type": "process", "text": "A" }],
        "connections": [{ "from": "a", "to": "missing" }]
    }));
    let err = render(&d).unwrap_err();
    assert!(matches!(err, RenderError::ConversionFailed { diagram_type: DiagramType::Flowchart, .. }));
}

#[test]
fn render_is_deterministic() {
    let value = json!({
        "diagramType": "Flowchart",
        "title": "x",
        "elements": [
            { "id": "a", "type": "process", "text": "A" },
            { "id": "b", "type": "decision", "text": "B" }
        ],
        "connections": [{ "from": "a", "to": "b", "label": "next" }]
    });
    let first = render_value(&value).unwrap();
    let second = render_value(&value).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// render_value errors
// =============================================================================

#[test]
fn unknown_type_is_unsupported() {
    let err = render_value(&json!({ "diagramType": "Mindmap" })).unwrap_err();
    assert_eq!(err, RenderError::UnsupportedDiagramType("Mindmap".into()));
}

#[test]
fn missing_type_is_unsupported() {
    let err = render_value(&json!({ "elements": [] })).unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedDiagramType(_)));
}

#[test]
fn missing_arrays_is_conversion_failure() {
    let err = render_value(&json!({ "diagramType": "ER", "entities": [] })).unwrap_err();
    assert!(matches!(err, RenderError::ConversionFailed { diagram_type: DiagramType::Er, .. }));
}

// =============================================================================
// Sequence
// =============================================================================

#[test]
fn sequence_arrows_per_message_kind() {
    let d = data(json!({
        "diagramType": "Sequence",
        "title": "Login",
        "actors": ["Client", "Server"],
        "messages": [
            { "sender": "Client", "receiver": "Server", "message": "POST /login", "type": "sync" },
            { "sender": "Client", "receiver": "Server", "message": "ping", "type": "async" },
            { "sender": "Server", "receiver": "Client", "message": "200", "type": "reply" },
            { "sender": "Server", "receiver": "Client", "message": "event", "type": "async_reply" }
        ]
    }));
    let code = render(&d).unwrap();
    assert_eq!(
        code,
        "sequenceDiagram\n    title Login\n    participant Client\n    participant Server\n    \
         Client->>Server: POST /login\n    Client->>Server: ping\n    Server-->Client: 200\n    \
         Server-->>Client: event\n"
    );
}

#[test]
fn sequence_aliases_non_identifier_actors_and_tolerates_undeclared() {
    let d = data(json!({
        "diagramType": "Sequence",
        "actors": ["Web App"],
        "messages": [{ "sender": "Web App", "receiver": "Auth Service", "message": "a; b", "type": "sync" }]
    }));
    let code = render(&d).unwrap();
    assert!(code.contains("participant Web_App as Web App"));
    assert!(code.contains("Web_App->>Auth_Service: a#59; b"));
    assert!(!code.contains("title"));
}

// =============================================================================
// ER
// =============================================================================

#[test]
fn er_one_to_many_token_and_quoted_label() {
    let d = data(json!({
        "diagramType": "ER",
        "entities": [
            { "name": "User", "attributes": [{ "name": "id", "type": "int", "key": "PK" }] },
            { "name": "Post", "attributes": [
                { "name": "id", "type": "int", "key": "PK" },
                { "name": "user_id", "type": "int", "key": "FK" },
                { "name": "body", "type": "text" }
            ] }
        ],
        "relationships": [
            { "fromEntity": "User", "toEntity": "Post", "relationshipType": "one-to-many", "label": "writes" }
        ]
    }));
    let code = render(&d).unwrap();
    assert!(code.starts_with("erDiagram\n"));
    assert!(code.contains("    User {\n        int id PK\n    }\n"));
    assert!(code.contains("        text body\n"));
    assert!(code.contains("User ||--o{ Post : \"writes\""));
}

#[test]
fn er_cardinality_tokens() {
    let rel = |kind: &str| {
        data(json!({
            "diagramType": "ER",
            "entities": [{ "name": "A" }, { "name": "B" }],
            "relationships": [{ "fromEntity": "A", "toEntity": "B", "relationshipType": kind }]
        }))
    };
    assert!(render(&rel("one-to-one")).unwrap().contains("A ||--|| B : \"\""));
    assert!(render(&rel("one-to-many")).unwrap().contains("A ||--o{ B : \"\""));
    assert!(render(&rel("many-to-one")).unwrap().contains("A o{--|| B : \"\""));
    assert!(render(&rel("many-to-many")).unwrap().contains("A o{--o{ B : \"\""));
}

// =============================================================================
// Gantt
// =============================================================================

#[test]
fn gantt_task_fields_in_status_id_range_order() {
    let d = data(json!({
        "diagramType": "Gantt",
        "title": "Launch",
        "dateFormat": "YYYY-MM-DD",
        "axisFormat": "%m/%d",
        "sections": [{
            "name": "Build",
            "tasks": [
                { "name": "Design", "start": "2024-01-01", "end": "2024-01-05", "id": "t1", "status": "done" },
                { "name": "Code", "start": "after t1", "end": "10d", "status": "pending" },
                { "name": "Ship: v1", "start": "2024-02-01", "end": "2024-02-02", "status": "crit" }
            ]
        }]
    }));
    let code = render(&d).unwrap();
    assert_eq!(
        code,
        "gantt\n    title Launch\n    dateFormat YYYY-MM-DD\n    axisFormat %m/%d\n    section Build\n    \
         Design :done, t1, 2024-01-01, 2024-01-05\n    Code :after t1, 10d\n    \
         Ship- v1 :crit, 2024-02-01, 2024-02-02\n"
    );
}

#[test]
fn gantt_omits_absent_axis_format() {
    let d = data(json!({
        "diagramType": "Gantt",
        "title": "T",
        "dateFormat": "YYYY-MM-DD",
        "sections": []
    }));
    assert_eq!(render(&d).unwrap(), "gantt\n    title T\n    dateFormat YYYY-MM-DD\n");
}
