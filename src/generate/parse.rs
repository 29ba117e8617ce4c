use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::PipelineError;
use crate::graph::{Graph, Link, Node};

pub const MIN_NODES: usize = 3;

pub fn strip_code_fences(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("```") {
        cleaned.push_str(&rest[..start]);
        let mut after = &rest[start + 3..];
        if let Some(stripped) = after.strip_prefix("json") {
            after = stripped;
        }
        after = after
            .strip_prefix("\r\n")
            .or_else(|| after.strip_prefix('\n'))
            .unwrap_or(after);
        rest = after;
    }

    cleaned.push_str(rest);
    cleaned.trim().to_owned()
}

pub fn parse_graph(raw: &str) -> Result<Graph, PipelineError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|error| PipelineError::malformed(format!("invalid JSON: {error}"), raw))?;

    let object = value
        .as_object()
        .ok_or_else(|| PipelineError::malformed("response is not a JSON object", raw))?;
    let raw_nodes = object
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::malformed("`nodes` is missing or not an array", raw))?;
    let raw_links = object
        .get("links")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::malformed("`links` is missing or not an array", raw))?;

    let mut seen = HashSet::with_capacity(raw_nodes.len());
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (index, raw_node) in raw_nodes.iter().enumerate() {
        let mut node = Node::deserialize(raw_node)
            .map_err(|error| PipelineError::malformed(format!("node {index}: {error}"), raw))?;
        node.id = node.id.trim().to_owned();
        if node.id.is_empty() {
            return Err(PipelineError::malformed(format!("node {index} has an empty id"), raw));
        }
        node.clear_layout();

        if seen.insert(node.id.clone()) {
            nodes.push(node);
        } else {
            warn!(id = node.id.as_str(), "dropping node with duplicate id");
        }
    }

    if nodes.len() < MIN_NODES {
        return Err(PipelineError::InsufficientContent {
            nodes: nodes.len(),
            minimum: MIN_NODES,
        });
    }

    let mut links = Vec::with_capacity(raw_links.len());
    for (index, raw_link) in raw_links.iter().enumerate() {
        let mut link = Link::deserialize(raw_link)
            .map_err(|error| PipelineError::malformed(format!("link {index}: {error}"), raw))?;
        link.source = link.source.trim().to_owned();
        link.target = link.target.trim().to_owned();
        links.push(link);
    }

    let mut graph = Graph { nodes, links };
    let dropped = drop_dangling_links(&mut graph);
    if dropped > 0 {
        warn!(dropped, "removed links referencing unknown node ids");
    }

    Ok(graph)
}

pub fn drop_dangling_links(graph: &mut Graph) -> usize {
    let ids = graph
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let before = graph.links.len();
    graph
        .links
        .retain(|link| ids.contains(link.source.as_str()) && ids.contains(link.target.as_str()));
    before - graph.links.len()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const THREE_NODES: &str = r#"{
        "nodes": [
            {"id": "a", "label": "A", "summary": "Root.", "group": 0, "sourceQuote": "alpha"},
            {"id": "b", "label": "B", "summary": "Pillar.", "group": 1, "sourceQuote": ""},
            {"id": "c", "label": "C", "summary": "Detail.", "group": 2}
        ],
        "links": [
            {"source": "a", "target": "b", "reason": "a holds b"},
            {"source": "b", "target": "c", "reason": "b holds c"}
        ]
    }"#;

    fn expect_malformed(raw: &str) {
        match parse_graph(raw) {
            Err(PipelineError::MalformedResponse { raw: attached, .. }) => {
                assert_eq!(attached, raw);
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[test]
    fn accepts_three_connected_nodes() {
        let graph = parse_graph(THREE_NODES).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.nodes[0].source_quote, "alpha");
    }

    #[test]
    fn missing_arrays_are_malformed() {
        expect_malformed(r#"{"links": []}"#);
        expect_malformed(r#"{"nodes": []}"#);
        expect_malformed(r#"{"nodes": {"a": 1}, "links": []}"#);
        expect_malformed(r#"[1, 2, 3]"#);
        expect_malformed("null");
    }

    #[test]
    fn unparseable_text_is_malformed_with_raw_attached() {
        expect_malformed("Sure! Here is your graph: {nodes: ...}");
        expect_malformed("");
    }

    #[test]
    fn schema_mismatch_is_malformed() {
        expect_malformed(r#"{"nodes": [{"label": "no id"}], "links": []}"#);
        expect_malformed(
            r#"{"nodes": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}, {"id": "c", "label": "C"}],
                "links": [{"source": "a"}]}"#,
        );
        expect_malformed(r#"{"nodes": [{"id": " ", "label": "blank"}], "links": []}"#);
    }

    #[test]
    fn two_nodes_are_insufficient() {
        let raw = r#"{"nodes": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}],
                      "links": [{"source": "a", "target": "b", "reason": "r"}]}"#;
        match parse_graph(raw) {
            Err(PipelineError::InsufficientContent { nodes, minimum }) => {
                assert_eq!(nodes, 2);
                assert_eq!(minimum, MIN_NODES);
            }
            other => panic!("expected insufficient content, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_do_not_count_towards_minimum() {
        let raw = r#"{"nodes": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}, {"id": "a", "label": "A2"}],
                      "links": []}"#;
        assert!(matches!(
            parse_graph(raw),
            Err(PipelineError::InsufficientContent { nodes: 2, .. })
        ));
    }

    #[test]
    fn dangling_links_are_dropped() {
        let raw = r#"{"nodes": [{"id": "a", "label": "A"}, {"id": "b", "label": "B"}, {"id": "c", "label": "C"}],
                      "links": [{"source": "a", "target": "b", "reason": "kept"},
                                {"source": "a", "target": "z", "reason": "dropped"}]}"#;
        let graph = parse_graph(raw).unwrap();
        assert_eq!(graph.links, vec![Link::new("a", "b", "kept")]);
    }

    #[test]
    fn padded_ids_still_connect() {
        let raw = r#"{"nodes": [{"id": "root ", "label": "R"}, {"id": " b", "label": "B"}, {"id": "c", "label": "C"}],
                      "links": [{"source": "root ", "target": "b", "reason": "kept"},
                                {"source": " c", "target": "root", "reason": "kept too"}]}"#;
        let graph = parse_graph(raw).unwrap();
        assert_eq!(graph.nodes[0].id, "root");
        assert_eq!(
            graph.links,
            vec![Link::new("root", "b", "kept"), Link::new("c", "root", "kept too")]
        );
    }

    #[test]
    fn fenced_and_bare_responses_parse_identically() {
        let fenced = format!("```json\n{THREE_NODES}\n```");
        let fenced_plain = format!("```\n{THREE_NODES}\n```\n");
        let bare = parse_graph(THREE_NODES).unwrap();
        assert_eq!(parse_graph(&fenced).unwrap(), bare);
        assert_eq!(parse_graph(&fenced_plain).unwrap(), bare);
    }

    #[test]
    fn fence_stripping_is_idempotent() {
        let once = strip_code_fences("```json\n{\"a\": 1}\n```");
        assert_eq!(once, "{\"a\": 1}");
        assert_eq!(strip_code_fences(&once), once);
    }

    #[test]
    fn layout_fields_from_the_model_are_discarded() {
        let raw = r#"{"nodes": [{"id": "a", "label": "A", "x": 4.0, "fx": 1.0},
                                {"id": "b", "label": "B"}, {"id": "c", "label": "C"}],
                      "links": []}"#;
        let graph = parse_graph(raw).unwrap();
        assert_eq!(graph.nodes[0].x, None);
        assert_eq!(graph.nodes[0].fx, None);
    }
}
