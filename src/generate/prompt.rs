use std::fmt::Write;

use crate::config::Depth;

pub const MAX_ARTICLE_CHARS: usize = 100_000;

const PREAMBLE: &str = r#"# ROLE
You are a knowledge architect. Turn the article below into a two-tier knowledge graph that mirrors
the natural hierarchy of its ideas.

# STRUCTURE
- ROOT (id "root", group 0): one node naming the central subject of the article. It must be the
  most connected node of the graph.
- PILLARS (group 1): the high-level themes or core concepts that hold up the root.
- DETAILS (group 2 and above): facts, examples or sub-concepts that substantiate a pillar. Give all
  details of the same pillar the same group number.

# CONNECTIVITY
1. Every pillar links to the root.
2. Every detail links to its parent pillar; the reason says how the detail supports it.
3. Link two pillars only when the article draws a direct bridge or dependency between them.
4. Pillars must end up with more connections than details.

# CONTENT
1. summary: exactly two sentences grounded in the article text.
2. sourceQuote: a verbatim excerpt of the article supporting the node, or "" if none exists.
3. reason: exactly one sentence explaining the relationship.
4. Ids are short, unique, lowercase strings; links reference ids only.
"#;

const OUTPUT_FORMAT: &str = r#"# OUTPUT FORMAT
Return a single JSON object and nothing else: no introduction, no explanation, no markdown code
fences.
{
  "nodes": [{"id": "string", "label": "string", "summary": "string", "group": 0, "sourceQuote": "string"}],
  "links": [{"source": "string", "target": "string", "reason": "string"}]
}
"#;

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn depth_modifier(depth: Depth) -> String {
    let (min_pillars, max_pillars) = depth.pillars();
    let (min_details, max_details) = depth.details_per_pillar();
    let (min_nodes, max_nodes) = depth.node_range();
    let focus = match depth {
        Depth::Minimal => "Keep only the essential ideas; prefer fewer, broader pillars.",
        Depth::Moderate => "Balance coverage and readability.",
        Depth::Extensive => {
            "Cover the article thoroughly, including secondary themes and supporting evidence."
        }
    };

    let mut modifier = String::new();
    let _ = writeln!(modifier, "# DEPTH: {}", depth.label().to_uppercase());
    let _ = writeln!(modifier, "- {min_pillars}-{max_pillars} pillars.");
    let _ = writeln!(modifier, "- {min_details}-{max_details} details per pillar.");
    let _ = writeln!(modifier, "- {min_nodes}-{max_nodes} nodes in total.");
    let _ = writeln!(modifier, "- {focus}");
    modifier
}

pub fn build_prompt(article: &str, depth: Depth) -> String {
    let article = truncate_chars(article, MAX_ARTICLE_CHARS);
    let modifier = depth_modifier(depth);

    let mut prompt = String::with_capacity(
        PREAMBLE.len() + modifier.len() + OUTPUT_FORMAT.len() + article.len() + 32,
    );
    prompt.push_str(PREAMBLE);
    prompt.push('\n');
    prompt.push_str(&modifier);
    prompt.push('\n');
    prompt.push_str(OUTPUT_FORMAT);
    prompt.push_str("\nArticle content:\n");
    prompt.push_str(article);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn prompt_caps_article_length() {
        let article = "x".repeat(MAX_ARTICLE_CHARS + 500);
        let prompt = build_prompt(&article, Depth::Moderate);
        let tail = prompt.rsplit("Article content:\n").next().unwrap();
        assert_eq!(tail.chars().count(), MAX_ARTICLE_CHARS);
    }

    #[test]
    fn depth_changes_targets() {
        let minimal = build_prompt("text", Depth::Minimal);
        let extensive = build_prompt("text", Depth::Extensive);
        assert!(minimal.contains("# DEPTH: MINIMAL"));
        assert!(minimal.contains("2-3 pillars."));
        assert!(extensive.contains("5-7 pillars."));
        assert!(extensive.contains("3-5 details per pillar."));
    }

    #[test]
    fn prompt_forbids_fences() {
        let prompt = build_prompt("text", Depth::Moderate);
        assert!(prompt.contains("no markdown code"));
        assert!(prompt.ends_with("Article content:\ntext"));
    }
}
