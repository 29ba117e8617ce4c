use serde::{Deserialize, Deserializer, Serialize};

pub type NodeId = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "deserialize_group")]
    pub group: u32,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub source_quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f32>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, group: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            summary: String::new(),
            group,
            source_quote: String::new(),
            x: None,
            y: None,
            vx: None,
            vy: None,
            fx: None,
            fy: None,
        }
    }

    pub fn clear_layout(&mut self) {
        self.x = None;
        self.y = None;
        self.vx = None;
        self.vy = None;
        self.fx = None;
        self.fy = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub reason: String,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(self.target.as_str())
        } else if self.target == id {
            Some(self.source.as_str())
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    #[cfg(test)]
    pub fn without_layout(&self) -> Self {
        let mut graph = self.clone();
        for node in &mut graph.nodes {
            node.clear_layout();
        }
        graph
    }
}

// Models occasionally emit the group as a float or a numeric string ("group": "2").
fn deserialize_group<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawGroup {
        Number(u32),
        Float(f64),
        Text(String),
    }

    let group = match RawGroup::deserialize(deserializer)? {
        RawGroup::Number(group) => return Ok(group),
        RawGroup::Float(value) => integral_group(value),
        RawGroup::Text(ref text) => text.trim().parse::<f64>().ok().and_then(integral_group),
    };
    group.ok_or_else(|| serde::de::Error::custom("group must be a non-negative integer"))
}

fn integral_group(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value)).then(|| value as u32)
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
