//! The four-block analysis summary handed to reporting and prompt collaborators.

use std::fmt::{self, Write as _};

use anyhow::{Context, Result};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};

use crate::data::format_number;

/// A single reported value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Number(f64),
    Text(String),
}

impl Metric {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Metric::Number(value) => Some(*value),
            Metric::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Metric::Text(value) => Some(value),
            Metric::Number(_) => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Number(value) => f.write_str(&format_number(*value)),
            Metric::Text(value) => f.write_str(value),
        }
    }
}

/// A flat, insertion-ordered map from label to value. Non-finite numbers
/// never enter a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    entries: Vec<(String, Metric)>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a number, replacing any earlier value under `label`.
    /// Returns `false` and leaves the block untouched for NaN or infinity.
    pub fn insert_number(&mut self, label: impl Into<String>, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.put(label.into(), Metric::Number(value));
        true
    }

    pub fn insert_text(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.put(label.into(), Metric::Text(value.into()));
    }

    fn put(&mut self, label: String, value: Metric) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Metric> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value)
    }

    pub fn number(&self, label: &str) -> Option<f64> {
        self.get(label).and_then(Metric::as_number)
    }

    pub fn text(&self, label: &str) -> Option<&str> {
        self.get(label).and_then(Metric::as_text)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), value))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

struct BlockVisitor;

impl<'de> Visitor<'de> for BlockVisitor {
    type Value = Block;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of labels to numbers or strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Block, A::Error> {
        let mut block = Block::new();
        while let Some((label, value)) = access.next_entry::<String, Metric>()? {
            match value {
                Metric::Number(number) => {
                    block.insert_number(label, number);
                }
                Metric::Text(text) => block.insert_text(label, text),
            }
        }
        Ok(block)
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BlockVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub overview: Block,
    #[serde(default)]
    pub growth: Block,
    #[serde(default)]
    pub correlation: Block,
    #[serde(default)]
    pub trends: Block,
}

impl AnalysisResult {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Serializing analysis result")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing analysis result")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Parsing analysis result JSON")
    }

    /// Blocks in wire order, with their prompt section headings.
    pub fn sections(&self) -> [(&'static str, &Block); 4] {
        [
            ("基本统计", &self.overview),
            ("增长分析", &self.growth),
            ("相关性分析", &self.correlation),
            ("趋势分析", &self.trends),
        ]
    }

    /// Plain-text context for the text-generation collaborator. Empty blocks
    /// keep their heading so the layout is stable.
    pub fn to_prompt_context(&self, platform: &str) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "平台: {platform}");
        for (heading, block) in self.sections() {
            let _ = writeln!(output);
            let _ = writeln!(output, "{heading}:");
            for (label, value) in block.iter() {
                let _ = writeln!(output, "- {label}: {value}");
            }
        }
        output
    }
}
