//! Canonical field vocabulary and the alias dictionary used to recognize it.
//!
//! [`CanonicalField`] is the fixed set of logical columns every analysis runs
//! on. [`FieldDictionary`] maps each field to lower-cased alias keywords; a
//! source column belongs to the first field (in declaration order) that has
//! an alias contained in the column's lower-cased name.
//!
//! The dictionary is a plain value handed to the mapper per call. The
//! built-in vocabulary is available through [`FieldDictionary::default`], and
//! custom vocabularies can be loaded from YAML:
//!
//! ```yaml
//! date: [date, 发布时间]
//! platform: [platform, 平台]
//! engagement: [likes, comments]
//! ```

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    Platform,
    ContentType,
    Engagement,
    Reach,
    Conversion,
    Content,
    UserType,
    Sentiment,
    Followers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Timestamp,
    Category,
    FreeText,
    Metric,
}

impl CanonicalField {
    /// Declaration order; classification walks fields in this order.
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Date,
        CanonicalField::Platform,
        CanonicalField::ContentType,
        CanonicalField::Engagement,
        CanonicalField::Reach,
        CanonicalField::Conversion,
        CanonicalField::Content,
        CanonicalField::UserType,
        CanonicalField::Sentiment,
        CanonicalField::Followers,
    ];

    pub const METRICS: [CanonicalField; 4] = [
        CanonicalField::Engagement,
        CanonicalField::Reach,
        CanonicalField::Conversion,
        CanonicalField::Followers,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Platform => "platform",
            CanonicalField::ContentType => "content_type",
            CanonicalField::Engagement => "engagement",
            CanonicalField::Reach => "reach",
            CanonicalField::Conversion => "conversion",
            CanonicalField::Content => "content",
            CanonicalField::UserType => "user_type",
            CanonicalField::Sentiment => "sentiment",
            CanonicalField::Followers => "followers",
        }
    }

    pub const fn semantic_type(&self) -> SemanticType {
        match self {
            CanonicalField::Date => SemanticType::Timestamp,
            CanonicalField::Platform
            | CanonicalField::ContentType
            | CanonicalField::UserType
            | CanonicalField::Sentiment => SemanticType::Category,
            CanonicalField::Content => SemanticType::FreeText,
            CanonicalField::Engagement
            | CanonicalField::Reach
            | CanonicalField::Conversion
            | CanonicalField::Followers => SemanticType::Metric,
        }
    }

    pub const fn is_metric(&self) -> bool {
        matches!(self.semantic_type(), SemanticType::Metric)
    }

    /// Position in [`CanonicalField::ALL`].
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| anyhow!("Unknown canonical field '{value}'"))
    }
}

const DEFAULT_ALIASES: [(CanonicalField, &[&str]); 10] = [
    (
        CanonicalField::Date,
        &[
            "date",
            "timestamp",
            "publish_time",
            "post_time",
            "created_at",
            "日期",
            "时间",
            "发布于",
        ],
    ),
    (CanonicalField::Platform, &["platform", "channel", "平台", "渠道"]),
    (
        CanonicalField::ContentType,
        &[
            "content_type",
            "content type",
            "post_type",
            "media_type",
            "post_format",
            "内容类型",
            "内容形式",
            "帖子类型",
            "体裁",
        ],
    ),
    (
        CanonicalField::Engagement,
        &[
            "engagement",
            "interaction",
            "like",
            "comment",
            "share",
            "repost",
            "互动",
            "点赞",
            "评论",
            "转发",
            "分享",
            "收藏",
        ],
    ),
    (
        CanonicalField::Reach,
        &[
            "reach",
            "impression",
            "view",
            "exposure",
            "曝光",
            "阅读",
            "浏览",
            "播放量",
            "播放数",
            "播放次数",
            "展现",
        ],
    ),
    (CanonicalField::Conversion, &["conversion", "转化", "成交"]),
    (
        CanonicalField::Content,
        &[
            "content", "text", "title", "body", "message", "内容", "正文", "标题", "文案",
        ],
    ),
    (
        CanonicalField::UserType,
        &[
            "user_type",
            "user type",
            "account_type",
            "audience",
            "用户类型",
            "账号类型",
            "用户群体",
        ],
    ),
    (CanonicalField::Sentiment, &["sentiment", "emotion", "情感", "情绪"]),
    (
        CanonicalField::Followers,
        &["follower", "fans", "subscriber", "粉丝", "关注者", "订阅"],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldDictionary {
    aliases: BTreeMap<CanonicalField, Vec<String>>,
}

impl Default for FieldDictionary {
    fn default() -> Self {
        Self::from_entries(
            DEFAULT_ALIASES
                .iter()
                .map(|(field, aliases)| (*field, aliases.iter().map(|a| a.to_string()).collect())),
        )
    }
}

impl FieldDictionary {
    /// Builds a dictionary from `(field, aliases)` pairs. Aliases are trimmed
    /// and lower-cased; empty ones are discarded.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalField, Vec<String>)>,
    {
        let mut aliases: BTreeMap<CanonicalField, Vec<String>> = BTreeMap::new();
        for (field, list) in entries {
            let slot = aliases.entry(field).or_default();
            for alias in list {
                let normalized = alias.trim().to_lowercase();
                if !normalized.is_empty() && !slot.contains(&normalized) {
                    slot.push(normalized);
                }
            }
        }
        Self { aliases }
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.aliases
            .get(&field)
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }

    /// Returns the first field, in declaration order, with an alias contained
    /// in the lower-cased `column` name.
    pub fn classify(&self, column: &str) -> Option<CanonicalField> {
        let lowered = column.trim().to_lowercase();
        CanonicalField::ALL.iter().copied().find(|field| {
            self.aliases(*field)
                .iter()
                .any(|alias| lowered.contains(alias.as_str()))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening dictionary file {path:?}"))?;
        let reader = BufReader::new(file);
        let raw: BTreeMap<CanonicalField, Vec<String>> =
            serde_yaml::from_reader(reader).context("Parsing dictionary YAML")?;
        Ok(Self::from_entries(raw))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing dictionary to YAML string")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating dictionary file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing dictionary YAML")
    }
}
