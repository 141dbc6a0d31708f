use std::{fmt, str::FromStr};

use anyhow::anyhow;
use itertools::Itertools;

use crate::{cleaner::CleanTable, mapper::DEFAULT_CATEGORY_LABEL};

/// Platforms with a known set of platform-specific metric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Weibo,
    WeChat,
    Douyin,
    Xiaohongshu,
    Bilibili,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Weibo,
        Platform::WeChat,
        Platform::Douyin,
        Platform::Xiaohongshu,
        Platform::Bilibili,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            Platform::Weibo => "微博",
            Platform::WeChat => "微信",
            Platform::Douyin => "抖音",
            Platform::Xiaohongshu => "小红书",
            Platform::Bilibili => "B站",
        }
    }

    const fn aliases(&self) -> &'static [&'static str] {
        match self {
            Platform::Weibo => &["weibo", "新浪微博"],
            Platform::WeChat => &["wechat", "weixin", "公众号", "微信公众号"],
            Platform::Douyin => &["douyin", "tiktok"],
            Platform::Xiaohongshu => &["xiaohongshu", "rednote", "red", "xhs"],
            Platform::Bilibili => &["bilibili", "b站", "哔哩哔哩"],
        }
    }

    /// Auxiliary columns correlated against engagement, in report order.
    pub const fn correlation_columns(&self) -> [&'static str; 3] {
        match self {
            Platform::Weibo => ["转发量", "评论量", "点赞量"],
            Platform::WeChat => ["阅读量", "在看量", "分享量"],
            Platform::Douyin => ["播放量", "完播率", "平均播放时长"],
            Platform::Xiaohongshu => ["收藏量", "关注量", "搜索量"],
            Platform::Bilibili => ["播放量", "弹幕量", "投币量"],
        }
    }

    /// Resolves a platform name or English alias, ignoring case.
    pub fn resolve(value: &str) -> Option<Platform> {
        let normalized = value.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Platform::ALL.iter().copied().find(|platform| {
            platform.label().to_lowercase() == normalized
                || platform.aliases().iter().any(|alias| *alias == normalized)
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        Platform::resolve(value).ok_or_else(|| anyhow!("Unknown platform '{value}'"))
    }
}

/// Most frequent platform value in the table, ignoring blanks and the
/// synthesized sentinel. Ties go to the value seen first.
pub fn modal_platform(table: &CleanTable) -> Option<&str> {
    let counts = table
        .records()
        .iter()
        .map(|record| record.platform.as_str())
        .filter(|value| !value.is_empty() && *value != DEFAULT_CATEGORY_LABEL)
        .counts();
    let best = counts.values().copied().max()?;
    table
        .records()
        .iter()
        .map(|record| record.platform.as_str())
        .find(|value| counts.get(value) == Some(&best))
}

/// Platform for correlation: the hint when given, otherwise the table's
/// modal platform value.
pub fn resolve_for_table(hint: Option<&str>, table: &CleanTable) -> Option<Platform> {
    match hint {
        Some(hint) => Platform::resolve(hint),
        None => modal_platform(table).and_then(Platform::resolve),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_labels_and_aliases() {
        assert_eq!(Platform::resolve("微博"), Some(Platform::Weibo));
        assert_eq!(Platform::resolve(" WeChat "), Some(Platform::WeChat));
        assert_eq!(Platform::resolve("TikTok"), Some(Platform::Douyin));
        assert_eq!(Platform::resolve("b站"), Some(Platform::Bilibili));
        assert_eq!(Platform::resolve("RedNote"), Some(Platform::Xiaohongshu));
        assert_eq!(Platform::resolve("myspace"), None);
        assert_eq!(Platform::resolve(""), None);
    }

    #[test]
    fn correlation_columns_follow_platform() {
        assert_eq!(
            Platform::Douyin.correlation_columns(),
            ["播放量", "完播率", "平均播放时长"]
        );
        assert_eq!("bilibili".parse::<Platform>().unwrap().label(), "B站");
        assert!("nowhere".parse::<Platform>().is_err());
    }
}
