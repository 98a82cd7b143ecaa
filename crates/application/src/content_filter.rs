//! 内容过滤
//!
//! 公开模式面向匿名观众和可嵌入的挂件，链接、电话号码一律
//! 替换为占位符；私信模式放行链接但逐个比对拒绝列表，命中的
//! 片段被拦截并上报，调用方必须据此记录违规。两种模式都在
//! 输出前转义标记，写入时过滤一次、渲染时幂等地再过滤一次。

use domain::FilterPattern;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 替换命中的固定占位符
pub const PLACEHOLDER: &str = "[removed]";

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").expect("url pattern is valid")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+?\d[\d\-\s()/.]{6,}\d").expect("phone pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub filtered: String,
    pub blocked: bool,
    pub matched_patterns: Vec<String>,
}

/// 纯函数过滤器，状态只有调用方传入的拒绝列表
pub struct ContentFilter;

impl ContentFilter {
    pub fn filter(body: &str, mode: FilterMode, deny_list: &[FilterPattern]) -> FilterOutcome {
        match mode {
            FilterMode::Public => Self::filter_public(body),
            FilterMode::Private => Self::filter_private(body, deny_list),
        }
    }

    /// 公开模式：链接和电话号码替换为占位符，随后转义标记
    fn filter_public(body: &str) -> FilterOutcome {
        let mut matched = Vec::new();

        let without_urls = URL_RE.replace_all(body, |_: &regex::Captures| {
            matched.push("url".to_string());
            PLACEHOLDER
        });
        let without_phones = PHONE_RE.replace_all(&without_urls, |_: &regex::Captures| {
            matched.push("phone".to_string());
            PLACEHOLDER
        });

        FilterOutcome {
            filtered: escape_markup(&without_phones),
            blocked: false,
            matched_patterns: matched,
        }
    }

    /// 私信模式：链接放行，但逐个比对拒绝列表；
    /// 命中的片段替换为占位符并标记 blocked
    fn filter_private(body: &str, deny_list: &[FilterPattern]) -> FilterOutcome {
        let mut matched = Vec::new();

        let replaced = URL_RE.replace_all(body, |caps: &regex::Captures| {
            let url = &caps[0];
            match matching_pattern(url, deny_list) {
                Some(pattern) => {
                    matched.push(pattern);
                    PLACEHOLDER.to_string()
                }
                None => url.to_string(),
            }
        });

        FilterOutcome {
            filtered: escape_markup(&replaced),
            blocked: !matched.is_empty(),
            matched_patterns: matched,
        }
    }
}

fn matching_pattern(url: &str, deny_list: &[FilterPattern]) -> Option<String> {
    let lowered = url.to_lowercase();
    for entry in deny_list {
        let hit = if entry.is_regex {
            match Regex::new(&entry.pattern) {
                Ok(re) => re.is_match(url),
                Err(err) => {
                    // 版主录入的坏正则不拦截消息本身
                    warn!(pattern = %entry.pattern, error = %err, "拒绝列表正则无效，跳过");
                    false
                }
            }
        } else {
            lowered.contains(&entry.pattern.to_lowercase())
        };
        if hit {
            return Some(entry.pattern.clone());
        }
    }
    None
}

/// 转义标记，阻止存储内容在下游被当作活动标记渲染
fn escape_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn deny(pattern: &str, is_regex: bool) -> FilterPattern {
        FilterPattern {
            id: Uuid::new_v4(),
            pattern: pattern.to_string(),
            is_regex,
        }
    }

    #[test]
    fn public_mode_strips_urls() {
        let bodies = [
            "check https://example.com/x now",
            "www.example.com is great",
            "two: http://a.io and https://b.io",
        ];
        for body in bodies {
            let out = ContentFilter::filter(body, FilterMode::Public, &[]);
            assert!(!out.filtered.contains("http"), "{}", out.filtered);
            assert!(!out.filtered.contains("www."), "{}", out.filtered);
            assert!(out.filtered.contains(PLACEHOLDER));
            assert!(!out.blocked);
        }

        let out = ContentFilter::filter("a: http://a.io b: http://b.io", FilterMode::Public, &[]);
        assert_eq!(out.filtered.matches(PLACEHOLDER).count(), 2);
        assert_eq!(out.matched_patterns, vec!["url", "url"]);
    }

    #[test]
    fn public_mode_strips_phone_numbers() {
        let out = ContentFilter::filter("call me +49 170 1234567 ok", FilterMode::Public, &[]);
        assert!(out.filtered.contains(PLACEHOLDER));
        assert!(!out.filtered.contains("1234567"));
    }

    #[test]
    fn both_modes_escape_markup() {
        let body = "<script>alert('x')</script>";
        for mode in [FilterMode::Public, FilterMode::Private] {
            let out = ContentFilter::filter(body, mode, &[]);
            assert!(!out.filtered.contains('<'));
            assert!(out.filtered.contains("&lt;script&gt;"));
        }
    }

    #[test]
    fn escaping_is_idempotent() {
        let once = escape_markup("a < b");
        // 渲染端会再过滤一次，结果不能继续变化出新的标记
        assert!(!escape_markup(&once).contains('<'));
    }

    #[test]
    fn private_mode_allows_clean_urls() {
        let deny_list = [deny("badhost.example", false)];
        let out = ContentFilter::filter(
            "see https://example.com/schedule",
            FilterMode::Private,
            &deny_list,
        );
        assert!(!out.blocked);
        assert!(out.filtered.contains("example.com/schedule"));
    }

    #[test]
    fn private_mode_blocks_denied_segment_only() {
        let deny_list = [deny("badhost.example", false)];
        let out = ContentFilter::filter(
            "ok https://fine.example and https://badhost.example/p",
            FilterMode::Private,
            &deny_list,
        );
        assert!(out.blocked);
        assert_eq!(out.matched_patterns, vec!["badhost.example"]);
        assert!(out.filtered.contains("fine.example"));
        assert!(out.filtered.contains(PLACEHOLDER));
        assert!(!out.filtered.contains("badhost.example"));
    }

    #[test]
    fn private_mode_supports_regex_patterns() {
        let deny_list = [deny(r"(?i)https?://[^\s]*casino[^\s]*", true)];
        let out = ContentFilter::filter(
            "win big https://super-CASINO.example/now",
            FilterMode::Private,
            &deny_list,
        );
        assert!(out.blocked);
    }

    #[test]
    fn invalid_regex_is_skipped_not_fatal() {
        let deny_list = [deny("(unclosed", true)];
        let out = ContentFilter::filter("https://example.com", FilterMode::Private, &deny_list);
        assert!(!out.blocked);
    }
}
