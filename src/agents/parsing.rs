//! 模型输出的尽力解析
//!
//! 所有解析函数对任意输入都不 panic；解析不出结构时返回 `Parsed::Unstructured`，
//! 由 Agent 把原文保存在 `*_raw` 字段中。

use std::collections::BTreeMap;

use regex::Regex;

use crate::core::state::{map, Value};

/// 解析结果：结构化条目，或保留原文
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(Vec<T>),
    Unstructured { raw: String },
}

impl<T> Parsed<T> {
    fn from_items(items: Vec<T>, raw: &str) -> Self {
        if items.is_empty() {
            Parsed::Unstructured {
                raw: raw.to_string(),
            }
        } else {
            Parsed::Structured(items)
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Parsed::Structured(items) => items,
            Parsed::Unstructured { .. } => &[],
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Parsed::Structured(_) => None,
            Parsed::Unstructured { raw } => Some(raw),
        }
    }
}

/// 去掉 `</think>` 之前的推理段，并把 3 个以上连续换行压成 2 个
pub fn clean_response(text: &str) -> String {
    let text = match text.split_once("</think>") {
        Some((_, rest)) => rest,
        None => text,
    };
    let mut cleaned = text.trim().to_string();
    if let Ok(re) = Regex::new(r"\n{3,}") {
        cleaned = re.replace_all(&cleaned, "\n\n").to_string();
    }
    cleaned
}

/// 列表项（`-`、`•`、`*`、`1.`、`1)` 开头的行），去掉标记
pub fn bullet_items(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"^\s*(?:[-•*]|\d+[.)])\s+(.*)$") else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|item| !item.is_empty())
        .collect()
}

fn bullet_content(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix('-')
        .or_else(|| line.strip_prefix('•'))
        .or_else(|| line.strip_prefix('*'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn section_title(line: &str) -> Option<&str> {
    let line = line.trim();
    line.starts_with('#')
        .then(|| line.trim_start_matches('#').trim())
        .filter(|s| !s.is_empty())
}

/// 趋势报告的计数摘要：趋势 / 机会 / 风险条目数与报告中的主题标题
pub fn extract_insights(report: &str) -> Value {
    let mut trends = 0usize;
    let mut opportunities = 0usize;
    let mut risks = 0usize;
    let mut themes = Vec::new();
    let mut formats = Vec::new();
    let mut section = String::new();

    for line in report.lines() {
        if let Some(title) = section_title(line) {
            section = title.to_lowercase();
            themes.push(title.to_string());
            continue;
        }
        let Some(item) = bullet_content(line) else {
            continue;
        };
        let lower = item.to_lowercase();
        if lower.contains("trend") {
            trends += 1;
        } else if lower.contains("opportunit") {
            opportunities += 1;
        } else if lower.contains("risk") || lower.contains("warning") {
            risks += 1;
        }
        if section.contains("opportunit") || section.contains("format") {
            formats.push(item.to_string());
        }
    }

    map([
        ("trend_count", Value::from(trends)),
        ("opportunity_count", Value::from(opportunities)),
        ("risk_count", Value::from(risks)),
        ("key_themes", Value::from(themes)),
        ("recommended_formats", Value::from(formats)),
    ])
}

/// 策略文本按标题分段后的结构
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategySections {
    pub raw_text: String,
    pub objectives: Vec<String>,
    pub content_pillars: Vec<String>,
    pub platforms: Vec<String>,
    pub kpis: Vec<String>,
}

impl StrategySections {
    pub fn to_value(&self) -> Value {
        map([
            ("raw_text", Value::from(self.raw_text.as_str())),
            ("objectives", Value::from(self.objectives.clone())),
            ("content_pillars", Value::from(self.content_pillars.clone())),
            ("platforms", Value::from(self.platforms.clone())),
            ("kpis", Value::from(self.kpis.clone())),
        ])
    }
}

pub fn parse_strategy(text: &str) -> StrategySections {
    let mut sections = StrategySections {
        raw_text: text.to_string(),
        ..StrategySections::default()
    };
    let mut current = String::new();

    for line in text.lines() {
        if let Some(title) = section_title(line) {
            current = title.to_lowercase();
            continue;
        }
        let Some(item) = bullet_content(line) else {
            continue;
        };
        let item = item.to_string();
        if current.contains("target") || current.contains("objective") {
            sections.objectives.push(item);
        } else if current.contains("pillar") || current.contains("theme") {
            sections.content_pillars.push(item);
        } else if current.contains("platform") || current.contains("channel") {
            sections.platforms.push(item);
        } else if current.contains("kpi") || current.contains("metric") {
            sections.kpis.push(item);
        }
    }
    sections
}

/// 日历中的一天
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEntry {
    pub day: String,
    pub content_type: String,
    pub platform: String,
    pub theme: String,
    pub description: String,
}

impl CalendarEntry {
    pub fn to_value(&self) -> Value {
        map([
            ("day", Value::from(self.day.as_str())),
            ("type", Value::from(self.content_type.as_str())),
            ("platform", Value::from(self.platform.as_str())),
            ("theme", Value::from(self.theme.as_str())),
            ("description", Value::from(self.description.as_str())),
        ])
    }
}

fn is_separator_row(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// `Day | Content Type | Platform | Theme | Brief Description` 表格；
/// 兼容 Markdown 表格两侧的竖线，跳过表头与分隔行，少于 5 列的行忽略
pub fn parse_calendar(text: &str) -> Parsed<CalendarEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.contains('|') {
            continue;
        }
        let inner = line.trim_start_matches('|').trim_end_matches('|');
        let cells: Vec<&str> = inner.split('|').map(str::trim).collect();
        if cells.len() < 5 || is_separator_row(&cells) || cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if cells[0].to_lowercase().starts_with("day") {
            continue;
        }
        entries.push(CalendarEntry {
            day: cells[0].trim_matches('*').to_string(),
            content_type: cells[1].to_string(),
            platform: cells[2].to_string(),
            theme: cells[3].to_string(),
            description: cells[4..].join(" | "),
        });
    }
    Parsed::from_items(entries, text)
}

/// 一条视觉建议：中文/本地化描述 + 给图像模型的提示词
#[derive(Debug, Clone, PartialEq)]
pub struct VisualSuggestion {
    pub description: String,
    pub prompt: String,
}

impl VisualSuggestion {
    pub fn to_value(&self) -> Value {
        map([
            ("description", Value::from(self.description.as_str())),
            ("prompt", Value::from(self.prompt.as_str())),
        ])
    }
}

/// 每行 `description: ...||prompt: ...`；两部分都非空才收录
pub fn parse_visual_suggestions(text: &str) -> Parsed<VisualSuggestion> {
    let strip_label = |part: &str, label: &str| -> String {
        let part = part.trim();
        match part.get(..label.len()) {
            Some(head) if head.eq_ignore_ascii_case(label) => part[label.len()..].trim().to_string(),
            _ => part.to_string(),
        }
    };

    let suggestions = text
        .lines()
        .filter_map(|line| line.split_once("||"))
        .map(|(desc, prompt)| VisualSuggestion {
            description: strip_label(desc, "description:"),
            prompt: strip_label(prompt, "prompt:"),
        })
        .filter(|s| !s.description.is_empty() && !s.prompt.is_empty())
        .collect();
    Parsed::from_items(suggestions, text)
}

/// `## platform` 分段 -> (平台名小写, 段落正文)
pub fn parse_platform_sections(text: &str) -> Parsed<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if let Some(title) = section_title(line) {
            sections.push((title.to_lowercase(), String::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            if !body.is_empty() || !line.trim().is_empty() {
                body.push_str(line);
                body.push('\n');
            }
        }
    }
    let sections = sections
        .into_iter()
        .map(|(platform, body)| (platform, body.trim().to_string()))
        .filter(|(_, body)| !body.is_empty())
        .collect();
    Parsed::from_items(sections, text)
}

/// (平台, 正文) 列表转为 Map 值
pub fn sections_to_value(sections: &[(String, String)]) -> Value {
    Value::Map(
        sections
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response_strips_think_and_blank_lines() {
        let raw = "<think>reasoning\nmore</think>\n\nHello\n\n\n\nWorld  ";
        assert_eq!(clean_response(raw), "Hello\n\nWorld");
        assert_eq!(clean_response("plain"), "plain");
    }

    #[test]
    fn test_calendar_with_markdown_pipes() {
        let text = "| Day | Content Type | Platform | Theme | Brief Description |\n\
                    |---|---|---|---|---|\n\
                    | 1 | reel | instagram | tips | Five quick tips |\n\
                    | 2 | post | facebook | story | Founder story |\n\
                    | 3 | short | tiktok |";
        let parsed = parse_calendar(text);
        let items = parsed.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].day, "1");
        assert_eq!(items[0].platform, "instagram");
        assert_eq!(items[1].description, "Founder story");
    }

    #[test]
    fn test_calendar_without_table_is_unstructured() {
        let parsed = parse_calendar("Week one: post daily.");
        assert!(parsed.items().is_empty());
        assert_eq!(parsed.raw(), Some("Week one: post daily."));
    }

    #[test]
    fn test_visual_suggestions() {
        let text = "description: Flat lay||prompt: flat lay photo\nnoise line\ndescription: ||prompt: empty desc\nDescription: Hands||Prompt: hands crafting";
        let parsed = parse_visual_suggestions(text);
        let items = parsed.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].prompt, "flat lay photo");
        assert_eq!(items[1].description, "Hands");
    }

    #[test]
    fn test_strategy_sections() {
        let text = "## Targeting Strategy\n- Grow awareness\n## Content Pillars\n- Education\n• Community\n## Channels\n- instagram\n## KPIs\n- Engagement";
        let s = parse_strategy(text);
        assert_eq!(s.objectives, vec!["Grow awareness"]);
        assert_eq!(s.content_pillars, vec!["Education", "Community"]);
        assert_eq!(s.platforms, vec!["instagram"]);
        assert_eq!(s.kpis, vec!["Engagement"]);
    }

    #[test]
    fn test_insight_counts() {
        let report = "## Current Trends\n- Trend: video\n- Trend: audio\n## Opportunities\n- Opportunity: collabs\n## Warnings\n- Risk: backlash";
        let insights = extract_insights(report);
        let m = insights.as_map().unwrap();
        assert_eq!(m["trend_count"], Value::Number(2.0));
        assert_eq!(m["opportunity_count"], Value::Number(1.0));
        assert_eq!(m["risk_count"], Value::Number(1.0));
    }

    #[test]
    fn test_platform_sections_and_bullets() {
        let parsed = parse_platform_sections("intro\n## Instagram\nCaption\n\n## Facebook\nStory\n## empty\n");
        assert_eq!(
            parsed.items(),
            &[
                ("instagram".to_string(), "Caption".to_string()),
                ("facebook".to_string(), "Story".to_string())
            ]
        );
        assert_eq!(bullet_items("1. one\n- two\nthree\n2) four"), vec!["one", "two", "four"]);
    }

    #[test]
    fn test_parsers_never_panic_on_odd_input() {
        let inputs = [
            "",
            "|",
            "||||||",
            "| | | | | |",
            "||\n||",
            "description:||prompt:",
            "#\n##\n###",
            "</think>",
            "ü|ñ|é|ß|ø|漢字",
            "- \n• \n* ",
            "\n\n\n\n",
        ];
        for input in inputs {
            let _ = clean_response(input);
            let _ = bullet_items(input);
            let _ = extract_insights(input);
            let _ = parse_strategy(input);
            let _ = parse_calendar(input);
            let _ = parse_visual_suggestions(input);
            let _ = parse_platform_sections(input);
        }
    }
}
