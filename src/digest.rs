// src/digest.rs
//! Digest assembly: sanitized records → LINE message objects.
//!
//! One text preamble, then one flex carousel per non-empty region bucket, or a
//! "nothing this week" notice when both buckets are empty.

use serde::Serialize;

use crate::sanitize::SummaryRecord;

pub const EMPTY_NOTICE: &str = "今週は該当記事なし（情報源が不安定）";
pub const READ_MORE_LABEL: &str = "続きを読む";

/// LINE caps a carousel at 12 bubbles.
const CAROUSEL_MAX: usize = 12;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: FlexContainer,
    },
}

impl Message {
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text { text: s.into() }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlexContainer {
    Carousel { contents: Vec<Bubble> },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename = "bubble")]
pub struct Bubble {
    pub size: &'static str,
    pub body: FlexBox,
    pub footer: FlexBox,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename = "box")]
pub struct FlexBox {
    pub layout: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<&'static str>,
    pub contents: Vec<FlexComponent>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlexComponent {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<&'static str>,
        size: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<&'static str>,
        wrap: bool,
    },
    Button {
        style: &'static str,
        action: Action,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Uri { label: String, uri: String },
}

fn text(s: String, size: &'static str) -> FlexComponent {
    FlexComponent::Text {
        text: s,
        weight: None,
        size,
        color: None,
        wrap: true,
    }
}

/// `#a #b`, or `None` when there are no tags.
pub fn tag_line(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

pub fn attribution(rec: &SummaryRecord) -> String {
    format!("出典: {} / {}", rec.source_domain, rec.published_local)
}

pub fn bubble(rec: &SummaryRecord) -> Bubble {
    let body = vec![
        FlexComponent::Text {
            text: rec.headline.clone(),
            weight: Some("bold"),
            size: "md",
            color: None,
            wrap: true,
        },
        text(rec.summary.clone(), "sm"),
        FlexComponent::Text {
            text: attribution(rec),
            weight: None,
            size: "xs",
            color: Some("#888888"),
            wrap: true,
        },
    ];

    let mut footer = Vec::with_capacity(2);
    if let Some(line) = tag_line(&rec.tags) {
        footer.push(FlexComponent::Text {
            text: line,
            weight: None,
            size: "xs",
            color: Some("#666666"),
            wrap: true,
        });
    }
    footer.push(FlexComponent::Button {
        style: "link",
        action: Action::Uri {
            label: READ_MORE_LABEL.to_string(),
            uri: rec.url.clone(),
        },
    });

    Bubble {
        size: "kilo",
        body: FlexBox {
            layout: "vertical",
            spacing: Some("sm"),
            contents: body,
        },
        footer: FlexBox {
            layout: "vertical",
            spacing: None,
            contents: footer,
        },
    }
}

pub fn carousel(alt_text: String, records: &[SummaryRecord]) -> Message {
    Message::Flex {
        alt_text,
        contents: FlexContainer::Carousel {
            contents: records.iter().take(CAROUSEL_MAX).map(bubble).collect(),
        },
    }
}

pub fn preamble(topic: &str) -> String {
    format!("🗞 直近1週間の「{topic}」")
}

/// Full message sequence for one digest run.
pub fn build_messages(topic: &str, domestic: &[SummaryRecord], overseas: &[SummaryRecord]) -> Vec<Message> {
    let mut messages = vec![Message::text(preamble(topic))];
    if !domestic.is_empty() {
        messages.push(carousel(
            format!("国内トピック {}件", domestic.len()),
            domestic,
        ));
    }
    if !overseas.is_empty() {
        messages.push(carousel(
            format!("海外トピック {}件", overseas.len()),
            overseas,
        ));
    }
    if messages.len() == 1 {
        messages.push(Message::text(EMPTY_NOTICE));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(tags: &[&str]) -> SummaryRecord {
        SummaryRecord {
            headline: "見出し".into(),
            summary: "要約".into(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            source_domain: "www.mhlw.go.jp".into(),
            url: "https://www.mhlw.go.jp/a".into(),
            published_local: "2025-09-02 00:30".into(),
        }
    }

    #[test]
    fn bubble_shape() {
        let v = serde_json::to_value(bubble(&rec(&["介護DX", "AI"]))).unwrap();
        assert_eq!(v["type"], "bubble");
        assert_eq!(v["body"]["type"], "box");
        assert_eq!(v["body"]["contents"][0]["weight"], "bold");
        assert_eq!(
            v["body"]["contents"][2]["text"],
            "出典: www.mhlw.go.jp / 2025-09-02 00:30"
        );
        assert_eq!(v["footer"]["contents"][0]["text"], "#介護DX #AI");
        assert_eq!(v["footer"]["contents"][1]["action"]["type"], "uri");
        assert_eq!(v["footer"]["contents"][1]["action"]["label"], "続きを読む");
    }

    #[test]
    fn no_tags_no_tag_line() {
        let v = serde_json::to_value(bubble(&rec(&[]))).unwrap();
        let footer = v["footer"]["contents"].as_array().unwrap();
        assert_eq!(footer.len(), 1);
        assert_eq!(footer[0]["type"], "button");
    }

    #[test]
    fn empty_digest_has_notice() {
        let m = build_messages("高齢者医療×AI/IT", &[], &[]);
        assert_eq!(m.len(), 2);
        assert_eq!(m[1], Message::text(EMPTY_NOTICE));
    }

    #[test]
    fn only_non_empty_buckets_get_a_carousel() {
        let m = build_messages("t", &[], &[rec(&[])]);
        assert_eq!(m.len(), 2);
        let v = serde_json::to_value(&m[1]).unwrap();
        assert_eq!(v["type"], "flex");
        assert_eq!(v["altText"], "海外トピック 1件");
        assert_eq!(v["contents"]["type"], "carousel");
    }
}
