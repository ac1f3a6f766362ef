// tests/sanitize_contract.rs
//
// The sanitizer is the enforcement point for generated output, so it is exercised here
// with hand-made malformed structures and never through a backend.

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use eldercare_digest::sanitize::{sanitize, sanitize_tags, OutputLimits, RawSummary, UNKNOWN};
use eldercare_digest::Candidate;

fn candidate() -> Candidate {
    Candidate::new(
        "高齢者施設で転倒検知AIの実証が始まる",
        "https://www.example.co.jp/a/b",
    )
    .published(Utc.with_ymd_and_hms(2025, 9, 8, 1, 0, 0).unwrap())
    .source("Example News")
    .snippet("センサーとAIを組み合わせ、夜間の転倒を早期に検知する仕組みを検証する。")
}

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

#[test]
fn tag_rules_drop_phrases_operators_and_queries() {
    let tags = strings(&["介護 現場", "OR", "転倒予防", "site:nature.com", "AI"]);
    assert_eq!(
        sanitize_tags(&tags, &OutputLimits::default()),
        strings(&["転倒予防", "AI"])
    );
}

#[test]
fn sentence_as_source_is_replaced_by_url_host() {
    let raw = RawSummary {
        headline: Some("転倒検知AIの実証".into()),
        summary: Some("高齢者施設で夜間の転倒をAIで検知する実証が始まった。".into()),
        tags: strings(&["転倒検知"]),
        source: Some("この記事は〜について説明しています。".into()),
        url: Some("https://www.example.co.jp/a/b".into()),
    };
    let rec = sanitize(&raw, &candidate(), &OutputLimits::default());
    assert_eq!(rec.source_domain, "www.example.co.jp");
}

#[test]
fn garbage_object_still_yields_a_valid_record() {
    let v = json!({
        "headline": "",
        "summary": "短い",
        "tags": "AND, #見守り, https://x.ex, 見守り",
        "source": "(see above)",
        "url": "javascript:alert(1)"
    });
    let limits = OutputLimits::default();
    let rec = sanitize(&RawSummary::from_value(&v), &candidate(), &limits);

    assert_eq!(rec.headline, "高齢者施設で転倒検知AIの実証が始まる");
    // raw summary too short → candidate snippet
    assert!(rec.summary.starts_with("センサーとAI"));
    assert_eq!(rec.tags, strings(&["見守り"]));
    assert_eq!(rec.url, "https://www.example.co.jp/a/b");
    assert_eq!(rec.source_domain, "www.example.co.jp");
    assert_eq!(rec.published_local, "2025-09-08 10:00");
}

#[test]
fn non_object_output_falls_back_to_candidate_fields() {
    let rec = sanitize(
        &RawSummary::from_value(&json!(["not", "an", "object"])),
        &Candidate::new("見出しのみ", "not a url"),
        &OutputLimits::default(),
    );
    assert_eq!(rec.headline, "見出しのみ");
    assert!(rec.summary.chars().count() >= 20);
    assert!(rec.tags.is_empty());
    // neither the url nor the empty source name yields a usable publisher
    assert_eq!(rec.source_domain, UNKNOWN);
    assert_eq!(rec.published_local, UNKNOWN);
}

#[test]
fn lengths_are_bounded() {
    let long = "あ".repeat(500);
    let raw = RawSummary {
        headline: Some(long.clone()),
        summary: Some(long),
        tags: (0..10).map(|i| format!("タグ{i}")).collect(),
        source: Some("x".repeat(300)),
        url: None,
    };
    let limits = OutputLimits::default();
    let rec = sanitize(&raw, &candidate(), &limits);
    assert_eq!(rec.headline.chars().count(), limits.headline_max);
    assert_eq!(rec.summary.chars().count(), limits.summary_max);
    assert_eq!(rec.tags.len(), limits.tags_max);
    assert!(rec.source_domain.chars().count() <= limits.source_len_max);
}

// ------------------------------------------------------------
// Idempotence over random inputs
// ------------------------------------------------------------

const TEXTS: &[&str] = &[
    "",
    "   ",
    "短い",
    "高齢者の見守りにAIを活用する取り組みが各地で広がっている。",
    "line\nbreaks\tand\u{0007}controls in a fairly long generated summary text",
    "https://www.example.com/path",
    "site:nature.com OR site:who.int",
    "Example News",
    "この記事は〜について説明しています。",
    "(無題)",
    "#ハッシュ",
];

fn pick(rng: &mut StdRng) -> Option<String> {
    if rng.random_bool(0.15) {
        return None;
    }
    let base = TEXTS[rng.random_range(0..TEXTS.len())];
    let reps = rng.random_range(1..8);
    Some(base.repeat(reps))
}

#[test]
fn sanitizing_a_sanitized_record_changes_nothing() {
    let limits = OutputLimits::default();
    for seed in 0..200u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let raw = RawSummary {
            headline: pick(&mut rng),
            summary: pick(&mut rng),
            tags: (0..rng.random_range(0..9))
                .filter_map(|_| pick(&mut rng))
                .collect(),
            source: pick(&mut rng),
            url: pick(&mut rng),
        };
        let mut c = Candidate::new(
            pick(&mut rng).unwrap_or_default(),
            if rng.random_bool(0.8) {
                "https://www.example.org/news/1"
            } else {
                "not a url"
            },
        )
        .snippet(pick(&mut rng).unwrap_or_default())
        .source(pick(&mut rng).unwrap_or_default());
        if rng.random_bool(0.7) {
            c = c.published(Utc.with_ymd_and_hms(2025, 1, 31, 20, 30, 0).unwrap());
        }

        let once = sanitize(&raw, &c, &limits);
        let twice = sanitize(&RawSummary::from(&once), &c, &limits);
        assert_eq!(once, twice, "seed {seed}");
    }
}
