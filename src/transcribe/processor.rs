use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use super::Segment;
use crate::utils::{contains_arabic, decode_body, sanitize_text};
use crate::FetchError;

/// Duration assumed for items that carry no usable `duration`
pub const DEFAULT_SEGMENT_DURATION: f64 = 3.0;

/// Number of leading segments sampled by the Arabic-script check
const HEURISTIC_SAMPLE_SIZE: usize = 10;

const ENGLISH: &str = "en";

/// Top-level shape of a provider response
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptPayload {
    /// The body is the item list itself
    FlatList(Vec<Value>),
    /// The items live under `transcript` or `subtitles`
    Nested {
        source_key: &'static str,
        items: Vec<Value>,
    },
}

impl TranscriptPayload {
    /// Classify a parsed response body
    pub fn detect(value: Value) -> Result<Self, FetchError> {
        match value {
            Value::Array(items) => Ok(TranscriptPayload::FlatList(items)),
            Value::Object(mut map) => {
                if let Some(error) = map.remove("error") {
                    let message = match error {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    return Err(FetchError::UpstreamError(message));
                }

                let source_key = if map.contains_key("transcript") {
                    "transcript"
                } else {
                    "subtitles"
                };

                match map.remove(source_key) {
                    Some(Value::Array(items)) if !items.is_empty() => {
                        Ok(TranscriptPayload::Nested { source_key, items })
                    }
                    removed => {
                        if let Some(value) = removed {
                            map.insert(source_key.to_string(), value);
                        }
                        Err(FetchError::UnexpectedShape {
                            found: "object".to_string(),
                            keys: map.keys().cloned().collect(),
                        })
                    }
                }
            }
            other => Err(FetchError::UnexpectedShape {
                found: json_type_name(&other).to_string(),
                keys: Vec::new(),
            }),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            TranscriptPayload::FlatList(_) => "flat list",
            TranscriptPayload::Nested { .. } => "nested",
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            TranscriptPayload::FlatList(items) => items,
            TranscriptPayload::Nested { items, .. } => items,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Distinct `lang` tags observed across one response.
///
/// An empty set means no item carried a `lang` key at all. Non-string tag
/// values are kept by their JSON text so that `"lang": null` still counts as
/// a tag that is not English.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageSet(BTreeSet<String>);

impl LanguageSet {
    pub fn collect(items: &[Value]) -> Self {
        let tags = items
            .iter()
            .filter_map(|item| item.as_object()?.get("lang"))
            .map(tag_text)
            .collect();
        LanguageSet(tags)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_english(&self) -> bool {
        self.0.contains(ENGLISH)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().collect();
        write!(f, "{}", tags.join(", "))
    }
}

fn tag_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Items that survived the language policy, and whether any tags were seen
#[derive(Debug, Clone)]
pub struct FilteredItems {
    pub items: Vec<Value>,
    pub languages: LanguageSet,
}

impl FilteredItems {
    /// Tags were absent everywhere, so the content sniff has to run
    pub fn needs_script_check(&self) -> bool {
        self.languages.is_empty()
    }
}

/// Enforce the English-only policy on the raw item list.
///
/// Untagged items are kept as English when other items are tagged `en`.
pub fn filter_english(items: Vec<Value>) -> Result<FilteredItems, FetchError> {
    let languages = LanguageSet::collect(&items);
    tracing::debug!(languages = %languages, "Languages in response");

    if languages.is_empty() {
        return Ok(FilteredItems { items, languages });
    }

    if !languages.contains_english() {
        return Err(FetchError::UnsupportedLanguage(format!(
            "Video has: {}",
            languages
        )));
    }

    let total = items.len();
    let items: Vec<Value> = items.into_iter().filter(is_english_item).collect();
    tracing::debug!("Filtered {} items down to {} English items", total, items.len());

    if items.is_empty() {
        return Err(FetchError::NoEnglishContent);
    }

    Ok(FilteredItems { items, languages })
}

fn is_english_item(item: &Value) -> bool {
    match item.as_object().and_then(|map| map.get("lang")) {
        None => true,
        Some(Value::String(lang)) => lang == ENGLISH,
        Some(_) => false,
    }
}

/// Timing derived for one item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub start: f64,
    pub duration: f64,
}

/// Derive start and duration for an item from the running `current_time`.
///
/// Returns the timing and the advanced accumulator, which never moves
/// backwards so that untimed items chain after the latest segment end.
pub fn derive_timing(item: &Map<String, Value>, current_time: f64) -> (Timing, f64) {
    let start = ["offset", "start"]
        .iter()
        .find_map(|key| item.get(*key).and_then(coerce_seconds))
        .unwrap_or(current_time);
    let duration = item
        .get("duration")
        .and_then(coerce_seconds)
        .unwrap_or(DEFAULT_SEGMENT_DURATION);

    let end = start + duration;
    let next_time = if end.is_finite() {
        current_time.max(end)
    } else {
        current_time
    };
    (Timing { start, duration }, next_time)
}

/// Coerce a loosely typed JSON value into non-negative finite seconds
fn coerce_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };

    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn item_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Build raw segments in input order. Items without a `text` key are skipped.
pub fn build_segments(items: &[Value]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(items.len());
    let mut current_time = 0.0;

    for (idx, item) in items.iter().enumerate() {
        let Some(map) = item.as_object() else {
            continue;
        };
        let Some(text) = map.get("text") else {
            continue;
        };

        let (timing, next_time) = derive_timing(map, current_time);
        current_time = next_time;

        let text = item_text(text);
        if idx < 3 {
            tracing::trace!(
                "Item {}: text='{}', start={}, duration={}",
                idx,
                text.chars().take(50).collect::<String>(),
                timing.start,
                timing.duration
            );
        }

        segments.push(Segment {
            text,
            start: timing.start,
            duration: timing.duration,
        });
    }

    segments
}

/// Final text pass over built segments
pub fn sanitize_segments(segments: Vec<Segment>) -> Vec<Segment> {
    segments
        .into_iter()
        .map(|segment| Segment {
            text: sanitize_text(&segment.text),
            ..segment
        })
        .collect()
}

/// Best-effort script sniff over the leading segments.
///
/// Only looks for Arabic-script characters in the first few segments; this
/// is not language detection and is only used when no tags are present.
pub fn reject_arabic_script(segments: &[Segment]) -> Result<(), FetchError> {
    let sample = segments
        .iter()
        .take(HEURISTIC_SAMPLE_SIZE)
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if contains_arabic(&sample) {
        return Err(FetchError::UnsupportedLanguage(
            "Transcript contains Arabic script".to_string(),
        ));
    }
    Ok(())
}

/// Run the whole normalizer over an already parsed response
pub fn normalize_value(value: Value) -> Result<Vec<Segment>, FetchError> {
    let payload = TranscriptPayload::detect(value)?;
    tracing::debug!(shape = payload.shape_name(), "Detected response shape");

    let filtered = filter_english(payload.into_items())?;
    let segments = sanitize_segments(build_segments(&filtered.items));

    if segments.is_empty() {
        return Err(FetchError::EmptyTranscript);
    }

    if filtered.needs_script_check() {
        reject_arabic_script(&segments)?;
    }

    tracing::debug!("Total segments formatted: {}", segments.len());
    Ok(segments)
}

/// Decode, parse and normalize a raw response body
pub fn normalize_response(body: &[u8]) -> Result<Vec<Segment>, FetchError> {
    normalize_text(&decode_body(body))
}

/// Parse and normalize an already decoded response body
pub fn normalize_text(text: &str) -> Result<Vec<Segment>, FetchError> {
    let preview: String = text.chars().take(500).collect();
    tracing::debug!("Raw response (first 500 chars): {}", preview);

    let value: Value = serde_json::from_str(text)?;
    normalize_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_detect_flat_list() {
        let payload = TranscriptPayload::detect(json!([{"text": "a"}])).unwrap();
        assert_eq!(payload.shape_name(), "flat list");
        assert_eq!(payload.into_items().len(), 1);
    }

    #[test]
    fn test_detect_nested_transcript_and_subtitles() {
        let payload = TranscriptPayload::detect(json!({"transcript": [{"text": "a"}]})).unwrap();
        assert!(matches!(
            payload,
            TranscriptPayload::Nested { source_key: "transcript", .. }
        ));

        let payload = TranscriptPayload::detect(json!({"subtitles": [{"text": "b"}]})).unwrap();
        assert!(matches!(
            payload,
            TranscriptPayload::Nested { source_key: "subtitles", .. }
        ));
    }

    #[test]
    fn test_detect_transcript_key_wins_even_when_empty() {
        let err = TranscriptPayload::detect(json!({
            "transcript": [],
            "subtitles": [{"text": "b"}]
        }))
        .unwrap_err();
        match err {
            FetchError::UnexpectedShape { found, keys } => {
                assert_eq!(found, "object");
                assert_eq!(keys, vec!["subtitles".to_string(), "transcript".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_detect_error_field() {
        let err = TranscriptPayload::detect(json!({"error": "quota exceeded", "transcript": []}))
            .unwrap_err();
        assert!(matches!(err, FetchError::UpstreamError(ref msg) if msg == "quota exceeded"));

        let err = TranscriptPayload::detect(json!({"error": {"code": 429}})).unwrap_err();
        assert!(matches!(err, FetchError::UpstreamError(ref msg) if msg == r#"{"code":429}"#));
    }

    #[test]
    fn test_detect_scalar_and_null() {
        for value in [json!(null), json!(42), json!("text"), json!(true)] {
            let err = TranscriptPayload::detect(value).unwrap_err();
            assert!(matches!(err, FetchError::UnexpectedShape { ref keys, .. } if keys.is_empty()));
        }
    }

    #[test]
    fn test_detect_unknown_mapping_reports_keys() {
        let err = TranscriptPayload::detect(json!({"videoId": "x", "items": []})).unwrap_err();
        match err {
            FetchError::UnexpectedShape { keys, .. } => {
                assert_eq!(keys, vec!["items".to_string(), "videoId".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_language_set_distinguishes_absent_from_unknown() {
        let untagged = LanguageSet::collect(&[json!({"text": "a"})]);
        assert!(untagged.is_empty());

        let null_tagged = LanguageSet::collect(&[json!({"text": "a", "lang": null})]);
        assert!(!null_tagged.is_empty());
        assert!(!null_tagged.contains_english());
    }

    #[test]
    fn test_filter_all_english_passes_in_order() {
        let items = vec![
            json!({"text": "one", "lang": "en"}),
            json!({"text": "two", "lang": "en"}),
            json!({"text": "three", "lang": "en"}),
        ];
        let filtered = filter_english(items.clone()).unwrap();
        assert_eq!(filtered.items, items);
        assert!(!filtered.needs_script_check());
    }

    #[test]
    fn test_filter_rejects_non_english_tags() {
        let items = vec![
            json!({"text": "hola", "lang": "es"}),
            json!({"text": "bonjour", "lang": "fr"}),
        ];
        let err = filter_english(items).unwrap_err();
        match err {
            FetchError::UnsupportedLanguage(msg) => assert_eq!(msg, "Video has: es, fr"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_filter_mixed_keeps_english_and_untagged() {
        let items = vec![
            json!({"text": "hello", "lang": "en"}),
            json!({"text": "hola", "lang": "es"}),
            json!({"text": "untagged"}),
            json!({"text": "null tag", "lang": null}),
        ];
        let filtered = filter_english(items).unwrap();
        let kept: Vec<&str> = filtered
            .items
            .iter()
            .filter_map(|item| item["text"].as_str())
            .collect();
        assert_eq!(kept, vec!["hello", "untagged"]);
    }

    #[test]
    fn test_filter_untagged_passes_through() {
        let items = vec![json!({"text": "a"}), json!({"text": "b"})];
        let filtered = filter_english(items.clone()).unwrap();
        assert_eq!(filtered.items, items);
        assert!(filtered.needs_script_check());
    }

    #[test]
    fn test_derive_timing_prefers_offset_then_start() {
        let item = json!({"offset": 4.5, "start": 1.0, "duration": 2});
        let (timing, next) = derive_timing(item.as_object().unwrap(), 0.0);
        assert_eq!(timing, Timing { start: 4.5, duration: 2.0 });
        assert_eq!(next, 6.5);

        let item = json!({"start": "1.25"});
        let (timing, next) = derive_timing(item.as_object().unwrap(), 0.0);
        assert_eq!(timing, Timing { start: 1.25, duration: DEFAULT_SEGMENT_DURATION });
        assert_eq!(next, 4.25);
    }

    #[test]
    fn test_derive_timing_accumulator_never_moves_back() {
        let item = json!({"offset": 1.0, "duration": 1.0});
        let (_, next) = derive_timing(item.as_object().unwrap(), 10.0);
        assert_eq!(next, 10.0);
    }

    #[test]
    fn test_derive_timing_overflowing_end_keeps_accumulator() {
        let item = json!({"offset": 1.7e308, "duration": 1.7e308});
        let (timing, next) = derive_timing(item.as_object().unwrap(), 4.0);
        assert_eq!(timing.start, 1.7e308);
        assert_eq!(next, 4.0);
    }

    #[test]
    fn test_build_after_overflowing_item_stays_finite() {
        let items = vec![
            json!({"offset": 1.7e308, "duration": 1.7e308, "text": "a"}),
            json!({"text": "b"}),
        ];
        let segments = build_segments(&items);
        assert_eq!(segments[1].start, 0.0);
        assert!(segments.iter().all(|s| s.start.is_finite() && s.duration.is_finite()));

        let line = serde_json::to_string(&segments[1]).unwrap();
        assert_eq!(line, r#"{"text":"b","start":0.0,"duration":3.0}"#);
    }

    #[test]
    fn test_normalize_response_html5_entities() {
        let body = br#"[{"text":"rock &#150; roll &amp roll it&#39s"}]"#;
        let segments = normalize_response(body).unwrap();
        assert_eq!(segments[0].text, "rock \u{2013} roll & roll it's");
    }

    #[test]
    fn test_derive_timing_uncoercible_values_fall_back() {
        let item = json!({"offset": null, "start": "abc", "duration": "NaN"});
        let (timing, next) = derive_timing(item.as_object().unwrap(), 7.0);
        assert_eq!(timing, Timing { start: 7.0, duration: DEFAULT_SEGMENT_DURATION });
        assert_eq!(next, 10.0);

        let item = json!({"offset": -3, "start": 2});
        let (timing, _) = derive_timing(item.as_object().unwrap(), 0.0);
        assert_eq!(timing.start, 2.0);
    }

    #[test]
    fn test_build_chains_missing_timing() {
        let items = vec![
            json!({"offset": 0, "duration": 2, "text": "a"}),
            json!({"text": "b"}),
            json!({"text": "c"}),
        ];
        let segments = build_segments(&items);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].start, 2.0);
        assert_eq!(segments[1].duration, 3.0);
        assert_eq!(segments[2].start, 5.0);
    }

    #[test]
    fn test_build_preserves_input_order() {
        let items = vec![
            json!({"offset": 10, "duration": 1, "text": "late"}),
            json!({"offset": 2, "duration": 1, "text": "early"}),
        ];
        let segments = build_segments(&items);
        assert_eq!(texts(&segments), vec!["late", "early"]);
        assert_eq!(segments[1].start, 2.0);
    }

    #[test]
    fn test_build_skips_items_without_text_key() {
        let items = vec![
            json!({"offset": 0, "duration": 1}),
            json!("not an object"),
            json!({"text": null, "offset": 1}),
            json!({"text": 42}),
            json!({"text": true}),
        ];
        let segments = build_segments(&items);
        assert_eq!(texts(&segments), vec!["", "42", "true"]);
    }

    #[test]
    fn test_sanitize_segments_runs_after_build() {
        let segments = vec![Segment {
            text: " it&#39;s cafe\u{0301} ".to_string(),
            start: 0.0,
            duration: 1.0,
        }];
        let cleaned = sanitize_segments(segments);
        assert_eq!(cleaned[0].text, "it's caf\u{e9}");
        assert_eq!(cleaned[0].duration, 1.0);
    }

    #[test]
    fn test_empty_list_is_empty_transcript() {
        let err = normalize_value(json!([])).unwrap_err();
        assert!(matches!(err, FetchError::EmptyTranscript));
    }

    #[test]
    fn test_all_items_without_text_is_empty_transcript() {
        let err = normalize_value(json!({"transcript": [{"offset": 1}]})).unwrap_err();
        assert!(matches!(err, FetchError::EmptyTranscript));
    }

    #[test]
    fn test_arabic_without_tags_is_rejected() {
        let payload = json!([
            {"text": "\u{0645}\u{0631}\u{062D}\u{0628}\u{0627}", "offset": 0, "duration": 1},
            {"text": "hello", "offset": 1, "duration": 1}
        ]);
        let err = normalize_value(payload).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_arabic_with_english_tags_passes() {
        let payload = json!([
            {"text": "\u{0645}\u{0631}\u{062D}\u{0628}\u{0627}", "lang": "en"},
            {"text": "hello", "lang": "en"}
        ]);
        let segments = normalize_value(payload).unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_arabic_entity_is_caught_after_decoding() {
        let payload = json!([{"text": "&#1605;&#1585;"}]);
        let err = normalize_value(payload).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_arabic_beyond_sample_window_passes() {
        let mut items: Vec<Value> = (0..10).map(|i| json!({"text": format!("line {i}")})).collect();
        items.push(json!({"text": "\u{0645}\u{0631}"}));
        let segments = normalize_value(Value::Array(items)).unwrap();
        assert_eq!(segments.len(), 11);
    }

    #[test]
    fn test_normalize_response_nested_shape() {
        let body = br#"{"videoId":"abc","transcript":[{"text":"it&#39;s","offset":"0.5","duration":"1.5","lang":"en"},{"text":"next","lang":"en"}]}"#;
        let segments = normalize_response(body).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment { text: "it's".to_string(), start: 0.5, duration: 1.5 },
                Segment { text: "next".to_string(), start: 2.0, duration: 3.0 },
            ]
        );
    }

    #[test]
    fn test_normalize_response_malformed_bytes() {
        let mut body = br#"[{"text":"caf"#.to_vec();
        body.push(0xE9);
        body.push(0x81);
        body.extend_from_slice(br#"","offset":0}]"#);

        let segments = normalize_response(&body).unwrap();
        assert_eq!(segments[0].text, "caf\u{e9}\u{FFFD}");
    }

    #[test]
    fn test_normalize_response_invalid_json() {
        let err = normalize_response(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload(_)));
    }
}
