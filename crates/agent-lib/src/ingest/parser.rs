//! Prometheus text exposition parsing
//!
//! Parsing is best-effort per line: a malformed line is skipped and counted,
//! the rest of the document is still returned.

use crate::error::ParseError;
use crate::models::{MetricType, Sample};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Series suffixes that belong to a histogram or summary family
const FAMILY_SUFFIXES: &[&str] = &["_bucket", "_sum", "_count", "_created"];

/// Result of parsing one exposition document
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub samples: Vec<Sample>,
    /// Number of data lines dropped as malformed
    pub skipped_lines: usize,
}

/// Parse exposition text into samples, dropping malformed lines
pub fn parse_metrics(text: &str) -> Vec<Sample> {
    parse_exposition(text).samples
}

/// Parse exposition text and report how many lines were skipped
pub fn parse_exposition(text: &str) -> ParseOutcome {
    let mut families: HashMap<String, MetricType> = HashMap::new();
    let mut outcome = ParseOutcome::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            // HELP and free-form comments carry no sample data
            if let Some((family, metric_type)) = parse_type_comment(comment) {
                families.insert(family.to_string(), metric_type);
            }
            continue;
        }

        match parse_sample_line(line) {
            Ok(mut sample) => {
                sample.metric_type = resolve_type(&families, &sample.name);
                outcome.samples.push(sample);
            }
            Err(err) => {
                debug!(line = idx + 1, error = %err, "Skipping malformed exposition line");
                outcome.skipped_lines += 1;
            }
        }
    }

    outcome
}

/// Parse the body of a `# TYPE <name> <type>` comment
fn parse_type_comment(comment: &str) -> Option<(&str, MetricType)> {
    let mut parts = comment.split_whitespace();
    if parts.next()? != "TYPE" {
        return None;
    }
    let family = parts.next()?;
    let type_token = parts.next()?;
    Some((family, MetricType::from_type_token(type_token)))
}

/// Find the declared type for a series name, following family suffixes
fn resolve_type(families: &HashMap<String, MetricType>, name: &str) -> MetricType {
    if let Some(metric_type) = families.get(name) {
        return *metric_type;
    }

    for suffix in FAMILY_SUFFIXES {
        if let Some(family) = name.strip_suffix(suffix) {
            if let Some(family_type) = families.get(family) {
                if matches!(family_type, MetricType::Histogram | MetricType::Summary) {
                    return *family_type;
                }
            }
        }
    }

    if let Some(family) = name.strip_suffix("_total") {
        if families.get(family) == Some(&MetricType::Counter) {
            return MetricType::Counter;
        }
    }

    MetricType::Unknown
}

/// Parse a single data line: `name[{labels}] value [timestamp]`
pub fn parse_sample_line(line: &str) -> Result<Sample, ParseError> {
    let name_end = line
        .find(|c: char| !is_name_char(c))
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if !is_valid_metric_name(name) {
        return Err(ParseError::InvalidName);
    }

    let mut rest = &line[name_end..];
    let mut labels = BTreeMap::new();

    if let Some(label_body) = rest.strip_prefix('{') {
        let (parsed, after) = parse_labels(label_body)?;
        labels = parsed;
        rest = after;
    } else if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(ParseError::InvalidName);
    }

    let mut tokens = rest.split_whitespace();
    let value = parse_value(tokens.next().ok_or(ParseError::MissingValue)?)?;

    let timestamp_ms = match tokens.next() {
        Some(token) => Some(
            token
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidTimestamp(token.to_string()))?,
        ),
        None => None,
    };

    if let Some(extra) = tokens.next() {
        return Err(ParseError::TrailingContent(extra.to_string()));
    }

    Ok(Sample {
        name: name.to_string(),
        labels,
        value,
        metric_type: MetricType::Unknown,
        timestamp_ms,
    })
}

/// Parse `key="value",...}` and return the labels plus the text after `}`
fn parse_labels(input: &str) -> Result<(BTreeMap<String, String>, &str), ParseError> {
    let mut labels = BTreeMap::new();
    let mut rest = input.trim_start();

    loop {
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }
        if rest.is_empty() {
            return Err(ParseError::UnterminatedLabels);
        }

        let eq = rest
            .find('=')
            .ok_or_else(|| ParseError::MalformedLabel(rest.to_string()))?;
        let key = rest[..eq].trim();
        if !is_valid_label_name(key) {
            return Err(ParseError::MalformedLabel(key.to_string()));
        }

        let quoted = rest[eq + 1..]
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(|| ParseError::MalformedLabel(key.to_string()))?;
        let (value, after_value) = parse_quoted(quoted)?;

        if labels.insert(key.to_string(), value).is_some() {
            return Err(ParseError::DuplicateLabel(key.to_string()));
        }

        rest = after_value.trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma.trim_start();
        } else if rest.is_empty() {
            return Err(ParseError::UnterminatedLabels);
        } else if !rest.starts_with('}') {
            return Err(ParseError::MalformedLabel(rest.to_string()));
        }
    }
}

/// Read a quoted label value (opening quote already consumed)
fn parse_quoted(body: &str) -> Result<(String, &str), ParseError> {
    let mut value = String::new();
    let mut chars = body.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &body[idx + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, escaped)) => value.push(escaped),
                None => return Err(ParseError::UnterminatedLabels),
            },
            _ => value.push(c),
        }
    }

    Err(ParseError::UnterminatedLabels)
}

/// Parse a sample value, accepting exponent notation and the special float tokens
fn parse_value(token: &str) -> Result<f64, ParseError> {
    match token {
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => token
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidValue(token.to_string())),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_valid_metric_name(name: &str) -> bool {
    match name.chars().next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_' || first == ':')
            && name.chars().all(is_name_char),
        None => false,
    }
}

fn is_valid_label_name(name: &str) -> bool {
    match name.chars().next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_EXPORTER_TEXT: &str = r#"# HELP node_load1 1m load average.
# TYPE node_load1 gauge
node_load1 0.95
# HELP node_memory_MemTotal_bytes Memory information field MemTotal_bytes.
# TYPE node_memory_MemTotal_bytes gauge
node_memory_MemTotal_bytes 8.253984768e+09
# TYPE node_filesystem_avail_bytes gauge
node_filesystem_avail_bytes{device="/dev/sda1",fstype="ext4",mountpoint="/"} 5
node_filesystem_avail_bytes{device="tmpfs",fstype="tmpfs",mountpoint="/run"} 1.6e+08
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le="0.1"} 10
http_request_duration_seconds_bucket{le="+Inf"} 12
http_request_duration_seconds_sum 3.5
http_request_duration_seconds_count 12
# TYPE http_requests counter
http_requests_total{code="200"} 1027 1395066363000
"#;

    #[test]
    fn test_parse_unlabeled_gauge() {
        let samples = parse_metrics("# TYPE node_load1 gauge\nnode_load1 0.95\n");

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "node_load1");
        assert_eq!(samples[0].value, 0.95);
        assert_eq!(samples[0].metric_type, MetricType::Gauge);
        assert!(samples[0].labels.is_empty());
    }

    #[test]
    fn test_parse_node_exporter_document() {
        let samples = parse_metrics(NODE_EXPORTER_TEXT);
        assert_eq!(samples.len(), 9);

        let mem_total = samples
            .iter()
            .find(|s| s.name == "node_memory_MemTotal_bytes")
            .unwrap();
        assert_eq!(mem_total.value, 8.253984768e9);

        let root_avail = samples
            .iter()
            .find(|s| s.name == "node_filesystem_avail_bytes" && s.label("mountpoint") == Some("/"))
            .unwrap();
        assert_eq!(root_avail.value, 5.0);
        assert_eq!(root_avail.label("fstype"), Some("ext4"));
    }

    #[test]
    fn test_histogram_children_inherit_family_type() {
        let samples = parse_metrics(NODE_EXPORTER_TEXT);
        let histogram: Vec<_> = samples
            .iter()
            .filter(|s| s.name.starts_with("http_request_duration_seconds"))
            .collect();

        assert_eq!(histogram.len(), 4);
        assert!(histogram
            .iter()
            .all(|s| s.metric_type == MetricType::Histogram));
        assert_eq!(histogram[1].label("le"), Some("+Inf"));
    }

    #[test]
    fn test_counter_total_and_timestamp() {
        let samples = parse_metrics(NODE_EXPORTER_TEXT);
        let requests = samples
            .iter()
            .find(|s| s.name == "http_requests_total")
            .unwrap();

        assert_eq!(requests.metric_type, MetricType::Counter);
        assert_eq!(requests.timestamp_ms, Some(1_395_066_363_000));
        assert_eq!(requests.label("code"), Some("200"));
    }

    #[test]
    fn test_type_defaults_to_unknown() {
        let samples = parse_metrics("# TYPE other gauge\nnode_load1 0.5\n");
        assert_eq!(samples[0].metric_type, MetricType::Unknown);
    }

    #[test]
    fn test_type_is_superseded() {
        let text = "# TYPE foo gauge\nfoo 1\n# TYPE foo counter\nfoo 2\n";
        let samples = parse_metrics(text);
        assert_eq!(samples[0].metric_type, MetricType::Gauge);
        assert_eq!(samples[1].metric_type, MetricType::Counter);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "good 1\nbad_value abc\n{no_name=\"x\"} 3\nlabels{a=\"b\" 4\nalso_good 2e-3\n";
        let outcome = parse_exposition(text);

        assert_eq!(outcome.samples.len(), 2);
        assert_eq!(outcome.skipped_lines, 3);
        assert_eq!(outcome.samples[1].value, 0.002);
    }

    #[test]
    fn test_duplicate_label_key_drops_line() {
        let outcome = parse_exposition("m{a=\"1\",a=\"2\"} 1\n");
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.skipped_lines, 1);
    }

    #[test]
    fn test_special_float_values() {
        let samples = parse_metrics("a +Inf\nb -Inf\nc NaN\n");

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].value, f64::INFINITY);
        assert_eq!(samples[1].value, f64::NEG_INFINITY);
        assert!(samples[2].value.is_nan());
    }

    #[test]
    fn test_label_escapes_and_trailing_comma() {
        let sample =
            parse_sample_line(r#"m{path="C:\\tmp",msg="say \"hi\"\n",} 1"#).unwrap();

        assert_eq!(sample.label("path"), Some("C:\\tmp"));
        assert_eq!(sample.label("msg"), Some("say \"hi\"\n"));
    }

    #[test]
    fn test_label_value_with_braces_and_commas() {
        let sample = parse_sample_line(r#"m{q="a,b}c",r="x=y"} 7"#).unwrap();
        assert_eq!(sample.label("q"), Some("a,b}c"));
        assert_eq!(sample.label("r"), Some("x=y"));
        assert_eq!(sample.value, 7.0);
    }

    #[test]
    fn test_label_order_irrelevant() {
        let a = parse_sample_line(r#"m{x="1",y="2"} 1"#).unwrap();
        let b = parse_sample_line(r#"m{y="2",x="1"} 1"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trailing_content_rejected() {
        assert!(matches!(
            parse_sample_line("m 1 2 3"),
            Err(ParseError::TrailingContent(_))
        ));
        assert!(matches!(
            parse_sample_line("m 1 notatime"),
            Err(ParseError::InvalidTimestamp(_))
        ));
        assert!(matches!(parse_sample_line("m"), Err(ParseError::MissingValue)));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_metrics(NODE_EXPORTER_TEXT);
        let second = parse_metrics(NODE_EXPORTER_TEXT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let outcome = parse_exposition("");
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.skipped_lines, 0);
    }
}
