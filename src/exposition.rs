//! Prometheus text exposition (format version 0.0.4).

use std::fmt::Write;

use crate::descriptor::BUCKET_LABEL;
use crate::registry::{FamilySnapshot, Sample, SampleValue};

/// Content type served with [`render_text`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Escapes a label value: backslash, double quote and newline.
pub fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Escapes help text: backslash and newline.
pub fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Formats a sample value the way scrapers parse it.
///
/// Finite values use Rust's shortest round-trip decimal form, the same as the
/// `prometheus` crate's encoder. Large and tiny magnitudes are written out in
/// full (`1e21` becomes `1000000000000000000000`) where the Go client would
/// use exponent notation; both parse to the same double.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}

fn label_block(names: &[String], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(n, v)| format!("{}=\"{}\"", n, escape_label_value(v)))
        .collect();
    if let Some((n, v)) = extra {
        pairs.push(format!("{}=\"{}\"", n, escape_label_value(v)));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn write_sample(out: &mut String, name: &str, suffix: &str, labels: &str, value: f64) {
    let _ = writeln!(out, "{}{}{} {}", name, suffix, labels, format_value(value));
}

fn render_family(out: &mut String, snapshot: &FamilySnapshot) {
    let family = &snapshot.family;
    let name = family.fq_name();
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.help));
    let _ = writeln!(out, "# TYPE {} {}", name, family.kind);

    for Sample {
        label_values,
        value,
    } in &snapshot.samples
    {
        match value {
            SampleValue::Scalar(v) => {
                let labels = label_block(&family.label_names, label_values, None);
                write_sample(out, &name, "", &labels, *v);
            }
            SampleValue::Histogram(h) => {
                for (bound, count) in &h.buckets {
                    let le = format_value(*bound);
                    let labels =
                        label_block(&family.label_names, label_values, Some((BUCKET_LABEL, &le)));
                    write_sample(out, &name, "_bucket", &labels, *count as f64);
                }
                let inf = label_block(
                    &family.label_names,
                    label_values,
                    Some((BUCKET_LABEL, "+Inf")),
                );
                write_sample(out, &name, "_bucket", &inf, h.count as f64);

                let labels = label_block(&family.label_names, label_values, None);
                write_sample(out, &name, "_sum", &labels, h.sum);
                write_sample(out, &name, "_count", &labels, h.count as f64);
            }
        }
    }
}

/// Renders a registry snapshot in registration order.
///
/// Families without samples are skipped.
pub fn render_text(snapshot: &[FamilySnapshot]) -> String {
    let mut out = String::new();
    for family in snapshot.iter().filter(|f| !f.samples.is_empty()) {
        render_family(&mut out, family);
    }
    out
}
