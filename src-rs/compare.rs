//! Tolerant comparison of implementation vs. design style values.
//!
//! Values are classified in a fixed order (color, dimension, font list,
//! text). A value that does not parse under a class falls through to the
//! next; nothing here ever fails.

use std::collections::BTreeSet;
use std::fmt;

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Max per-channel difference (of 255) for two colors to match.
pub const COLOR_CHANNEL_TOLERANCE: u8 = 2;
/// Max alpha difference for two colors to match.
pub const ALPHA_TOLERANCE: f64 = 0.01;
/// Relative numeric tolerance, floored at one unit.
pub const NUMERIC_RELATIVE_TOLERANCE: f64 = 0.02;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, (self.a * 255.0).round().clamp(0.0, 255.0) as u8])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            format_number(self.a)
        )
    }
}

const NAMED_COLORS: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("silver", Color::rgb(192, 192, 192)),
    (
        "transparent",
        Color {
            r: 0,
            g: 0,
            b: 0,
            a: 0.0,
        },
    ),
];

/// Parses `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` (comma or
/// space separated, optional `/ alpha`) and a few named colors.
pub fn parse_color(raw: &str) -> Option<Color> {
    let s = raw.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(body) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_body(body);
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, color)| *color)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digits: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .map(|c| u8::from_str_radix(&format!("{c}{c}"), 16).ok())
            .collect::<Option<Vec<u8>>>()?,
        6 | 8 => (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()?,
        _ => return None,
    };
    Some(Color {
        r: digits[0],
        g: digits[1],
        b: digits[2],
        a: digits
            .get(3)
            .map_or(1.0, |a| round_to(f64::from(*a) / 255.0, 3)),
    })
}

fn parse_rgb_body(body: &str) -> Option<Color> {
    let (channels, slash_alpha) = match body.split_once('/') {
        Some((channels, alpha)) => (channels, Some(alpha.trim())),
        None => (body, None),
    };
    let parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let (rgb, alpha) = match (parts.len(), slash_alpha) {
        (3, Some(alpha)) => (&parts[..3], Some(alpha)),
        (3, None) => (&parts[..3], None),
        (4, None) => (&parts[..3], Some(parts[3])),
        _ => return None,
    };

    let channel = |p: &str| -> Option<u8> {
        let value = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok()? * 2.55,
            None => p.parse::<f64>().ok()?,
        };
        value
            .is_finite()
            .then(|| value.round().clamp(0.0, 255.0) as u8)
    };
    let a = match alpha {
        Some(p) => {
            let value = match p.strip_suffix('%') {
                Some(pct) => pct.parse::<f64>().ok()? / 100.0,
                None => p.parse::<f64>().ok()?,
            };
            if !value.is_finite() {
                return None;
            }
            value.clamp(0.0, 1.0)
        }
        None => 1.0,
    };

    Some(Color {
        r: channel(rgb[0])?,
        g: channel(rgb[1])?,
        b: channel(rgb[2])?,
        a,
    })
}

/// `<number><optional unit>`, e.g. `10px`, `1.5em`, `50%`, `-2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub value: f64,
    pub unit: String,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_number(self.value), self.unit)
    }
}

pub fn parse_dimension(raw: &str) -> Option<Dimension> {
    let s = raw.trim().to_ascii_lowercase();
    let split = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '-' | '+'))))
        .map_or(s.len(), |(i, _)| i);
    let (number, unit) = s.split_at(split);
    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !(unit.is_empty() || unit == "%" || unit.chars().all(|c| c.is_ascii_alphabetic())) {
        return None;
    }
    let value = number.parse::<f64>().ok()?;
    value.is_finite().then(|| Dimension {
        value,
        unit: unit.to_string(),
    })
}

/// Comma-separated family list. Only values that look like a list (a comma
/// or quotes present) qualify. An unquoted entry is rejected when it holds
/// a function, a slash or a numeric token, or is a color on its own, so grid
/// tracks, transitions and shadow layers stay out of this class.
pub fn parse_font_list(raw: &str) -> Option<Vec<String>> {
    let mut families = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        let quoted = entry.len() >= 2
            && (entry.starts_with('"') && entry.ends_with('"')
                || entry.starts_with('\'') && entry.ends_with('\''));
        let family = entry
            .trim_matches(|c: char| c == '"' || c == '\'')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if family.is_empty() {
            return None;
        }
        if !quoted && !is_bare_family_name(&family) {
            return None;
        }
        families.push(family);
    }
    Some(families)
}

// Named colors may appear as words inside a family ("Red Hat Display"),
// so only a whole-entry color disqualifies.
fn is_bare_family_name(entry: &str) -> bool {
    !entry.contains(['(', ')', '/'])
        && parse_color(entry).is_none()
        && !entry
            .split_whitespace()
            .any(|token| parse_dimension(token).is_some())
}

fn looks_like_font_list(raw: &str) -> bool {
    raw.contains(',') || raw.contains('"') || raw.contains('\'')
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueClass {
    Color,
    Dimension,
    FontList,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub is_match: bool,
    pub normalized_left: String,
    pub normalized_right: String,
    pub confidence: f64,
    pub class: ValueClass,
}

/// Compares an implementation value against a reference value.
pub fn compare(implementation: &str, reference: &str) -> ComparisonResult {
    if let (Some(left), Some(right)) = (parse_color(implementation), parse_color(reference)) {
        return compare_colors(left, right);
    }
    if let (Some(left), Some(right)) = (parse_dimension(implementation), parse_dimension(reference))
    {
        return compare_dimensions(&left, &right);
    }
    if looks_like_font_list(implementation) || looks_like_font_list(reference) {
        if let (Some(left), Some(right)) =
            (parse_font_list(implementation), parse_font_list(reference))
        {
            return compare_font_lists(&left, &right);
        }
    }

    let left = normalize_text(implementation);
    let right = normalize_text(reference);
    let is_match = left == right;
    ComparisonResult {
        is_match,
        confidence: if is_match { 1.0 } else { 0.0 },
        normalized_left: left,
        normalized_right: right,
        class: ValueClass::Text,
    }
}

fn compare_colors(left: Color, right: Color) -> ComparisonResult {
    let channel_delta = left
        .r
        .abs_diff(right.r)
        .max(left.g.abs_diff(right.g))
        .max(left.b.abs_diff(right.b));
    let alpha_delta = (left.a - right.a).abs();
    let is_match =
        channel_delta <= COLOR_CHANNEL_TOLERANCE && alpha_delta <= ALPHA_TOLERANCE + EPSILON;
    let worst = f64::from(channel_delta).max(alpha_delta * 255.0);
    ComparisonResult {
        is_match,
        normalized_left: left.to_string(),
        normalized_right: right.to_string(),
        confidence: if is_match {
            (1.0 - 0.05 * worst).clamp(0.0, 1.0)
        } else {
            0.0
        },
        class: ValueClass::Color,
    }
}

// Units are ignored: "16" and "16px" are the same size.
fn compare_dimensions(left: &Dimension, right: &Dimension) -> ComparisonResult {
    // Decide on the same precision the normalized strings carry.
    let (lv, rv) = (round_to(left.value, 3), round_to(right.value, 3));
    let tolerance = (lv.abs() * NUMERIC_RELATIVE_TOLERANCE).max(1.0);
    let diff = (lv - rv).abs();
    let is_match = diff <= tolerance + EPSILON;
    ComparisonResult {
        is_match,
        normalized_left: left.to_string(),
        normalized_right: right.to_string(),
        confidence: if is_match {
            (1.0 - 0.2 * diff / tolerance).clamp(0.0, 1.0)
        } else {
            0.0
        },
        class: ValueClass::Dimension,
    }
}

fn compare_font_lists(left: &[String], right: &[String]) -> ComparisonResult {
    let l: BTreeSet<&str> = left.iter().map(String::as_str).collect();
    let r: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    let shared = l.intersection(&r).count();
    let union = l.union(&r).count();
    let is_match = shared > 0;
    ComparisonResult {
        is_match,
        normalized_left: join_families(left),
        normalized_right: join_families(right),
        confidence: if is_match {
            0.5 + 0.5 * shared as f64 / union as f64
        } else {
            0.0
        },
        class: ValueClass::FontList,
    }
}

// Families that would not survive a bare re-parse keep their quotes.
fn join_families(families: &[String]) -> String {
    families
        .iter()
        .map(|family| {
            if is_bare_family_name(family) {
                family.clone()
            } else {
                format!("\"{family}\"")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One extracted style attribute, from the live page or the design file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySample {
    pub name: String,
    pub raw_value: String,
    #[serde(default)]
    pub color_components: Option<Color>,
}

impl PropertySample {
    pub fn new(name: &str, raw_value: &str) -> Self {
        Self {
            name: name.to_string(),
            raw_value: raw_value.to_string(),
            color_components: None,
        }
    }

    fn comparable_value(&self) -> String {
        if let Some(color) = self.color_components {
            return color.to_string();
        }
        if canonical_property_name(&self.name) == "font-weight" {
            return font_weight_value(&self.raw_value);
        }
        self.raw_value.clone()
    }
}

/// `fontWeight`, `Font-Weight` and `font-weight` all become `font-weight`.
pub fn canonical_property_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.trim().chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' || ch.is_whitespace() {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    out
}

fn font_weight_value(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "normal" | "regular" => "400".to_string(),
        "bold" => "700".to_string(),
        other => other.to_string(),
    }
}

pub fn compare_samples(implementation: &PropertySample, reference: &PropertySample) -> ComparisonResult {
    compare(&implementation.comparable_value(), &reference.comparable_value())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyComparison {
    pub name: String,
    pub implementation: Option<String>,
    pub reference: Option<String>,
    pub result: ComparisonResult,
}

/// Pairs samples by canonical name, in implementation order, followed by
/// reference properties the implementation lacks. A property present on only
/// one side never matches.
pub fn compare_all(
    implementation: &[PropertySample],
    reference: &[PropertySample],
) -> Vec<PropertyComparison> {
    let mut rows: Vec<PropertyComparison> = implementation
        .iter()
        .map(|sample| {
            let name = canonical_property_name(&sample.name);
            let counterpart = reference
                .iter()
                .find(|r| canonical_property_name(&r.name) == name);
            let result = match counterpart {
                Some(other) => compare_samples(sample, other),
                None => unpaired(normalize_text(&sample.comparable_value()), String::new()),
            };
            PropertyComparison {
                name,
                implementation: Some(sample.raw_value.clone()),
                reference: counterpart.map(|r| r.raw_value.clone()),
                result,
            }
        })
        .collect();

    for sample in reference {
        let name = canonical_property_name(&sample.name);
        if rows.iter().any(|row| row.name == name) {
            continue;
        }
        rows.push(PropertyComparison {
            result: unpaired(String::new(), normalize_text(&sample.comparable_value())),
            name,
            implementation: None,
            reference: Some(sample.raw_value.clone()),
        });
    }
    rows
}

fn unpaired(normalized_left: String, normalized_right: String) -> ComparisonResult {
    ComparisonResult {
        is_match: false,
        normalized_left,
        normalized_right,
        confidence: 0.0,
        class: ValueClass::Text,
    }
}

fn format_number(value: f64) -> String {
    let rounded = round_to(value, 3);
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

fn round_to(v: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (v * factor).round() / factor
}
