use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::records::{ReportRecord, TOPIC_CODES};

/// Column order of the heatmap, independent of the data.
pub const STANDARD_ORDER: [&str; 14] = [
    "ESRS 1", "ESRS 2", "E1", "E2", "E3", "E4", "E5", "S1", "S2", "S3", "S4", "G1", "SBM-3",
    "IRO-1",
];

/// White, light purple, solid purple.
pub const COLOR_RANGE: [Rgb; 3] = [
    Rgb(0xff, 0xff, 0xff),
    Rgb(0xa0, 0xa0, 0xff),
    Rgb(0x42, 0x00, 0xff),
];

/// One company/standard cell of the heatmap.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopicHit {
    pub company: String,
    pub standard: String,
    pub hits: f64,
    /// Share of the company's most referenced topic; set for within-firm scaling only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_hits: Option<f64>,
}

/// How heatmap colors are normalized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingMode {
    /// Colors show variation within one firm.
    #[default]
    WithinFirm,
    /// Colors compare all displayed firms.
    Overall,
}

impl ScalingMode {
    pub fn label(&self) -> &'static str {
        match self {
            ScalingMode::WithinFirm => "Within-firm",
            ScalingMode::Overall => "Overall",
        }
    }
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScalingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "within-firm" | "withinfirm" | "within" => Ok(ScalingMode::WithinFirm),
            "overall" => Ok(ScalingMode::Overall),
            other => Err(format!("unknown scaling mode: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Three-point linear color scale. The middle anchor is always the mean of the ends.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColorScale {
    pub domain: [f64; 3],
    pub range: [Rgb; 3],
}

impl ColorScale {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            domain: [low, (low + high) / 2.0, high],
            range: COLOR_RANGE,
        }
    }

    /// Interpolated color; values outside the domain clamp to the end colors.
    pub fn color_for(&self, value: f64) -> Rgb {
        let [low, mid, high] = self.domain;
        if !(high > low) || value <= low || value.is_nan() {
            return self.range[0];
        }
        if value >= high {
            return self.range[2];
        }
        let (from, to, t) = if value <= mid {
            (self.range[0], self.range[1], (value - low) / (mid - low))
        } else {
            (self.range[1], self.range[2], (value - mid) / (high - mid))
        };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
    }
}

/// Reshaped, color-scaled heatmap ready for rendering.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Heatmap {
    pub mode: ScalingMode,
    pub scaled_by_pages: bool,
    /// Company axis, sorted by name.
    pub companies: Vec<String>,
    /// Standard axis, in canonical order.
    pub standards: Vec<String>,
    pub cells: Vec<TopicHit>,
    pub scale: ColorScale,
}

impl Heatmap {
    /// Value the color of a cell is taken from under the chosen mode.
    pub fn color_value(&self, cell: &TopicHit) -> f64 {
        match self.mode {
            ScalingMode::WithinFirm => cell.norm_hits.unwrap_or(0.0),
            ScalingMode::Overall => cell.hits,
        }
    }

    pub fn cell(&self, company: &str, standard: &str) -> Option<&TopicHit> {
        self.cells
            .iter()
            .find(|c| c.company == company && c.standard == standard)
    }

    pub fn max_hits(&self) -> f64 {
        self.cells.iter().map(|c| c.hits).fold(0.0, f64::max)
    }
}

/// Result of building the heatmap for a filtered set.
#[derive(Clone, Debug, PartialEq)]
pub enum HeatmapOutcome {
    Ready(Heatmap),
    /// No record in the selection has any measured topic.
    NotYetAnalyzed,
}

/// Melt each record's topic counts into one row per measured topic.
///
/// With `scale_by_pages` every count is divided by the record's page count;
/// records without a positive numeric page count are left out.
pub fn reshape(records: &[&ReportRecord], scale_by_pages: bool) -> Vec<TopicHit> {
    let mut hits = Vec::new();
    for record in records {
        let divisor = if scale_by_pages {
            match record.pages().filter(|p| *p > 0.0) {
                Some(pages) => pages,
                None => {
                    log::debug!(
                        "skipping {:?} for page scaling: page count {:?}",
                        record.company,
                        record.pages_pdf
                    );
                    continue;
                }
            }
        } else {
            1.0
        };

        for (code, value) in TOPIC_CODES.iter().zip(record.topics) {
            if let Some(value) = value {
                hits.push(TopicHit {
                    company: record.company.clone(),
                    standard: code.to_uppercase(),
                    hits: value / divisor,
                    norm_hits: None,
                });
            }
        }
    }
    hits
}

/// Fill `norm_hits` with each hit's share of its company's maximum (0 when that max is 0).
pub fn normalize_within_firm(hits: &mut [TopicHit]) {
    let mut max_by_company: HashMap<String, f64> = HashMap::new();
    for hit in hits.iter() {
        let max = max_by_company.entry(hit.company.clone()).or_insert(0.0);
        *max = max.max(hit.hits);
    }
    for hit in hits.iter_mut() {
        let max = max_by_company.get(&hit.company).copied().unwrap_or(0.0);
        hit.norm_hits = Some(if max != 0.0 { hit.hits / max } else { 0.0 });
    }
}

/// Order standard codes canonically; unknown codes follow in first-seen order.
pub fn ordered_standards<'a>(codes: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for code in codes {
        if !seen.contains(&code) {
            seen.push(code);
        }
    }
    let mut ordered: Vec<String> = STANDARD_ORDER
        .iter()
        .filter(|s| seen.iter().any(|c| c.eq_ignore_ascii_case(s)))
        .map(|s| s.to_string())
        .collect();
    for code in seen {
        if !STANDARD_ORDER.iter().any(|s| s.eq_ignore_ascii_case(code)) {
            ordered.push(code.to_string());
        }
    }
    ordered
}

/// Reshape the filtered records and attach the color scale for `mode`.
pub fn build_heatmap(
    records: &[&ReportRecord],
    scale_by_pages: bool,
    mode: ScalingMode,
) -> HeatmapOutcome {
    let mut cells = reshape(records, scale_by_pages);
    if cells.is_empty() {
        return HeatmapOutcome::NotYetAnalyzed;
    }

    let scale = match mode {
        ScalingMode::WithinFirm => {
            normalize_within_firm(&mut cells);
            ColorScale::new(0.0, 1.0)
        }
        ScalingMode::Overall => {
            let max = cells.iter().map(|c| c.hits).fold(0.0, f64::max);
            ColorScale::new(0.0, max)
        }
    };

    let companies: Vec<String> = cells
        .iter()
        .map(|c| c.company.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let standards = ordered_standards(cells.iter().map(|c| c.standard.as_str()));

    HeatmapOutcome::Ready(Heatmap {
        mode,
        scaled_by_pages: scale_by_pages,
        companies,
        standards,
        cells,
        scale,
    })
}
