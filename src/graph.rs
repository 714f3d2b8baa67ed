use crate::topics::{Heatmap, ScalingMode, TopicHit};

#[cfg(feature = "web")]
use crate::topics::Rgb;
#[cfg(feature = "web")]
use plotters::prelude::*;

/// Configuration options for heatmap rendering
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the graph
    pub title: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of one company row in pixels
    pub row_height: u32,

    /// Width reserved for company names
    pub label_width: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 900,
            row_height: 28,
            label_width: 220,
        }
    }
}

#[cfg(feature = "web")]
const LEGEND_WIDTH: u32 = 120;
#[cfg(feature = "web")]
const HEADER_HEIGHT: u32 = 60;

/// Renders the heatmap as an SVG document
///
/// Companies run down the left edge in the order given by the heatmap,
/// standards run along the top in canonical order. Each cell is colored from
/// the heatmap's color scale; a legend on the right shows the scale anchors.
///
/// # Arguments
/// * `heatmap` - Reshaped and scaled topic references
/// * `options` - Size and caption
///
/// # Returns
/// * A Result containing the SVG markup or an error
#[cfg(feature = "web")]
pub fn render_heatmap_svg(
    heatmap: &Heatmap,
    options: &GraphOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let n_x = heatmap.standards.len();
    let n_y = heatmap.companies.len();
    let height = HEADER_HEIGHT + options.row_height * n_y as u32 + 20;
    let width = options.width.max(options.label_width + LEGEND_WIDTH + 60);

    // Segmented y runs bottom-up, so the first company takes the top row.
    let companies_bottom_up: Vec<String> = heatmap.companies.iter().rev().cloned().collect();

    let mut svg = String::new();
    let mut tooltips = Vec::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        let (chart_area, legend_area) = root.split_horizontally((width - LEGEND_WIDTH) as i32);

        let mut chart = ChartBuilder::on(&chart_area)
            .caption(&options.title, ("sans-serif", 20).into_font())
            .margin(10)
            .top_x_label_area_size(30)
            .y_label_area_size(options.label_width as i32)
            .build_cartesian_2d((0..n_x).into_segmented(), (0..n_y).into_segmented())?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n_x)
            .y_labels(n_y)
            .x_label_formatter(&|v| segment_label(v, &heatmap.standards))
            .y_label_formatter(&|v| segment_label(v, &companies_bottom_up))
            .label_style(("sans-serif", 12))
            .draw()?;

        let cells: Vec<(usize, usize, Rgb, &TopicHit)> = heatmap
            .cells
            .iter()
            .filter_map(|cell| {
                let x = heatmap.standards.iter().position(|s| *s == cell.standard)?;
                let row = heatmap.companies.iter().position(|c| *c == cell.company)?;
                let color = heatmap.scale.color_for(heatmap.color_value(cell));
                Some((x, n_y - 1 - row, color, cell))
            })
            .collect();

        chart.draw_series(cells.iter().map(|&(x, y, Rgb(r, g, b), _)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                RGBColor(r, g, b).filled(),
            )
        }))?;
        chart.draw_series(cells.iter().map(|&(x, y, _, _)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                RGBColor(211, 211, 211).stroke_width(1),
            )
        }))?;

        // Transparent overlays carry the hover text; plotters has no <title> element.
        for &(x, y, _, cell) in &cells {
            let (x0, y0) = chart.backend_coord(&(SegmentValue::Exact(x), SegmentValue::Exact(y + 1)));
            let (x1, y1) = chart.backend_coord(&(SegmentValue::Exact(x + 1), SegmentValue::Exact(y)));
            tooltips.push(format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill-opacity=\"0\"><title>{}</title></rect>",
                x0.min(x1),
                y0.min(y1),
                (x1 - x0).abs(),
                (y1 - y0).abs(),
                handlebars::html_escape(&tooltip(cell, heatmap.scaled_by_pages)),
            ));
        }

        legend_area.draw(&Text::new(
            "Referenced",
            (10, HEADER_HEIGHT as i32 - 20),
            ("sans-serif", 14).into_font(),
        ))?;
        for (i, (value, color)) in heatmap
            .scale
            .domain
            .iter()
            .zip(heatmap.scale.range)
            .enumerate()
        {
            let y = HEADER_HEIGHT as i32 + i as i32 * 24;
            let swatch = [(10, y), (28, y + 18)];
            legend_area.draw(&Rectangle::new(
                swatch,
                RGBColor(color.0, color.1, color.2).filled(),
            ))?;
            legend_area.draw(&Rectangle::new(swatch, RGBColor(211, 211, 211).stroke_width(1)))?;
            legend_area.draw(&Text::new(
                format_value(*value, heatmap.scaled_by_pages),
                (34, y + 3),
                ("sans-serif", 12).into_font(),
            ))?;
        }

        root.present()?;
    }

    if let Some(end) = svg.rfind("</svg>") {
        svg.insert_str(end, &tooltips.concat());
    }
    Ok(svg)
}

/// Hover text of one heatmap cell.
pub fn tooltip(cell: &TopicHit, scaled_by_pages: bool) -> String {
    format!(
        "Company: {}\nStandard: {}\nHits: {}",
        cell.company,
        cell.standard,
        format_value(cell.hits, scaled_by_pages)
    )
}

#[cfg(feature = "web")]
fn segment_label(value: &SegmentValue<usize>, names: &[String]) -> String {
    match value {
        SegmentValue::CenterOf(i) => names.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Hit counts are whole numbers unless scaled by page count.
pub fn format_value(value: f64, scaled_by_pages: bool) -> String {
    if scaled_by_pages {
        format!("{:.2}", value)
    } else {
        format!("{:.0}", value)
    }
}

/// Plain-text heatmap for terminals: raw hits per cell, `-` where unmeasured.
///
/// Under within-firm scaling each value is followed by its share of the
/// company maximum in percent.
pub fn render_text(heatmap: &Heatmap) -> String {
    let name_width = heatmap
        .companies
        .iter()
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0)
        .max(7);

    let cell_text = |company: &str, standard: &str| match heatmap.cell(company, standard) {
        Some(cell) => match (heatmap.mode, cell.norm_hits) {
            (ScalingMode::WithinFirm, Some(norm)) => format!(
                "{} ({:.0}%)",
                format_value(cell.hits, heatmap.scaled_by_pages),
                norm * 100.0
            ),
            _ => format_value(cell.hits, heatmap.scaled_by_pages),
        },
        None => "-".to_string(),
    };

    let mut col_widths: Vec<usize> = heatmap.standards.iter().map(|s| s.len()).collect();
    for company in &heatmap.companies {
        for (width, standard) in col_widths.iter_mut().zip(&heatmap.standards) {
            *width = (*width).max(cell_text(company, standard).chars().count());
        }
    }

    let mut out = format!("{:<w$}", "Company", w = name_width);
    for (standard, width) in heatmap.standards.iter().zip(&col_widths) {
        out.push_str(&format!("  {:>w$}", standard, w = *width));
    }
    out.push('\n');
    for company in &heatmap.companies {
        out.push_str(&format!("{:<w$}", company, w = name_width));
        for (standard, width) in heatmap.standards.iter().zip(&col_widths) {
            out.push_str(&format!("  {:>w$}", cell_text(company, standard), w = *width));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ReportRecord, tests::sample_records};
    use crate::topics::{HeatmapOutcome, build_heatmap};

    fn heatmap(mode: ScalingMode) -> Heatmap {
        let records = sample_records();
        let refs: Vec<&ReportRecord> = records.iter().collect();
        match build_heatmap(&refs, false, mode) {
            HeatmapOutcome::Ready(heatmap) => heatmap,
            HeatmapOutcome::NotYetAnalyzed => panic!("sample data has topic hits"),
        }
    }

    #[test]
    fn text_heatmap_lists_companies_and_standards() {
        let text = render_text(&heatmap(ScalingMode::Overall));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("E1") && lines[0].contains("G1"));
        assert!(lines[0].find("E1") < lines[0].find("S1"));
        assert!(lines[1].starts_with("Acme Corp"));
        assert!(lines[1].contains('-'));
    }

    #[test]
    fn within_firm_text_shows_share() {
        let text = render_text(&heatmap(ScalingMode::WithinFirm));
        assert!(text.contains("10 (100%)"));
        assert!(text.contains("5 (50%)"));
    }

    #[test]
    fn values_format_by_scaling() {
        assert_eq!(format_value(3.0, false), "3");
        assert_eq!(format_value(0.5, true), "0.50");
    }

    #[cfg(feature = "web")]
    #[test]
    fn svg_contains_labels() {
        let svg = render_heatmap_svg(&heatmap(ScalingMode::Overall), &GraphOptions::default())
            .unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Beta AG"));
        assert!(svg.contains("E2"));
        assert!(svg.contains("Referenced"));
        assert!(svg.contains("<title>Company: Beta AG\nStandard: E1\nHits: 10</title>"));
    }

    #[test]
    fn tooltip_names_company_standard_and_hits() {
        let cell = TopicHit {
            company: "Acme Corp".to_string(),
            standard: "E1".to_string(),
            hits: 0.5,
            norm_hits: None,
        };
        assert_eq!(tooltip(&cell, true), "Company: Acme Corp\nStandard: E1\nHits: 0.50");
    }

    #[cfg(feature = "web")]
    #[test]
    fn svg_tooltips_escape_markup() {
        let mut heatmap = heatmap(ScalingMode::Overall);
        let renamed = "Beta <AG> & Co";
        heatmap.companies = heatmap
            .companies
            .iter()
            .map(|c| if c == "Beta AG" { renamed.to_string() } else { c.clone() })
            .collect();
        for cell in heatmap.cells.iter_mut().filter(|c| c.company == "Beta AG") {
            cell.company = renamed.to_string();
        }
        let svg = render_heatmap_svg(&heatmap, &GraphOptions::default()).unwrap();
        assert!(svg.contains("<title>Company: Beta &lt;AG&gt; &amp; Co\nStandard: E1"));
        assert!(!svg.contains("<title>Company: Beta <AG>"));
    }
}
