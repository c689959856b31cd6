//! Technical report model.
//!
//! Everything a renderer needs to draw the results table, the two charts
//! and the conclusion paragraph, computed from an `AssessmentResult`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::assessment::{AlgalBloomLevel, AssessmentResult};
use crate::simulator::underscore_slug;

pub const REPORT_TITLE: &str = "Rapid Ecological Assessment – Gulf of California Site";

pub const RADAR_AXES: [&str; 5] = [
    "Coral Health",
    "Fish Density",
    "Invertebrates",
    "Algal Health",
    "Fish Health Index",
];

/// Cabo Pulmo reference profile on the radar axes.
pub const CABO_PULMO_RADAR: [f64; 5] = [80.0, 90.0, 65.0, 90.0, 85.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Good,
    Moderate,
    Low,
    High,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Good => "GOOD",
            Status::Moderate => "MODERATE",
            Status::Low => "LOW",
            Status::High => "HIGH",
        }
    }
}

pub fn fhi_status(fhi: f64) -> Status {
    if fhi > 0.7 {
        Status::Good
    } else if fhi > 0.5 {
        Status::Moderate
    } else {
        Status::Low
    }
}

pub fn fish_density_status(density: i64) -> Status {
    if density > 180 {
        Status::Good
    } else {
        Status::Moderate
    }
}

pub fn invertebrate_status(cover: i64) -> Status {
    if cover > 40 {
        Status::Good
    } else {
        Status::Moderate
    }
}

pub fn algal_status(level: AlgalBloomLevel) -> Status {
    match level {
        AlgalBloomLevel::High => Status::High,
        AlgalBloomLevel::Low => Status::Low,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub parameter: &'static str,
    pub value: String,
    pub status: Status,
    pub reference: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub labels: [&'static str; 3],
    pub values: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarSeries {
    pub name: &'static str,
    pub values: [f64; 5],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: &'static str,
    pub location: String,
    pub date: String,
    pub diver: String,
    pub depth_range: String,
    pub regenerated: bool,
    pub rows: Vec<ReportRow>,
    pub fish_health_chart: BarSeries,
    pub threat_radar: [RadarSeries; 2],
    pub conclusion: String,
}

impl Report {
    pub fn from_result(r: &AssessmentResult) -> Self {
        Self {
            title: REPORT_TITLE,
            location: r.location.clone(),
            date: r.date.clone(),
            diver: r.diver.clone(),
            depth_range: r.depth_range.clone(),
            regenerated: r.is_regenerated,
            rows: rows(r),
            fish_health_chart: fish_health_chart(r),
            threat_radar: [
                RadarSeries { name: "Current Site", values: radar_profile(r) },
                RadarSeries { name: "Cabo Pulmo Baseline", values: CABO_PULMO_RADAR },
            ],
            conclusion: conclusion(r),
        }
    }

    /// Plain-text rendering for terminals.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(self.title);
        out.push('\n');
        if self.regenerated {
            out.push_str("(regenerated with adjusted parameters)\n");
        }
        out.push_str(&format!(
            "Location: {}  Date: {}  Diver: {}  Depth: {}\n\n",
            self.location, self.date, self.diver, self.depth_range
        ));
        out.push_str(&format!(
            "{:<28} {:<16} {:<10} {}\n",
            "Parameter", "Value", "Status", "Reference Range"
        ));
        for row in &self.rows {
            out.push_str(&format!(
                "{:<28} {:<16} {:<10} {}\n",
                row.parameter,
                row.value,
                row.status.label(),
                row.reference
            ));
        }
        out.push('\n');
        out.push_str(&self.conclusion);
        out.push('\n');
        out
    }
}

fn rows(r: &AssessmentResult) -> Vec<ReportRow> {
    vec![
        ReportRow {
            parameter: "Fish Health Index (FHI)",
            value: format!("{:.2}", r.fish_health_index),
            status: fhi_status(r.fish_health_index),
            reference: "0.60-1.00 (Healthy)",
        },
        ReportRow {
            parameter: "Fish Density",
            value: format!("{} fish/ha", r.fish_density),
            status: fish_density_status(r.fish_density),
            reference: "180-300 fish/ha",
        },
        ReportRow {
            parameter: "Invertebrate Cover",
            value: format!("{}%", r.invertebrate_cover),
            status: invertebrate_status(r.invertebrate_cover),
            reference: "40-70% (Optimal)",
        },
        ReportRow {
            parameter: "Coral Bleaching",
            value: format!("{}%", r.coral_bleaching),
            status: Status::Moderate,
            reference: "<15% (Low Risk)",
        },
        ReportRow {
            parameter: "Invasive Species",
            value: format!("{} detected", r.invasive_species),
            status: Status::Good,
            reference: "0 (Optimal)",
        },
        ReportRow {
            parameter: "Algal Bloom Risk",
            value: format!("{:.2}", r.algal_bloom_score),
            status: algal_status(r.algal_bloom_level),
            reference: "<0.30 (Low Risk)",
        },
    ]
}

pub fn fish_health_chart(r: &AssessmentResult) -> BarSeries {
    BarSeries {
        labels: ["Fish Density", "Invertebrate Cover", "Fish Health Index"],
        // density is scaled by 1/3 to share the 0-100 axis
        values: [
            r.fish_density as f64 / 3.0,
            r.invertebrate_cover as f64,
            r.fish_health_index * 100.0,
        ],
    }
}

/// Current-site profile on `RADAR_AXES`, higher is healthier on every axis.
pub fn radar_profile(r: &AssessmentResult) -> [f64; 5] {
    let algal_health = match r.algal_bloom_level {
        AlgalBloomLevel::Low => 80.0,
        AlgalBloomLevel::High => 20.0,
    };
    [
        100.0 - r.coral_bleaching as f64 * 4.0,
        r.fish_density as f64 / 3.0,
        r.invertebrate_cover as f64,
        algal_health,
        r.fish_health_index * 100.0,
    ]
}

pub fn conclusion(r: &AssessmentResult) -> String {
    let fhi = r.fish_health_index;
    let mut text = if fhi > 0.7 {
        "The reef site shows robust fish density and relatively good ecosystem health indicators. "
            .to_string()
    } else if fhi > 0.5 {
        "The reef site shows moderate fish density and ecosystem health. ".to_string()
    } else {
        "The reef site shows concerning levels of fish density and potential ecosystem stress. "
            .to_string()
    };

    match r.algal_bloom_level {
        AlgalBloomLevel::High => {
            text.push_str(
                "The high algal bloom levels detected are concerning and may indicate nutrient \
                 loading or other environmental stressors. ",
            );
            text.push_str(
                "Recommend immediate follow-up monitoring and potential intervention strategies \
                 to mitigate algal impacts on the reef ecosystem.",
            );
        }
        AlgalBloomLevel::Low => {
            text.push_str(
                "The coral bleaching level of 20% suggests moderate thermal stress that should be \
                 monitored, but is not yet at crisis levels. ",
            );
            text.push_str(
                "Continued monitoring recommended, especially during summer temperature peaks.",
            );
        }
    }
    text
}

/// Download name for the server-rendered PDF.
pub fn pdf_filename(location: &str, date: NaiveDate) -> String {
    format!(
        "reef_assessment_{}_{}.pdf",
        underscore_slug(location),
        date.format("%Y%m%d")
    )
}
