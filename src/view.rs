//! Render-ready projection of a ranked site for the host UI.

use serde::Serialize;

use crate::site::Site;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f64,
}

impl ScoreColor {
    /// Green up to a score of 1, fading through yellow to red at 3.
    pub fn for_score(score: f64) -> Self {
        let red = (255.0 * score - 255.0).clamp(0.0, 255.0).round() as u8;
        let green = (-255.0 * score + 765.0).clamp(0.0, 255.0).round() as u8;
        Self { red, green, blue: 100, alpha: 0.8 }
    }

    pub fn css(&self) -> String {
        format!("rgba({},{},{}, {})", self.red, self.green, self.blue, self.alpha)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteView {
    pub callsign: String,
    pub parent_callsign: Option<String>,
    pub label: String,
    pub frequency: f64,
    pub frequency_text: String,
    pub city: String,
    pub state: String,
    pub distance_mi: f64,
    pub distance_text: String,
    pub bearing_deg: u16,
    pub bearing_text: String,
    pub range_mi: f64,
    pub score: f64,
    pub color: ScoreColor,
}

fn round_two(f: f64) -> f64 {
    (f * 100.0).round() / 100.0
}

/// Translators show as `PARENT (via CALL)`.
pub fn site_label(site: &Site) -> String {
    match site.parent_callsign() {
        Some(parent) => format!("{} (via {})", parent, site.callsign()),
        None => site.callsign().to_string(),
    }
}

impl SiteView {
    /// Only meaningful for sites that were visible in the latest cycle.
    pub fn from_site(site: &Site) -> Self {
        let d = &site.derived;
        let distance = round_two(d.distance);
        Self {
            callsign: site.callsign().to_string(),
            parent_callsign: site.parent_callsign().map(str::to_string),
            label: site_label(site),
            frequency: site.frequency(),
            frequency_text: format!("{} MHz", site.frequency()),
            city: site.city().to_string(),
            state: site.state().to_string(),
            distance_mi: distance,
            distance_text: format!("{} mi", distance),
            bearing_deg: d.bearing_to,
            bearing_text: format!("{}\u{00b0}", d.bearing_to),
            range_mi: d.range,
            score: d.score,
            color: ScoreColor::for_score(d.score),
        }
    }
}

pub fn views(ranked: &[&Site]) -> Vec<SiteView> {
    ranked.iter().map(|site| SiteView::from_site(site)).collect()
}
