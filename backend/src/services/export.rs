//! Daily farm summary export
//!
//! Renders the dashboard regions into a paginated plain-text document and
//! the history window into CSV.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::{SensorReading, SoilMoistureLevel, WeatherCondition};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::ExportConfig;
use crate::error::{AppError, AppResult};
use crate::services::dashboard::{DashboardState, RefreshController};

pub const SUMMARY_TITLE: &str = "AgriSuggest AI - Daily Farm Summary";

const EXPORT_ERROR: &str = "Could not generate the farm summary. Please try again.";

/// Lines kept free at the bottom of every page for the footer
const FOOTER_LINES: usize = 2;

/// Dashboard regions, in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryRegion {
    WeatherHero,
    QuickStats,
    CropRecommendations,
    Trends,
    Forecast,
}

impl SummaryRegion {
    pub const ALL: [SummaryRegion; 5] = [
        SummaryRegion::WeatherHero,
        SummaryRegion::QuickStats,
        SummaryRegion::CropRecommendations,
        SummaryRegion::Trends,
        SummaryRegion::Forecast,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SummaryRegion::WeatherHero => "Current Weather",
            SummaryRegion::QuickStats => "Farm Quick Stats",
            SummaryRegion::CropRecommendations => "AI Crop Recommendations",
            SummaryRegion::Trends => "Sensor Trends",
            SummaryRegion::Forecast => "7-Day Forecast",
        }
    }

    /// Region body, `None` when there is nothing to show
    pub fn render(&self, state: &DashboardState, location: &str) -> Option<Vec<String>> {
        match self {
            SummaryRegion::WeatherHero => render_weather_hero(state, location),
            SummaryRegion::QuickStats => render_quick_stats(state),
            SummaryRegion::CropRecommendations => render_recommendations(state),
            SummaryRegion::Trends => render_trends(state.history.to_vec()),
            SummaryRegion::Forecast => render_forecast(state),
        }
    }
}

/// A laid-out summary, one line list per page
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    pub pages: Vec<Vec<String>>,
    pub regions: Vec<SummaryRegion>,
}

impl SummaryDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages joined by form feeds, each ending with a page footer
    pub fn render(&self) -> String {
        let total = self.pages.len();
        self.pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let mut text = page.join("\n");
                text.push_str(&format!("\n\n{:>60}\n", format!("Page {} of {}", i + 1, total)));
                text
            })
            .collect::<Vec<_>>()
            .join("\u{000C}")
    }
}

/// Lay out the header and every non-empty region.
///
/// A region that does not fit in the rest of the page starts a new one.
pub fn build_summary(
    state: &DashboardState,
    location: &str,
    generated_at: DateTime<Utc>,
    page_height: usize,
) -> SummaryDocument {
    let usable = page_height.saturating_sub(FOOTER_LINES).max(1);

    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut page = vec![
        SUMMARY_TITLE.to_string(),
        generated_at.format("%Y-%m-%d - %H:%M:%S UTC").to_string(),
        location.to_string(),
        String::new(),
    ];
    let mut regions = Vec::new();

    for region in SummaryRegion::ALL {
        let Some(body) = region.render(state, location) else {
            continue;
        };
        regions.push(region);

        let mut block = Vec::with_capacity(body.len() + 3);
        block.push(region.title().to_string());
        block.push("-".repeat(region.title().len()));
        block.extend(body);
        block.push(String::new());

        if page.len() + block.len() > usable && block.len() <= usable {
            pages.push(std::mem::take(&mut page));
        }
        // Blocks taller than a page are split across pages
        for line in block {
            if page.len() == usable {
                pages.push(std::mem::take(&mut page));
            }
            page.push(line);
        }
    }

    if !page.is_empty() {
        pages.push(page);
    }

    SummaryDocument { pages, regions }
}

/// `AgriSuggest_Summary_<YYYY-MM-DD>.txt`
pub fn summary_file_name(date: NaiveDate) -> String {
    format!("AgriSuggest_Summary_{}.txt", date.format("%Y-%m-%d"))
}

fn render_weather_hero(state: &DashboardState, location: &str) -> Option<Vec<String>> {
    let weather = state.weather.as_ref()?;
    let current = &weather.current;

    let mut lines = vec![
        location.to_string(),
        format!(
            "{:.1}°C, {} ({})",
            current.temperature_celsius,
            WeatherCondition::from_code(current.weather_code),
            if current.is_day { "day" } else { "night" }
        ),
        format!(
            "Humidity: {:.0}%  Wind: {:.1} km/h",
            current.humidity_percent, current.wind_speed_kmh
        ),
    ];
    if let Some(today) = weather.today() {
        lines.push(format!(
            "Today: High {:.1}°C / Low {:.1}°C, UV {:.1}, Rain {:.0}%",
            today.max_temperature_celsius,
            today.min_temperature_celsius,
            today.uv_index_max,
            today.precipitation_probability_percent
        ));
    }
    Some(lines)
}

fn render_quick_stats(state: &DashboardState) -> Option<Vec<String>> {
    let reading = state.latest.as_ref()?;
    let level = match SoilMoistureLevel::from_percent(reading.soil_moisture) {
        SoilMoistureLevel::Dry => "Dry",
        SoilMoistureLevel::Moderate => "Moderate",
        SoilMoistureLevel::Optimal => "Optimal",
        SoilMoistureLevel::Wet => "Wet",
    };

    Some(vec![
        format!("Device: {}", reading.device_label()),
        format!("Temperature: {:.1}°C", reading.temperature),
        format!("Humidity: {:.1}%", reading.humidity),
        format!("Light Intensity: {:.0} lux", reading.light_intensity),
        format!("Soil Moisture: {:.1}% ({})", reading.soil_moisture, level),
        format!("Recorded: {}", reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
    ])
}

fn render_recommendations(state: &DashboardState) -> Option<Vec<String>> {
    if state.recommendations.is_empty() {
        return None;
    }

    let mut lines = Vec::with_capacity(state.recommendations.len() * 3);
    for (rank, crop) in state.recommendations.iter().enumerate() {
        lines.push(format!(
            "#{} {} ({}/100) - {}, {}",
            rank + 1,
            crop.crop_name,
            crop.suitability_score,
            crop.difficulty,
            crop.growing_season
        ));
        lines.push(format!("    {}", crop.rationale));
        lines.push(format!(
            "    Water Need {}/10 | Market Value {}/10 | Pest Resistance {}/10",
            crop.comparison_metrics.water_need,
            crop.comparison_metrics.market_value,
            crop.comparison_metrics.pest_resistance
        ));
    }
    Some(lines)
}

fn render_trends(history: Vec<SensorReading>) -> Option<Vec<String>> {
    let (first, last) = (history.first()?, history.last()?);

    let mut lines = vec![format!(
        "{} readings from {} to {}",
        history.len(),
        first.timestamp.format("%Y-%m-%d %H:%M"),
        last.timestamp.format("%Y-%m-%d %H:%M")
    )];

    let metrics: [(&str, &str, fn(&SensorReading) -> f64); 4] = [
        ("Temperature", "°C", |r| r.temperature),
        ("Humidity", "%", |r| r.humidity),
        ("Light Intensity", " lux", |r| r.light_intensity),
        ("Soil Moisture", "%", |r| r.soil_moisture),
    ];
    for (name, unit, value) in metrics {
        let values: Vec<f64> = history.iter().map(value).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let change = value(last) - value(first);
        lines.push(format!(
            "{}: min {:.1}{unit}, avg {:.1}{unit}, max {:.1}{unit}, change {:+.1}{unit}",
            name,
            min,
            avg,
            max,
            change,
            unit = unit
        ));
    }
    Some(lines)
}

fn render_forecast(state: &DashboardState) -> Option<Vec<String>> {
    let weather = state.weather.as_ref()?;
    if weather.daily.is_empty() {
        return None;
    }

    Some(
        weather
            .daily
            .iter()
            .map(|day| {
                format!(
                    "{}  {:<13} {:>5.1}°C / {:>5.1}°C  Rain {:>3.0}%",
                    day.date.format("%a %d %b"),
                    WeatherCondition::from_code(day.weather_code).to_string(),
                    day.max_temperature_celsius,
                    day.min_temperature_celsius,
                    day.precipitation_probability_percent
                )
            })
            .collect(),
    )
}

/// History window row as written to CSV
#[derive(Debug, Serialize)]
struct HistoryCsvRow<'a> {
    timestamp: String,
    device_id: &'a str,
    temperature_c: f64,
    humidity_pct: f64,
    light_lux: f64,
    soil_moisture_pct: f64,
}

impl<'a> From<&'a SensorReading> for HistoryCsvRow<'a> {
    fn from(reading: &'a SensorReading) -> Self {
        Self {
            timestamp: reading.timestamp.to_rfc3339(),
            device_id: reading.device_id.as_deref().unwrap_or(""),
            temperature_c: reading.temperature,
            humidity_pct: reading.humidity,
            light_lux: reading.light_intensity,
            soil_moisture_pct: reading.soil_moisture,
        }
    }
}

/// Export serializable rows as CSV
pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in data {
        wtr.serialize(record)
            .map_err(|e| AppError::Export(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Export(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Export(format!("UTF-8 conversion error: {}", e)))
}

/// Where and how a summary was written
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReceipt {
    pub file_name: String,
    pub path: String,
    pub page_count: usize,
    pub regions: Vec<SummaryRegion>,
}

/// Writes summary documents from the current dashboard state
#[derive(Clone)]
pub struct ExportService {
    controller: RefreshController,
    output_dir: PathBuf,
    page_height: usize,
    in_progress: Arc<Mutex<()>>,
}

impl ExportService {
    pub fn new(controller: RefreshController, config: &ExportConfig) -> Self {
        Self {
            controller,
            output_dir: PathBuf::from(&config.output_dir),
            page_height: config.page_height,
            in_progress: Arc::new(Mutex::new(())),
        }
    }

    /// Write today's summary document.
    ///
    /// Failures are also reported on the dashboard until the next attempt.
    pub async fn export_summary(&self) -> AppResult<ExportReceipt> {
        let _exporting = self.in_progress.lock().await;
        self.controller.set_export_error(None).await;

        match self.write_summary(Utc::now()).await {
            Ok(receipt) => {
                info!(
                    "Exported {} ({} pages)",
                    receipt.file_name, receipt.page_count
                );
                Ok(receipt)
            }
            Err(e) => {
                error!("Failed to generate summary: {}", e);
                self.controller
                    .set_export_error(Some(EXPORT_ERROR.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn write_summary(&self, now: DateTime<Utc>) -> AppResult<ExportReceipt> {
        let state = self.controller.snapshot().await;
        let location = state.location.display_name();
        let document = build_summary(&state, &location, now, self.page_height);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::Export(format!("Cannot create {}: {}", self.output_dir.display(), e)))?;

        let file_name = summary_file_name(now.date_naive());
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, document.render())
            .await
            .map_err(|e| AppError::Export(format!("Cannot write {}: {}", path.display(), e)))?;

        Ok(ExportReceipt {
            file_name,
            path: path.display().to_string(),
            page_count: document.page_count(),
            regions: document.regions,
        })
    }

    /// History window as CSV, oldest first
    pub async fn history_csv(&self) -> AppResult<String> {
        let history = self.controller.history().await;
        let rows: Vec<HistoryCsvRow> = history.iter().map(HistoryCsvRow::from).collect();
        export_to_csv(&rows)
    }
}
