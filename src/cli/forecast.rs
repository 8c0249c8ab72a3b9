use super::ui;
use crate::core::config::AppConfig;
use crate::core::feature::{MarketProvider, WeatherProvider};
use crate::core::forecast::{ComponentRow, ForecastWindow};
use crate::models::AdditiveRegressor;
use crate::pipeline::{Enrichment, PipelineReport, PipelineRequest, run_pipeline};
use crate::providers::{AlphaVantageProvider, OpenWeatherProvider};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Default, Args)]
pub struct ForecastArgs {
    /// Sales CSV with `ds` (YYYY-MM-DD) and `y` columns; other columns are regressors
    pub input: PathBuf,

    /// Days to forecast into the future (1-365)
    #[arg(short = 'n', long)]
    pub horizon: Option<u32>,

    /// City for weather enrichment
    #[arg(short, long)]
    pub location: Option<String>,

    /// Currency pair for exchange rate enrichment, e.g. EUR/USD
    #[arg(short, long)]
    pub pair: Option<String>,

    /// Delimiter used when it cannot be detected
    #[arg(short, long)]
    pub delimiter: Option<char>,

    /// Also write the forecast window to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip weather and exchange rate enrichment
    #[arg(long)]
    pub no_enrichment: bool,
}

pub async fn run(config: &AppConfig, args: &ForecastArgs) -> Result<()> {
    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    let delimiter = args.delimiter.unwrap_or(config.forecast.default_delimiter);
    if !delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character, got {delimiter:?}");
    }

    let (location, currency_pair) = if args.no_enrichment {
        (None, None)
    } else {
        (
            args.location.as_deref().or(config.enrichment.location.as_deref()),
            args.pair
                .as_deref()
                .or(config.enrichment.currency_pair.as_deref()),
        )
    };

    let weather = config.providers.weather.as_ref().map(OpenWeatherProvider::new);
    let market = config.providers.market.as_ref().map(AlphaVantageProvider::new);
    let enrichment = Enrichment {
        weather: weather.as_ref().map(|p| p as &dyn WeatherProvider),
        market: market.as_ref().map(|p| p as &dyn MarketProvider),
    };

    let request = PipelineRequest {
        input: &input,
        horizon_days: args.horizon.unwrap_or(config.forecast.horizon_days),
        default_delimiter: delimiter as u8,
        location,
        currency_pair,
    };
    debug!(
        horizon_days = request.horizon_days,
        ?location,
        ?currency_pair,
        "Running forecast"
    );

    let regressor = AdditiveRegressor::new(config.forecast.interval_width)?;
    let pb = ui::new_spinner("Forecasting...");
    let result = run_pipeline(&request, enrichment, regressor).await;
    pb.finish_and_clear();
    let report = result?;

    println!("{}", display_upload(&report));
    ui::print_separator();
    println!("{}", display_forecast(&report.forecast.windows));
    ui::print_separator();
    println!("{}", display_components(&report.forecast.components));

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        write_forecast_csv(file, &report.forecast.windows)
            .with_context(|| format!("Failed to write forecast to {}", path.display()))?;
        println!(
            "\n{}",
            ui::style_text(
                &format!("Forecast written to {}", path.display()),
                ui::StyleType::Subtle
            )
        );
    }

    Ok(())
}

fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "tab".to_string(),
        other => format!("'{}'", other as char),
    }
}

pub fn display_upload(report: &PipelineReport) -> String {
    let mut output = format!(
        "{}\n\nDelimiter: {}\nColumns: {}\n",
        ui::style_text("Uploaded data", ui::StyleType::Title),
        delimiter_name(report.delimiter),
        report.columns.join(", ")
    );

    let enrichment = if report.enrichment.is_empty() {
        ui::style_text("none", ui::StyleType::Warning)
    } else {
        report.enrichment.join(", ")
    };
    output.push_str(&format!(
        "{}: {}\n\n",
        ui::style_text("External data", ui::StyleType::Label),
        enrichment
    ));

    let mut table = ui::new_styled_table();
    table.set_header(report.columns.iter().map(|c| ui::header_cell(c)));
    for row in &report.preview {
        let mut cells = vec![
            comfy_table::Cell::new(row.date.to_string()),
            ui::format_optional_cell(row.value, |v| format!("{v:.2}")),
        ];
        cells.extend(
            row.extra_features
                .iter()
                .map(|(_, v)| ui::format_optional_cell(*v, |v| format!("{v:.2}"))),
        );
        table.add_row(cells);
    }
    output.push_str(&table.to_string());
    output
}

pub fn display_forecast(windows: &[ForecastWindow]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ds"),
        ui::header_cell("yhat"),
        ui::header_cell("yhat_lower"),
        ui::header_cell("yhat_upper"),
    ]);
    for window in windows {
        table.add_row(vec![
            comfy_table::Cell::new(window.date.to_string()),
            ui::estimate_cell(window.point_estimate),
            ui::number_cell(window.lower_bound),
            ui::number_cell(window.upper_bound),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Forecast", ui::StyleType::Title),
        table
    )
}

pub fn display_components(components: &[ComponentRow]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ds"),
        ui::header_cell("trend"),
        ui::header_cell("weekly"),
        ui::header_cell("yearly"),
        ui::header_cell("extra_regressors"),
    ]);
    for row in components {
        table.add_row(vec![
            comfy_table::Cell::new(row.date.to_string()),
            ui::number_cell(row.trend),
            ui::number_cell(row.weekly),
            ui::number_cell(row.yearly),
            ui::number_cell(row.extra_regressors),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Components", ui::StyleType::Title),
        table
    )
}

/// Writes `ds,yhat,yhat_lower,yhat_upper` rows.
pub fn write_forecast_csv<W: Write>(writer: W, windows: &[ForecastWindow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for window in windows {
        writer.serialize(window)?;
    }
    writer.flush()?;
    Ok(())
}
