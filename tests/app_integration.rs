use std::fs;
use tracing::info;

// Mock servers and temp files shared by the tests below
mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_weather_mock_server(location: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", location))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_failing_market_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_fx_mock_server(mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "FX_DAILY"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        std::fs::write(file.path(), contents).expect("Failed to write temp file");
        file
    }
}

const SALES_CSV: &str = "ds;y;stock_on_hand\n\
2024-01-01;100;40\n\
2024-01-02;110;38\n\
2024-01-03;120;\n\
2024-01-04;130;35\n";

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_enrichment_mocks() {
    let weather_response = r#"{
        "list": [
            {"dt_txt": "2024-01-01 09:00:00", "main": {"temp": 1.0}},
            {"dt_txt": "2024-01-01 15:00:00", "main": {"temp": 3.0}},
            {"dt_txt": "2024-01-03 12:00:00", "main": {"temp": 6.0}}
        ]
    }"#;
    let weather_server =
        test_utils::create_weather_mock_server("Berlin", weather_response).await;
    let market_server = test_utils::create_failing_market_mock_server().await;

    let config_file = test_utils::write_temp(&format!(
        r#"
        providers:
          weather:
            base_url: {}
            api_key: "weather-key"
          market:
            base_url: {}
            api_key: "market-key"
        forecast:
          horizon_days: 5
        enrichment:
          location: "Berlin"
          currency_pair: "EUR/USD"
    "#,
        weather_server.uri(),
        market_server.uri()
    ));
    let input_file = test_utils::write_temp(SALES_CSV);
    let output_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output_path = output_dir.path().join("forecast.csv");

    let args = salecast::ForecastArgs {
        input: input_file.path().to_path_buf(),
        output: Some(output_path.clone()),
        ..Default::default()
    };
    let result = salecast::run_command(
        salecast::AppCommand::Forecast(args),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Forecast command failed with: {:?}",
        result.err()
    );

    let written = fs::read_to_string(&output_path).expect("Forecast file missing");
    info!(%written, "Forecast output");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "ds,yhat,yhat_lower,yhat_upper");
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("2024-01-05,"));
    assert!(lines[5].starts_with("2024-01-09,"));
}

#[test_log::test(tokio::test)]
async fn test_pipeline_degrades_when_market_fails() {
    use salecast::core::config::{MarketProviderConfig, WeatherProviderConfig};
    use salecast::core::feature::{MarketProvider, WeatherProvider};
    use salecast::models::AdditiveRegressor;
    use salecast::pipeline::{Enrichment, PipelineRequest, run_pipeline};
    use salecast::providers::{AlphaVantageProvider, OpenWeatherProvider};

    let weather_response =
        r#"{"list": [{"dt_txt": "2024-01-02 12:00:00", "main": {"temp": 4.0}}]}"#;
    let weather_server =
        test_utils::create_weather_mock_server("Berlin", weather_response).await;
    let market_server = test_utils::create_failing_market_mock_server().await;

    let weather = OpenWeatherProvider::new(&WeatherProviderConfig {
        base_url: weather_server.uri(),
        api_key: Some("weather-key".to_string()),
        units: "metric".to_string(),
    });
    let market = AlphaVantageProvider::new(&MarketProviderConfig {
        base_url: market_server.uri(),
        api_key: Some("market-key".to_string()),
    });

    let request = PipelineRequest {
        input: SALES_CSV.as_bytes(),
        horizon_days: 3,
        default_delimiter: b',',
        location: Some("Berlin"),
        currency_pair: Some("EUR/USD"),
    };
    let enrichment = Enrichment {
        weather: Some(&weather as &dyn WeatherProvider),
        market: Some(&market as &dyn MarketProvider),
    };

    let report = run_pipeline(&request, enrichment, AdditiveRegressor::default())
        .await
        .expect("Pipeline should not fail on an unavailable market service");

    assert_eq!(report.delimiter, b';');
    assert_eq!(report.columns, vec!["ds", "y", "stock_on_hand"]);
    assert_eq!(report.enrichment, vec!["temperature".to_string()]);
    assert_eq!(
        report.forecast.regressors,
        vec!["stock_on_hand".to_string(), "temperature".to_string()]
    );
    assert_eq!(report.forecast.horizon(), 3);
}

#[test_log::test(tokio::test)]
async fn test_forecast_without_enrichment_uses_no_network() {
    let config_file = test_utils::write_temp(
        r#"
        providers:
          weather:
            base_url: "http://127.0.0.1:9"
            api_key: "unused"
        enrichment:
          location: "Berlin"
    "#,
    );
    let input_file =
        test_utils::write_temp("ds,y\n2024-01-01,100\n2024-01-02,110\n2024-01-03,120\n");

    let args = salecast::ForecastArgs {
        input: input_file.path().to_path_buf(),
        horizon: Some(2),
        no_enrichment: true,
        ..Default::default()
    };
    let result = salecast::run_command(
        salecast::AppCommand::Forecast(args),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Forecast failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_schema_error_surfaces_to_caller() {
    let config_file = test_utils::write_temp("{}");
    let input_file = test_utils::write_temp("date,sales\n2024-01-01,1\n");

    let args = salecast::ForecastArgs {
        input: input_file.path().to_path_buf(),
        no_enrichment: true,
        ..Default::default()
    };
    let err = salecast::run_command(
        salecast::AppCommand::Forecast(args),
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .unwrap_err();

    let forecast_err = err
        .downcast_ref::<salecast::core::ForecastError>()
        .expect("Expected a pipeline error");
    assert_eq!(
        forecast_err,
        &salecast::core::ForecastError::Schema("missing required column(s): ds, y".to_string())
    );
}

#[test_log::test(tokio::test)]
async fn test_out_of_range_horizon_is_rejected() {
    let config_file = test_utils::write_temp("{}");
    let input_file =
        test_utils::write_temp("ds,y\n2024-01-01,100\n2024-01-02,110\n2024-01-03,120\n");

    for horizon in [0, 400] {
        let args = salecast::ForecastArgs {
            input: input_file.path().to_path_buf(),
            horizon: Some(horizon),
            no_enrichment: true,
            ..Default::default()
        };
        let err = salecast::run_command(
            salecast::AppCommand::Forecast(args),
            Some(config_file.path().to_str().unwrap()),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<salecast::core::ForecastError>(),
            Some(salecast::core::ForecastError::Validation(_))
        ));
    }
}

#[test_log::test(tokio::test)]
async fn test_non_finite_exchange_rate_degrades_to_no_enrichment() {
    use salecast::core::config::MarketProviderConfig;
    use salecast::core::feature::MarketProvider;
    use salecast::models::AdditiveRegressor;
    use salecast::pipeline::{Enrichment, PipelineRequest, run_pipeline};
    use salecast::providers::AlphaVantageProvider;

    let fx_response = r#"{"Time Series FX (Daily)": {
        "2024-01-01": {"4. close": "NaN"},
        "2024-01-02": {"4. close": "1.0940"},
        "2024-01-03": {"4. close": "1.0925"}
    }}"#;
    let market_server = test_utils::create_fx_mock_server(fx_response).await;
    let market = AlphaVantageProvider::new(&MarketProviderConfig {
        base_url: market_server.uri(),
        api_key: Some("market-key".to_string()),
    });

    let request = PipelineRequest {
        input: b"ds,y\n2024-01-01,100\n2024-01-02,110\n2024-01-03,120\n",
        horizon_days: 2,
        default_delimiter: b',',
        location: None,
        currency_pair: Some("EUR/USD"),
    };
    let enrichment = Enrichment {
        weather: None,
        market: Some(&market as &dyn MarketProvider),
    };

    let report = run_pipeline(&request, enrichment, AdditiveRegressor::default())
        .await
        .expect("A bad exchange rate payload should not fail the forecast");

    assert!(report.enrichment.is_empty());
    assert!(report.forecast.regressors.is_empty());
    assert_eq!(report.forecast.horizon(), 2);
    assert!(report.forecast.windows.iter().all(|w| w.point_estimate.is_finite()));
}
