//! Optional current-weather lookup shown alongside the chat.
//!
//! Purely decorative: every failure is logged and reported as `None`, and
//! nothing here touches a conversation.

use serde::Deserialize;
use std::time::Duration;

const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub temperature_c: f64,
    pub condition: String,
    pub humidity: Option<u8>,
    pub wind_speed: Option<f64>,
}

impl WeatherReport {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {:.1}°C, {}",
            self.city, self.temperature_c, self.condition
        );
        if let Some(humidity) = self.humidity {
            line.push_str(&format!(", humidity {}%", humidity));
        }
        if let Some(wind) = self.wind_speed {
            line.push_str(&format!(", wind {:.1} m/s", wind));
        }
        line
    }
}

pub struct WeatherClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl WeatherClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            base_url: OPENWEATHER_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn fetch_weather(&self, city: &str) -> Option<WeatherReport> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }
        let Some(api_key) = &self.api_key else {
            tracing::debug!("weather lookup skipped, no API key");
            return None;
        };

        let url = format!("{}/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", api_key.as_str()), ("units", "metric")])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(city, error = %e.without_url(), "weather request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(city, status = %response.status(), "weather lookup rejected");
            return None;
        }

        match response.json::<OpenWeatherResponse>().await {
            Ok(body) => Some(body.into_report()),
            Err(e) => {
                tracing::warn!(city, error = %e.without_url(), "unreadable weather response");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    name: String,
    main: OpenWeatherMain,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
    wind: Option<OpenWeatherWind>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherWind {
    speed: f64,
}

impl OpenWeatherResponse {
    fn into_report(self) -> WeatherReport {
        WeatherReport {
            city: self.name,
            temperature_c: self.main.temp,
            condition: self
                .weather
                .into_iter()
                .next()
                .map(|w| w.description)
                .unwrap_or_else(|| "unknown".to_string()),
            humidity: self.main.humidity,
            wind_speed: self.wind.map(|w| w.speed),
        }
    }
}
