use serde::Serialize;

use banter_core::config::AnalyticsConfig;

/// One remote text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallRecord {
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// One speech synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsRecord {
    pub provider: String,
    pub char_count: usize,
    pub latency_ms: u64,
}

/// Destination for usage records.
///
/// Every method is fire-and-forget: implementations log their own failures
/// and never return them to the caller.
pub trait AnalyticsSink: Send + Sync {
    fn track_api_call(&self, record: ApiCallRecord);

    fn track_tts(&self, record: TtsRecord);

    fn track_error(&self, component: &str, message: &str);
}

/// Discards everything. Used when analytics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnalytics;

impl AnalyticsSink for NullAnalytics {
    fn track_api_call(&self, _record: ApiCallRecord) {}

    fn track_tts(&self, _record: TtsRecord) {}

    fn track_error(&self, _component: &str, _message: &str) {}
}

/// Prices used to turn usage into cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    pub per_1k_input: f64,
    pub per_1k_output: f64,
    pub tts_per_1k_chars: f64,
}

impl CostRates {
    pub fn api_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens) / 1000.0 * self.per_1k_input
            + f64::from(output_tokens) / 1000.0 * self.per_1k_output
    }

    pub fn tts_cost(&self, char_count: usize) -> f64 {
        char_count as f64 / 1000.0 * self.tts_per_1k_chars
    }
}

impl From<&AnalyticsConfig> for CostRates {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            per_1k_input: config.cost_per_1k_input,
            per_1k_output: config.cost_per_1k_output,
            tts_per_1k_chars: config.tts_cost_per_1k_chars,
        }
    }
}

impl Default for CostRates {
    fn default() -> Self {
        (&AnalyticsConfig::default()).into()
    }
}

/// Aggregated usage for a session or for the whole database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub sessions: u64,
    pub api_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub api_cost: f64,
    pub avg_latency_ms: f64,
    pub tts_requests: u64,
    pub tts_chars: u64,
    pub tts_cost: f64,
    pub errors: u64,
}

impl UsageStats {
    pub fn total_cost(&self) -> f64 {
        self.api_cost + self.tts_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_cost() {
        let rates = CostRates {
            per_1k_input: 0.5,
            per_1k_output: 1.5,
            tts_per_1k_chars: 0.3,
        };
        let cost = rates.api_cost(2000, 1000);
        assert!((cost - 2.5).abs() < 1e-9);
        assert_eq!(rates.api_cost(0, 0), 0.0);
    }

    #[test]
    fn test_tts_cost() {
        let rates = CostRates {
            per_1k_input: 0.0,
            per_1k_output: 0.0,
            tts_per_1k_chars: 0.3,
        };
        assert!((rates.tts_cost(500) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_rates_from_config() {
        let config = AnalyticsConfig {
            cost_per_1k_input: 1.0,
            cost_per_1k_output: 2.0,
            tts_cost_per_1k_chars: 3.0,
            ..AnalyticsConfig::default()
        };
        let rates = CostRates::from(&config);
        assert_eq!(rates.per_1k_output, 2.0);
        assert_eq!(rates.tts_per_1k_chars, 3.0);
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink: &dyn AnalyticsSink = &NullAnalytics;
        sink.track_api_call(ApiCallRecord {
            provider: "openai".into(),
            model: "m".into(),
            input_tokens: 1,
            output_tokens: 1,
            latency_ms: 1,
        });
        sink.track_error("generation", "boom");
    }

    #[test]
    fn test_total_cost() {
        let stats = UsageStats {
            api_cost: 1.25,
            tts_cost: 0.5,
            ..UsageStats::default()
        };
        assert!((stats.total_cost() - 1.75).abs() < 1e-9);
    }
}
