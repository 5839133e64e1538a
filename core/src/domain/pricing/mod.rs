//! Pricing service for LLM cost calculations
//!
//! Computes per-span costs from token counts using LiteLLM-format pricing
//! data. Lookup falls back from exact match to "-latest"/":latest" stripping
//! to date-suffix stripping. Thread-safe with read-heavy optimized locking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use parking_lot::RwLock;
use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Embedded pricing data (compile-time)
const EMBEDDED_PRICING_JSON: &str = include_str!("../../../data/model_prices.json");

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Failed to parse pricing data: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// PRICING DATA
// ============================================================================

/// Parsed model pricing entry from LiteLLM JSON
#[derive(Debug, Clone, Default)]
pub struct ModelPricing {
    /// Cost per input token (USD)
    pub input_cost_per_token: f64,
    /// Cost per output token (USD)
    pub output_cost_per_token: f64,
    /// Mode: "chat", "embedding", "completion", etc.
    pub mode: String,
}

/// Parsed and indexed pricing data
///
/// Keys are lowercase for case-insensitive matching.
#[derive(Debug, Default)]
pub struct PricingData {
    models: HashMap<String, ModelPricing>,
    pub model_count: usize,
}

impl PricingData {
    /// Parse pricing data from JSON string
    pub fn from_json_str(json: &str) -> Result<Self, PricingError> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| PricingError::Parse(e.to_string()))?;

        let obj = raw
            .as_object()
            .ok_or_else(|| PricingError::Parse("Expected JSON object".into()))?;

        let mut models = HashMap::new();

        for (key, value) in obj {
            // Skip documentation entry
            if key == "sample_spec" {
                continue;
            }

            let Some(entry) = value.as_object() else {
                continue;
            };

            let input_cost = entry
                .get("input_cost_per_token")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let output_cost = entry
                .get("output_cost_per_token")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);

            // Skip entries with no pricing (image generation, etc.)
            if input_cost == 0.0 && output_cost == 0.0 {
                continue;
            }

            // Negative values indicate data corruption
            if input_cost < 0.0 || output_cost < 0.0 {
                tracing::warn!(model = key, "Skipping model with negative pricing");
                continue;
            }

            let pricing = ModelPricing {
                input_cost_per_token: input_cost,
                output_cost_per_token: output_cost,
                mode: entry
                    .get("mode")
                    .and_then(|v| v.as_str())
                    .unwrap_or("chat")
                    .to_string(),
            };

            models.insert(key.to_lowercase(), pricing);
        }

        let model_count = models.len();
        Ok(Self {
            models,
            model_count,
        })
    }

    /// Look up pricing for a model
    ///
    /// Lookup order:
    /// 1. Exact match on the lowercased model name
    /// 2. Normalized name (strip "-latest" / ":latest" suffix)
    /// 3. Base model without version date (e.g. strip -20241022)
    pub fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        let model_lower = model.to_lowercase();

        if let Some(pricing) = self.models.get(&model_lower) {
            return Some(pricing);
        }

        let normalized = model_lower
            .trim_end_matches("-latest")
            .trim_end_matches(":latest");
        if normalized != model_lower {
            if let Some(pricing) = self.models.get(normalized) {
                return Some(pricing);
            }
        }

        let base = strip_date_suffix(&model_lower);
        if base != model_lower {
            if let Some(pricing) = self.models.get(&base) {
                return Some(pricing);
            }
        }

        None
    }
}

/// Strip date suffixes from model names (last resort fallback only)
///
/// Examples:
/// - "claude-3-5-sonnet-20241022" → "claude-3-5-sonnet"
/// - "gpt-4o-2024-11-20" → "gpt-4o"
fn strip_date_suffix(model: &str) -> String {
    static RE_COMPACT: OnceLock<regex::Regex> = OnceLock::new();
    static RE_DASHED: OnceLock<regex::Regex> = OnceLock::new();

    let re_compact =
        RE_COMPACT.get_or_init(|| regex::Regex::new(r"-\d{8}$").expect("Invalid regex"));
    let re_dashed =
        RE_DASHED.get_or_init(|| regex::Regex::new(r"-\d{4}-\d{2}-\d{2}$").expect("Invalid regex"));

    let result = re_compact.replace(model, "");
    let result = re_dashed.replace(&result, "");
    result.to_string()
}

// ============================================================================
// COST OUTPUT
// ============================================================================

/// Calculated costs for a span, always populated (0.0 if no pricing data)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    pub prompt: f64,
    pub completion: f64,
    pub total: f64,
}

impl CostBreakdown {
    /// Returns true if any cost was derived
    pub fn is_calculated(&self) -> bool {
        self.total > 0.0
    }
}

// ============================================================================
// PRICING SERVICE
// ============================================================================

/// Thread-safe pricing service
pub struct PricingService {
    /// Pricing data (read-heavy, RwLock for concurrent reads)
    data: RwLock<PricingData>,
}

impl PricingService {
    /// Initialize from the embedded pricing table
    pub fn new_embedded() -> Result<Self, PricingError> {
        let data = PricingData::from_json_str(EMBEDDED_PRICING_JSON)?;
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Initialize from a pricing file on disk, same LiteLLM JSON schema
    pub fn load_from_file(path: &Path) -> Result<Self, PricingError> {
        let json = std::fs::read_to_string(path)?;
        let data = PricingData::from_json_str(&json)?;
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Replace the pricing table atomically
    pub fn replace(&self, data: PricingData) {
        *self.data.write() = data;
    }

    pub fn model_count(&self) -> usize {
        self.data.read().model_count
    }

    /// Calculate costs for a span's token usage
    ///
    /// Fail-safe: returns zero costs if the model is unknown (trace log only).
    /// Embedding models charge input tokens only.
    pub fn calculate(&self, model: &str, prompt_tokens: f64, completion_tokens: f64) -> CostBreakdown {
        if model.is_empty() {
            return CostBreakdown::default();
        }

        let data = self.data.read();
        let Some(pricing) = data.lookup(model) else {
            tracing::trace!(model = model, "No pricing found for model");
            return CostBreakdown::default();
        };

        // Clamp token counts to prevent negative costs from bad inputs
        let prompt_tokens = prompt_tokens.max(0.0);
        let completion_tokens = completion_tokens.max(0.0);

        let prompt = prompt_tokens * pricing.input_cost_per_token;
        let completion = if pricing.mode.eq_ignore_ascii_case("embedding") {
            0.0
        } else {
            completion_tokens * pricing.output_cost_per_token
        };

        CostBreakdown {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
