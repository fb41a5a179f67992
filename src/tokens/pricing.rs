//! Model pricing and cost estimation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".into()
}

impl ModelPricing {
    pub fn new(input: f64, output: f64) -> Self {
        Self {
            input_cost_per_1k: input,
            output_cost_per_1k: output,
            currency: default_currency(),
        }
    }

    pub fn free() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Mean of input and output price; the figure cost ceilings and cost scoring compare.
    pub fn blended_per_1k(&self) -> f64 {
        (self.input_cost_per_1k + self.output_cost_per_1k) / 2.0
    }

    pub fn calculate_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> CostEstimate {
        let ic = (input_tokens as f64 / 1000.0) * self.input_cost_per_1k;
        let oc = (output_tokens as f64 / 1000.0) * self.output_cost_per_1k;
        CostEstimate {
            model: model.into(),
            input_tokens,
            output_tokens,
            input_cost: ic,
            output_cost: oc,
            total_cost: ic + oc,
            currency: self.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

impl CostEstimate {
    pub fn format(&self) -> String {
        format!("{} {:.6}", self.currency, self.total_cost)
    }

    pub fn format_detailed(&self) -> String {
        if self.total_cost < 0.01 {
            format!("{:.4}¢", self.total_cost * 100.0)
        } else {
            format!("${:.4}", self.total_cost)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost() {
        let pricing = ModelPricing::new(0.005, 0.015);
        let est = pricing.calculate_cost("gpt-4o", 2000, 1000);
        assert!((est.input_cost - 0.01).abs() < 1e-12);
        assert!((est.output_cost - 0.015).abs() < 1e-12);
        assert!((est.total_cost - 0.025).abs() < 1e-12);
        assert_eq!(est.currency, "USD");
    }

    #[test]
    fn test_blended_price() {
        assert!((ModelPricing::new(0.001, 0.003).blended_per_1k() - 0.002).abs() < 1e-12);
        assert_eq!(ModelPricing::free().blended_per_1k(), 0.0);
    }
}
