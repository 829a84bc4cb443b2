use serde::{Deserialize, Serialize};

/// Macro quantities stay free-form text ("20g", "1.5 oz"), as the model reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub protein: String,
    pub carbs: String,
    pub fats: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub food_name: String,
    pub calories: f64,
    pub macros: Macros,
    pub advice: String,
}
