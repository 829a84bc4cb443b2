//! Response contract shared by the outbound request and the response check.
//!
//! The schema uses the Gemini `responseSchema` dialect (OpenAPI subset with
//! upper-case type names). The same value is sent to the model and used to
//! validate what comes back, so the two can never drift apart.

use serde_json::{json, Value};

pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "foodName": { "type": "STRING", "description": "اسم الطعام باللغة العربية" },
            "calories": { "type": "NUMBER", "description": "تقدير السعرات الحرارية التقريبي" },
            "macros": {
                "type": "OBJECT",
                "properties": {
                    "protein": { "type": "STRING", "description": "كمية البروتين (مثال: 20g)" },
                    "carbs": { "type": "STRING", "description": "كمية الكربوهيدرات (مثال: 30g)" },
                    "fats": { "type": "STRING", "description": "كمية الدهون (مثال: 10g)" }
                },
                "required": ["protein", "carbs", "fats"]
            },
            "advice": {
                "type": "STRING",
                "description": "نصيحة غذائية قصيرة بناءً على بيانات المستخدم ومحتوى الصورة"
            }
        },
        "required": ["foodName", "calories", "macros", "advice"]
    })
}

/// Checks `value` against `schema`. Returns the path and reason of the first violation.
pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    check(value, schema, "$")
}

fn check(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let ty = schema.get("type").and_then(Value::as_str).unwrap_or("");
    match ty {
        "OBJECT" => {
            let obj = value
                .as_object()
                .ok_or_else(|| format!("{path}: expected object"))?;
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if obj.get(name).map_or(true, Value::is_null) {
                        return Err(format!("{path}.{name}: required field missing"));
                    }
                }
            }
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (name, sub) in props {
                    if let Some(v) = obj.get(name).filter(|v| !v.is_null()) {
                        check(v, sub, &format!("{path}.{name}"))?;
                    }
                }
            }
            Ok(())
        }
        "STRING" if value.is_string() => Ok(()),
        "NUMBER" if value.as_f64().is_some_and(f64::is_finite) => Ok(()),
        "INTEGER" if value.is_i64() || value.is_u64() => Ok(()),
        "BOOLEAN" if value.is_boolean() => Ok(()),
        "ARRAY" => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("{path}: expected array"))?;
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item, item_schema, &format!("{path}[{i}]"))?;
                }
            }
            Ok(())
        }
        "" => Ok(()),
        other => Err(format!("{path}: expected {}", other.to_ascii_lowercase())),
    }
}
