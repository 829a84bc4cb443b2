use serde::{Deserialize, Serialize};

/// The personal data used to tailor the dietary advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub weight: f64, // kg
    pub height: f64, // cm
    pub age: f64,
}

/// Onboarding form as submitted; every field may be missing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<f64>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid profile fields: {}", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

impl ProfileForm {
    pub fn validate(self) -> Result<UserProfile, ValidationError> {
        let mut fields = Vec::new();

        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            fields.push("name");
        }
        let weight = positive(self.weight, "weight", &mut fields);
        let height = positive(self.height, "height", &mut fields);
        let age = positive(self.age, "age", &mut fields);

        if !fields.is_empty() {
            return Err(ValidationError { fields });
        }
        Ok(UserProfile {
            name,
            weight,
            height,
            age,
        })
    }
}

impl UserProfile {
    /// Re-checks a profile that came from outside the onboarding form.
    pub fn is_valid(&self) -> bool {
        ProfileForm::from(self.clone()).validate().is_ok()
    }
}

impl From<UserProfile> for ProfileForm {
    fn from(p: UserProfile) -> Self {
        Self {
            name: Some(p.name),
            weight: Some(p.weight),
            height: Some(p.height),
            age: Some(p.age),
        }
    }
}

fn positive(value: Option<f64>, field: &'static str, bad: &mut Vec<&'static str>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            bad.push(field);
            0.0
        }
    }
}
