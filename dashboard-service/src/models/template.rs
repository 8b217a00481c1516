use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl Column {
    fn new(name: &str, column_type: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: column_type.to_string(),
            primary: false,
            required: false,
            default: None,
            references: None,
        }
    }

    fn id() -> Self {
        Self {
            primary: true,
            ..Self::new("id", "uuid").default_value("gen_random_uuid()")
        }
    }

    fn created_at() -> Self {
        Self::new("created_at", "timestamptz").default_value("now()")
    }

    fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    fn default_value(self, value: &str) -> Self {
        Self {
            default: Some(value.to_string()),
            ..self
        }
    }

    fn references(self, target: &str) -> Self {
        Self {
            references: Some(target.to_string()),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaStructure {
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub schema_structure: SchemaStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policies: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_buckets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_functions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_data: Option<serde_json::Value>,
    pub is_public: bool,
    pub is_system: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slugs of the templates that ship with the dashboard.
pub const BUILT_IN_TEMPLATE_IDS: [&str; 4] = ["healthcare", "education", "ecommerce", "blank"];

fn table(name: &str, columns: Vec<Column>) -> Table {
    Table {
        name: name.to_string(),
        columns,
    }
}

fn system_template(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    tables: Vec<Table>,
) -> ProjectTemplate {
    let now = Utc::now();
    ProjectTemplate {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        category: Some(category.to_string()),
        schema_structure: SchemaStructure { tables },
        default_policies: None,
        default_buckets: None,
        default_functions: None,
        seed_data: None,
        is_public: true,
        is_system: true,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

/// Templates served when the store has none to offer.
pub fn default_templates() -> Vec<ProjectTemplate> {
    vec![
        system_template(
            "healthcare",
            "Healthcare",
            "Database template for healthcare applications with patients, appointments, and prescriptions",
            "Healthcare",
            vec![
                table(
                    "patients",
                    vec![
                        Column::id(),
                        Column::new("first_name", "text").required(),
                        Column::new("last_name", "text").required(),
                        Column::new("date_of_birth", "date"),
                        Column::new("email", "text"),
                        Column::new("phone", "text"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "appointments",
                    vec![
                        Column::id(),
                        Column::new("patient_id", "uuid").required().references("patients(id)"),
                        Column::new("appointment_date", "timestamptz").required(),
                        Column::new("notes", "text"),
                        Column::new("status", "text").default_value("'scheduled'"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "prescriptions",
                    vec![
                        Column::id(),
                        Column::new("patient_id", "uuid").required().references("patients(id)"),
                        Column::new("medication", "text").required(),
                        Column::new("dosage", "text").required(),
                        Column::new("instructions", "text"),
                        Column::created_at(),
                    ],
                ),
            ],
        ),
        system_template(
            "education",
            "Education",
            "Database template for educational platforms with students, courses, and enrollments",
            "Education",
            vec![
                table(
                    "students",
                    vec![
                        Column::id(),
                        Column::new("first_name", "text").required(),
                        Column::new("last_name", "text").required(),
                        Column::new("email", "text").required(),
                        Column::new("enrollment_date", "date"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "courses",
                    vec![
                        Column::id(),
                        Column::new("title", "text").required(),
                        Column::new("description", "text"),
                        Column::new("instructor", "text"),
                        Column::new("credits", "integer"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "enrollments",
                    vec![
                        Column::id(),
                        Column::new("student_id", "uuid").required().references("students(id)"),
                        Column::new("course_id", "uuid").required().references("courses(id)"),
                        Column::new("grade", "text"),
                        Column::new("enrollment_date", "date").default_value("current_date"),
                        Column::created_at(),
                    ],
                ),
            ],
        ),
        system_template(
            "ecommerce",
            "E-commerce",
            "Database template for e-commerce platforms with products, orders, and customers",
            "E-commerce",
            vec![
                table(
                    "customers",
                    vec![
                        Column::id(),
                        Column::new("name", "text").required(),
                        Column::new("email", "text").required(),
                        Column::new("phone", "text"),
                        Column::new("address", "text"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "products",
                    vec![
                        Column::id(),
                        Column::new("name", "text").required(),
                        Column::new("description", "text"),
                        Column::new("price", "numeric").required(),
                        Column::new("stock_quantity", "integer"),
                        Column::created_at(),
                    ],
                ),
                table(
                    "orders",
                    vec![
                        Column::id(),
                        Column::new("customer_id", "uuid").required().references("customers(id)"),
                        Column::new("order_date", "timestamptz").default_value("now()"),
                        Column::new("total_amount", "numeric").required(),
                        Column::new("status", "text").default_value("'pending'"),
                        Column::created_at(),
                    ],
                ),
            ],
        ),
        system_template(
            "blank",
            "Blank",
            "Empty database template - start from scratch",
            "General",
            Vec::new(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_built_in_ids() {
        let ids: Vec<String> = default_templates().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, BUILT_IN_TEMPLATE_IDS);
    }

    #[test]
    fn column_serializes_type_key_and_skips_false_flags() {
        let json = serde_json::to_value(Column::new("email", "text")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "email", "type": "text" }));

        let json = serde_json::to_value(Column::id()).unwrap();
        assert_eq!(json["primary"], true);
        assert_eq!(json["default"], "gen_random_uuid()");
    }
}
