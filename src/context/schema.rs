//! Prisma-style schema parsing (`model Name { field Type? }`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static MODEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*model\s+(\w+)\s*\{([^}]*)\}").unwrap());

static FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)\s+(\w+)(\?|\[\])?").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: String,
    pub optional: bool,
    pub is_array: bool,
}

impl FieldDef {
    /// The TypeScript type a Prisma client exposes for this field.
    pub fn typescript_type(&self) -> String {
        let base = match self.ty.as_str() {
            "String" => "string".to_string(),
            "Int" | "Float" | "Decimal" => "number".to_string(),
            "BigInt" => "bigint".to_string(),
            "Boolean" => "boolean".to_string(),
            "DateTime" => "Date".to_string(),
            "Json" => "unknown".to_string(),
            "Bytes" => "Buffer".to_string(),
            other => other.to_string(),
        };
        match (self.is_array, self.optional) {
            (true, _) => format!("{base}[]"),
            (false, true) => format!("{base} | null"),
            (false, false) => base,
        }
    }
}

pub type SchemaModels = BTreeMap<String, Vec<FieldDef>>;

pub fn parse_schema(text: &str) -> SchemaModels {
    MODEL
        .captures_iter(text)
        .map(|model| {
            let fields = model[2]
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('@'))
                .filter_map(|line| FIELD.captures(line))
                .map(|f| FieldDef {
                    name: f[1].to_string(),
                    ty: f[2].to_string(),
                    optional: f.get(3).is_some_and(|m| m.as_str() == "?"),
                    is_array: f.get(3).is_some_and(|m| m.as_str() == "[]"),
                })
                .collect();
            (model[1].to_string(), fields)
        })
        .collect()
}
