//! Schema-aware correction of misspelled property accesses.
//!
//! A property is only rewritten to a name the schema actually declares:
//! a case-insensitive match first, then a near miss within edit distance 2.

use super::edit::{edit_files, Edit};
use super::{FixEnv, FixReport, Fixer};
use crate::context::{closest_match, ContextStore, Suggestion};
use crate::core::{ErrorRecord, Subject};
use once_cell::sync::Lazy;
use regex::Regex;

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").unwrap());

/// Where a corrected property name came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCorrection {
    pub model: String,
    pub suggestion: Suggestion,
    pub confidence: f64,
}

fn confidence_for(suggestion: &Suggestion) -> f64 {
    if suggestion.case_only {
        1.0
    } else {
        0.8
    }
}

/// Look the wrong property up against the schema the type string names.
pub fn correct_property(context: &ContextStore, name: &str, on_type: &str) -> Option<PropertyCorrection> {
    if on_type.contains("PrismaClient") {
        let accessors = context.model_accessors();
        let suggestion = closest_match(accessors.iter().map(String::as_str), name)?;
        return Some(PropertyCorrection {
            model: "PrismaClient".to_string(),
            confidence: confidence_for(&suggestion),
            suggestion,
        });
    }

    let model = TYPE_NAME
        .find_iter(on_type)
        .find_map(|m| context.find_model(m.as_str()))?;
    let suggestion = context.suggest_closest_field(model, name)?;
    Some(PropertyCorrection {
        model: model.to_string(),
        confidence: confidence_for(&suggestion),
        suggestion,
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Replace the access of `wrong` with `right`, preferring the reported column.
pub fn rewrite_access(line: &str, column: usize, wrong: &str, right: &str) -> Option<String> {
    if let Some((start, _)) = column
        .checked_sub(1)
        .and_then(|c| line.char_indices().nth(c))
    {
        let end = start + wrong.len();
        let bounded = line[start..].starts_with(wrong)
            && !line[end..].chars().next().is_some_and(is_ident_char)
            && line[..start].trim_end().ends_with('.');
        if bounded {
            return Some(format!("{}{}{}", &line[..start], right, &line[end..]));
        }
    }

    let re = Regex::new(&format!(r"(?P<dot>\??\.\s*){}\b", regex::escape(wrong))).ok()?;
    let replacement = format!("${{dot}}{}", right.replace('$', "$$"));
    re.is_match(line)
        .then(|| re.replacen(line, 1, replacement.as_str()).into_owned())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MissingPropertyFixer;

impl Fixer for MissingPropertyFixer {
    fn name(&self) -> &str {
        "missing-property"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();

        edit_files(env, errors, &mut report, |error, _path, buffer| {
            let Some(Subject::Property { name, on_type }) = &error.subject else {
                return Edit::skip("no property name in the message");
            };
            let Some(correction) = correct_property(env.context, name, on_type.as_deref().unwrap_or(""))
            else {
                return Edit::skip(format!("'{name}' is not a near miss of any schema field"));
            };
            if !env.allows(correction.confidence) {
                return Edit::skip(format!("correction confidence {:.2} too low", correction.confidence));
            }

            let right = &correction.suggestion.value;
            let note = format!("{}.{name} -> {right}", correction.model);
            match buffer.rewrite_line(error.line, correction.confidence, &note, |text| {
                rewrite_access(text, error.column, name, right)
            }) {
                Some(change) => Edit::Applied(vec![change]),
                None => Edit::skip(format!("no access to '{name}' on line {}", error.line)),
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = "model Customer {\n  id String @id\n  email String\n  fullName String?\n}\n\nmodel StaffUser {\n  id String @id\n}\n";

    fn harness(source: &str) -> Harness {
        Harness::new(&[("prisma/schema.prisma", SCHEMA), ("src/page.tsx", source)])
    }

    fn property_error(line: usize, column: usize, name: &str, on_type: &str) -> ErrorRecord {
        ErrorRecord::new(
            "src/page.tsx",
            line,
            column,
            "TS2339",
            format!("Property '{name}' does not exist on type '{on_type}'."),
        )
        .with_subject(Some(Subject::Property {
            name: name.into(),
            on_type: Some(on_type.into()),
        }))
    }

    #[test]
    fn test_correct_property_confidences() {
        let h = harness("");
        let case = correct_property(&h.context, "fullname", "Customer").unwrap();
        assert_eq!(case.suggestion.value, "fullName");
        assert_eq!(case.confidence, 1.0);

        let typo = correct_property(&h.context, "emial", "Customer & { orders: Order[] }").unwrap();
        assert_eq!(typo.suggestion.value, "email");
        assert_eq!(typo.confidence, 0.8);

        assert!(correct_property(&h.context, "address", "Customer").is_none());
        assert!(correct_property(&h.context, "fullname", "Invoice").is_none());
    }

    #[test]
    fn test_prisma_client_accessor() {
        let h = harness("");
        let fix = correct_property(&h.context, "staffuser", "PrismaClient<Prisma.PrismaClientOptions>").unwrap();
        assert_eq!(fix.suggestion.value, "staffUser");
    }

    #[test]
    fn test_rewrite_access_prefers_column() {
        let line = "const a = c.fullname ?? other.fullname";
        assert_eq!(
            rewrite_access(line, 13, "fullname", "fullName"),
            Some("const a = c.fullName ?? other.fullname".to_string())
        );
        assert_eq!(
            rewrite_access("x?.emial", 99, "emial", "email"),
            Some("x?.email".to_string())
        );
        assert_eq!(rewrite_access("const emial = 1", 7, "emial", "email"), None);
    }

    #[test]
    fn test_fixer_rewrites_and_never_invents_fields() {
        let h = harness("<p>{customer.fullname}</p>\n<p>{customer.address}</p>\n");
        let report = MissingPropertyFixer.fix_errors(
            &[
                property_error(1, 14, "fullname", "Customer"),
                property_error(2, 14, "address", "Customer"),
            ],
            &h.env(false),
        );
        assert_eq!(report.fixed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            h.read("src/page.tsx"),
            "<p>{customer.fullName}</p>\n<p>{customer.address}</p>\n"
        );
    }
}
