//! Type annotations for implicitly-`any` parameters.
//!
//! The type is a guess from the surrounding line. The heuristics run in a
//! fixed order and fall back to `unknown`; `any` is never written.

use super::edit::{edit_files, Edit};
use super::{Change, FixEnv, FixReport, Fixer};
use crate::context::ContextStore;
use crate::core::{ErrorRecord, Subject};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;

pub const FALLBACK_TYPE: &str = "unknown";

/// A guessed annotation and the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeGuess {
    pub ty: String,
    pub confidence: f64,
    pub rule: &'static str,
}

impl TypeGuess {
    fn new(ty: impl Into<String>, confidence: f64, rule: &'static str) -> Self {
        Self {
            ty: ty.into(),
            confidence,
            rule,
        }
    }
}

const EVENT_PARAM_NAMES: &[&str] = &["e", "ev", "evt", "event"];

static EVENT_PROPS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b(?:onClick|onDoubleClick|onMouse\w+|handle\w*Click)\b", "React.MouseEvent<HTMLElement>"),
        (r"\b(?:onChange|handle\w*Change)\b", "React.ChangeEvent<HTMLInputElement>"),
        (r"\b(?:onSubmit|handle\w*Submit)\b", "React.FormEvent<HTMLFormElement>"),
        (r"\b(?:onFocus|onBlur|handle\w*(?:Focus|Blur))\b", "React.FocusEvent<HTMLElement>"),
        (r"\b(?:onKey(?:Down|Up|Press)|handleKey\w*)\b", "React.KeyboardEvent<HTMLElement>"),
    ]
    .into_iter()
    .map(|(pattern, ty)| (Regex::new(pattern).unwrap(), ty))
    .collect()
});

static BOOLEAN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:is|has|should)[A-Z]").unwrap());

static CAMEL_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]?[a-z0-9]+|[A-Z]+").unwrap());

static BINDING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(?P<body>[^{}]*)\}(?P<after>\s*[)=,:])").unwrap());

fn matches(pattern: String, line: &str) -> bool {
    Regex::new(&pattern).is_ok_and(|re| re.is_match(line))
}

/// `customers` -> `customer`, `categories` -> `category`; `None` if not plural.
fn singularize(word: &str) -> Option<String> {
    if let Some(stem) = word.strip_suffix("ies") {
        return Some(format!("{stem}y"));
    }
    if word.ends_with("ss") {
        return None;
    }
    word.strip_suffix('s')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array_receiver(line: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(\w+)\??\.(?:map|filter|forEach|find|findIndex|some|every|flatMap)\(\s*(?:async\s+)?\(?\s*{}\b",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(line).map(|c| c[1].to_string())
}

fn camel_words(name: &str) -> Vec<String> {
    CAMEL_WORD
        .find_iter(name)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// First matching heuristic for `name` on `line`.
pub fn infer_parameter_type(context: &ContextStore, line: &str, name: &str) -> TypeGuess {
    let n = regex::escape(name);

    if EVENT_PARAM_NAMES.contains(&name) {
        if let Some((_, ty)) = EVENT_PROPS.iter().find(|(re, _)| re.is_match(line)) {
            return TypeGuess::new(*ty, 0.9, "react-event");
        }
    }

    if matches(format!(r"where:\s*\{{[^}}]*\b{n}\b"), line) {
        return TypeGuess::new("string", 0.85, "query-where");
    }

    if let Some(receiver) = array_receiver(line, name) {
        if let Some(singular) = singularize(&receiver) {
            return match context.find_model(&singular) {
                Some(model) => TypeGuess::new(model, 0.85, "schema-model"),
                None => TypeGuess::new(FALLBACK_TYPE, 0.7, "array-element"),
            };
        }
    }

    if matches(format!(r#"(?:^|[^\w$.]){n}\s*[!=]==?\s*['"`]"#), line) {
        return TypeGuess::new("string", 0.8, "string-comparison");
    }
    if matches(
        format!(r"(?:^|[^\w$.]){n}\s*(?:[<>]=?|[!=]==?)\s*-?\d"),
        line,
    ) {
        return TypeGuess::new("number", 0.8, "number-comparison");
    }

    if BOOLEAN_NAME.is_match(name) && (line.contains("&&") || line.contains("||")) {
        return TypeGuess::new("boolean", 0.8, "boolean-name");
    }

    if line.contains("addEventListener") {
        return TypeGuess::new("Event", 0.85, "dom-event");
    }

    if (name == "error" || name == "err") && (line.contains(".catch(") || line.contains(".then(")) {
        return TypeGuess::new("Error", 0.8, "promise-error");
    }

    let words = camel_words(name);
    let has_word = |targets: &[&str]| words.iter().any(|w| targets.contains(&w.as_str()));
    if has_word(&["index", "count"]) {
        return TypeGuess::new("number", 0.75, "name-hint");
    }
    if has_word(&["id", "name", "email"]) {
        return TypeGuess::new("string", 0.75, "name-hint");
    }

    TypeGuess::new(FALLBACK_TYPE, 0.7, "fallback")
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn byte_offset(line: &str, char_index: usize) -> Option<usize> {
    line.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .nth(char_index)
}

/// Insert `: ty` after the parameter the 1-based `column` points at.
pub fn annotate_at_column(line: &str, name: &str, column: usize, ty: &str) -> Option<String> {
    let start = byte_offset(line, column.checked_sub(1)?)?;
    if !line[start..].starts_with(name) {
        return None;
    }
    if line[..start].chars().next_back().is_some_and(is_ident_char) {
        return None;
    }
    let mut end = start + name.len();
    if line[end..].chars().next().is_some_and(is_ident_char) {
        return None;
    }
    if line[end..].starts_with('?') {
        end += 1;
    }
    let after = line[end..].trim_start();
    if after.starts_with(':') {
        return None;
    }

    let before = line[..start].trim_end();
    if before.ends_with("...") {
        return Some(format!("{}: {}[]{}", &line[..end], ty, &line[end..]));
    }
    if after.starts_with("=>") {
        return Some(format!(
            "{}({}: {}){}",
            &line[..start],
            &line[start..end],
            ty,
            &line[end..]
        ));
    }
    Some(format!("{}: {}{}", &line[..end], ty, &line[end..]))
}

/// Regex shapes for when the column does not point at the parameter.
pub fn annotate_by_shape(line: &str, name: &str, ty: &str) -> Option<String> {
    if !line.contains("=>") && !line.contains("function") {
        return None;
    }
    let n = regex::escape(name);
    let (name, ty) = (name.replace('$', "$$"), ty.replace('$', "$$"));
    let shapes = [
        (format!(r"\(\s*{n}\s*\)(?P<tail>\s*(?:=>|\{{))"), format!("({name}: {ty})$tail")),
        (format!(r",\s*{n}\s*\)(?P<tail>\s*(?:=>|\{{))"), format!(", {name}: {ty})$tail")),
        (format!(r"\(\s*{n}\s*,"), format!("({name}: {ty},")),
        (
            format!(r"(?P<lead>^|[^\w$.(,])(?P<ws>\s*){n}\s*=>"),
            format!("$lead$ws({name}: {ty}) =>"),
        ),
    ];
    shapes.iter().find_map(|(pattern, replacement)| {
        let re = Regex::new(pattern).ok()?;
        re.is_match(line)
            .then(|| re.replacen(line, 1, replacement.as_str()).into_owned())
    })
}

/// Annotate a whole `{ a, b }` destructuring pattern that binds `name`.
pub fn annotate_binding(context: &ContextStore, line: &str, name: &str) -> Option<String> {
    binding_annotation(context, line, name).map(|(new, _)| new)
}

/// The annotated line and every member the annotation covers.
fn binding_annotation(context: &ContextStore, line: &str, name: &str) -> Option<(String, Vec<String>)> {
    let word = Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()?;
    let caps = BINDING_PATTERN.captures_iter(line).find(|c| {
        let is_type_literal = c
            .get(0)
            .is_some_and(|m| line[..m.start()].trim_end().ends_with(':'));
        !is_type_literal && word.is_match(&c["body"])
    })?;
    if caps["after"].trim_start().starts_with(':') {
        return None;
    }
    let whole = caps.get(0)?;
    let body = &caps["body"];

    let names: Vec<String> = body
        .split(',')
        .filter_map(|part| {
            part.split([':', '='])
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.starts_with("..."))
                .map(str::to_string)
        })
        .collect();
    if names.is_empty() {
        return None;
    }
    let members: Vec<String> = names
        .iter()
        .map(|ident| format!("{ident}: {}", infer_parameter_type(context, line, ident).ty))
        .collect();

    let pattern_end = whole.start() + 1 + body.len() + 1;
    let new = format!(
        "{}: {{ {} }}{}",
        &line[..pattern_end],
        members.join("; "),
        &line[pattern_end..]
    );
    Some((new, names))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicitAnyFixer;

impl Fixer for ImplicitAnyFixer {
    fn name(&self) -> &str {
        "implicit-any-parameter"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();

        // Right-to-left within a line so earlier columns stay valid.
        let mut rank: HashMap<&str, usize> = HashMap::new();
        for error in errors {
            let next = rank.len();
            rank.entry(error.file.as_str()).or_insert(next);
        }
        let mut ordered = errors.to_vec();
        ordered.sort_by_key(|e| (rank.get(e.file.as_str()).copied(), e.line, Reverse(e.column)));

        // One annotation per destructuring pattern, keyed by (file, line).
        let mut bound: HashMap<(String, usize), Vec<String>> = HashMap::new();

        edit_files(env, &ordered, &mut report, |error, _path, buffer| {
            let Some(Subject::Parameter { name }) = &error.subject else {
                return Edit::skip("no parameter name in the message");
            };
            let Some(text) = buffer.line(error.line).map(str::to_string) else {
                return Edit::skip(format!("line {} is out of range", error.line));
            };

            if error.code == "TS7031" {
                let key = (error.file.clone(), error.line);
                if bound.get(&key).is_some_and(|names| names.contains(name)) {
                    return Edit::Covered;
                }
                return match binding_annotation(env.context, &text, name) {
                    Some((new, names)) => {
                        buffer.set_line(error.line, &new);
                        bound.entry(key).or_default().extend(names);
                        Edit::Applied(vec![Change::new(error.line, text, new, 0.7, "binding pattern")])
                    }
                    None => Edit::skip(format!("binding '{name}' already annotated or not found")),
                };
            }

            let guess = infer_parameter_type(env.context, &text, name);
            if !env.allows(guess.confidence) {
                return Edit::skip(format!(
                    "{} guess for '{name}' below threshold ({:.2})",
                    guess.rule, guess.confidence
                ));
            }

            let annotated = annotate_at_column(&text, name, error.column, &guess.ty)
                .or_else(|| annotate_by_shape(&text, name, &guess.ty));
            match annotated {
                Some(new) => {
                    buffer.set_line(error.line, &new);
                    let note = format!("{name}: {} ({})", guess.ty, guess.rule);
                    Edit::Applied(vec![Change::new(error.line, text, new, guess.confidence, note)])
                }
                None => Edit::skip(format!("no parameter shape for '{name}' matched")),
            }
        });

        report
    }
}
