//! Card templates and the renderer that binds data into them.
//!
//! A template is an adaptive card document whose strings may contain
//! `${slot}` bindings. A string that is exactly one binding is replaced by
//! the bound JSON value (so numbers stay numbers); bindings embedded in a
//! longer string are interpolated as text.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::model::{ADAPTIVE_CARD_CONTENT_TYPE, Attachment};
use crate::error::{ConfigError, TemplateError};

static BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid binding regex"));

const WELCOME_TEMPLATE: &str = include_str!("../../templates/welcome.json");
const LEARN_TEMPLATE: &str = include_str!("../../templates/learn.json");

/// Ids of the built-in templates.
pub mod ids {
    pub const WELCOME: &str = "welcome";
    pub const LEARN: &str = "learn";
}

/// An immutable card skeleton with declared data slots.
#[derive(Debug, Clone)]
pub struct CardTemplate {
    id: String,
    body: Value,
    slots: BTreeSet<String>,
}

impl CardTemplate {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        let mut slots = BTreeSet::new();
        collect_slots(&body, &mut slots);
        Self {
            id: id.into(),
            body,
            slots,
        }
    }

    /// Parse a template from its JSON source.
    pub fn parse(id: impl Into<String>, source: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(id, serde_json::from_str(source)?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Names of the `${slot}` bindings this template declares.
    pub fn slots(&self) -> &BTreeSet<String> {
        &self.slots
    }

    /// Render the template as-is, leaving any bindings untouched.
    pub fn render_without_data(&self) -> RenderedCard {
        RenderedCard {
            template_id: self.id.clone(),
            content: self.body.clone(),
        }
    }

    /// Render with every declared slot bound from `data`.
    pub fn render(&self, data: &Value) -> Result<RenderedCard, TemplateError> {
        let Value::Object(fields) = data else {
            return Err(TemplateError::InvalidData(type_name(data).to_string()));
        };
        if let Some(missing) = self.slots.iter().find(|slot| !fields.contains_key(*slot)) {
            return Err(TemplateError::MissingBinding {
                template: self.id.clone(),
                slot: missing.clone(),
            });
        }
        Ok(RenderedCard {
            template_id: self.id.clone(),
            content: bind(&self.body, fields),
        })
    }
}

/// A template with its data bound. Never mutated; updates render a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub template_id: String,
    pub content: Value,
}

impl RenderedCard {
    /// Wrap as an adaptive card attachment.
    pub fn into_attachment(self) -> Attachment {
        Attachment::new(ADAPTIVE_CARD_CONTENT_TYPE, self.content)
    }
}

/// Templates by id. The renderer entry point.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, CardTemplate>,
}

impl TemplateRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Registry holding the compiled-in `welcome` and `learn` templates.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (id, source) in [(ids::WELCOME, WELCOME_TEMPLATE), (ids::LEARN, LEARN_TEMPLATE)] {
            match CardTemplate::parse(id, source) {
                Ok(template) => registry.insert(template),
                Err(e) => tracing::error!(template = id, error = %e, "Built-in template is not valid JSON"),
            }
        }
        registry
    }

    /// Overlay every `<id>.json` file in `dir` onto this registry.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ConfigError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path)?;
            let template =
                CardTemplate::parse(id, &source).map_err(|e| ConfigError::TemplateLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(template = id, slots = ?template.slots(), "Loaded card template");
            self.insert(template);
            loaded += 1;
        }
        info!(dir = %dir.display(), loaded, "Card templates loaded");
        Ok(loaded)
    }

    pub fn insert(&mut self, template: CardTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Result<&CardTemplate, TemplateError> {
        self.templates
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))
    }

    /// Render `id` with `data` bound, or as-is when `data` is `None`.
    pub fn render(&self, id: &str, data: Option<&Value>) -> Result<RenderedCard, TemplateError> {
        let template = self.get(id)?;
        match data {
            Some(data) => template.render(data),
            None => Ok(template.render_without_data()),
        }
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn collect_slots(value: &Value, slots: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in BINDING.captures_iter(s) {
                slots.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_slots(v, slots)),
        Value::Object(map) => map.values().for_each(|v| collect_slots(v, slots)),
        _ => {}
    }
}

fn bind(value: &Value, data: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => bind_string(s, data),
        Value::Array(items) => Value::Array(items.iter().map(|v| bind(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), bind(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn bind_string(s: &str, data: &Map<String, Value>) -> Value {
    if let Some(caps) = BINDING.captures(s)
        && caps.get(0).map(|m| m.as_str().len()) == Some(s.len())
        && let Some(bound) = data.get(&caps[1])
    {
        return bound.clone();
    }
    let replaced = BINDING.replace_all(s, |caps: &regex::Captures<'_>| match data.get(&caps[1]) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => caps[0].to_string(),
    });
    Value::String(replaced.into_owned())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
