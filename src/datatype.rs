// used to keep handlers by name
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// used to normalize decimal numbers
use bigdecimal::BigDecimal;
// so regular expressions don't have to be recompiled
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::construct::OtherHasher;
use crate::error::{Result, SlotbaseError};

pub const DEFAULT_MIMETYPE: &str = "application/json";
pub const HTML: &str = "application/html";
pub const PLAIN_TEXT: &str = "text/plain";

lazy_static! {
    static ref RE_INTEGER: Regex = Regex::new(r"^[-+]?\d+$").unwrap();
    static ref RE_FLOAT: Regex = Regex::new(r"^-?\d+\.\d+$").unwrap();
    static ref RE_DECIMAL: Regex = Regex::new(r"^-?\d+(\.\d+)?$").unwrap();
    static ref RE_BOOLEAN: Regex = Regex::new(r"(?i)^(false|true|1|0)$").unwrap();
    static ref RE_COLOR: Regex = Regex::new(r"^#[\w\d]{6,8}$").unwrap();
    // a "forgiving" URI: protocol, domain, path and query are all optional
    static ref RE_URI: Regex = Regex::new(
        r"^(\w{1,5}://)?(([\w\d\-](\.[\w\d\-])*)+)?(/([^?]/?)*)?(\?([^=]+=[^&]+)*)?$"
    ).unwrap();
    pub(crate) static ref RE_REFERENCE: Regex = Regex::new(r"^slot://(\d+)$").unwrap();
}

/// The textual form of a value, which is what sizes are measured against.
pub fn serialized(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fails with `SizeExceeded` if the serialized value is longer than `size` characters.
pub fn check_size(value: &Value, size: usize) -> Result<()> {
    let given = serialized(value).chars().count();
    if given > size {
        return Err(SlotbaseError::SizeExceeded {
            expected: size,
            given,
        });
    }
    Ok(())
}

// ------------- Environment -------------
/// Rendering parameters, forwarded verbatim to representers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(Map<String, Value>);
impl Environment {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn for_mimetype(mimetype: &str) -> Self {
        Self::new().with("return_mimetype", mimetype)
    }
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_owned(), value.into());
        self
    }
    pub fn mimetype(&self) -> &str {
        self.text("return_mimetype").unwrap_or(DEFAULT_MIMETYPE)
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

// ------------- Representation -------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Representation {
    Text(String),
    Bytes(Vec<u8>),
}
impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Representation::Text(text) => write!(f, "{}", text),
            Representation::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

pub type Attrs = Map<String, Value>;
pub type Preparer = fn(&Value) -> Result<Value>;
pub type Renderer = fn(&Value, &Environment) -> Result<Representation>;
pub type Attributor = fn(&Value, &Environment) -> Result<Attrs>;

// ------------- Soft types -------------
/// A pluggable value kind. Implementations must be shareable across threads
/// since a single registry serves every key of every node.
pub trait SoftType: Send + Sync {
    fn name(&self) -> &str;
    /// Size check first, then the format-specific predicate.
    fn validate(&self, value: &Value, size: usize) -> Result<()>;
    /// Turns a validated value into what gets stored.
    fn prepare(&self, value: &Value) -> Result<Value>;
    fn render(&self, value: &Value, environment: &Environment) -> Result<Representation>;
    fn attrs(&self, value: &Value, environment: &Environment) -> Result<Attrs>;
}

/// Handlers keyed by mimetype, with an optional fallback.
#[derive(Clone)]
pub struct FormatTable<F: Copy> {
    operation: &'static str,
    handlers: HashMap<String, F, OtherHasher>,
    default: Option<F>,
}
impl<F: Copy> FormatTable<F> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            handlers: HashMap::default(),
            default: None,
        }
    }
    pub fn register(&mut self, mimetype: &str, handler: F) {
        self.handlers.insert(mimetype.to_owned(), handler);
    }
    pub fn fallback(&mut self, handler: F) {
        self.default = Some(handler);
    }
    pub fn lookup(&self, type_name: &str, mimetype: &str) -> Result<F> {
        if let Some(handler) = self.handlers.get(mimetype) {
            return Ok(*handler);
        }
        debug!(
            type_name,
            mimetype,
            operation = self.operation,
            "no specialized handler, using default"
        );
        self.default.ok_or_else(|| {
            SlotbaseError::Unimplemented(format!("{}.{}_default", type_name, self.operation))
        })
    }
}

/// A type validated by a size limit and an optional regular expression.
#[derive(Clone)]
pub struct LocalType {
    name: String,
    rule: Option<Regex>,
    preparer: Preparer,
    renderers: FormatTable<Renderer>,
    attributors: FormatTable<Attributor>,
}
impl LocalType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            rule: None,
            preparer: prepare_unchanged,
            renderers: FormatTable::new("render"),
            attributors: FormatTable::new("attrs"),
        }
    }
    pub fn matching(mut self, rule: &Regex) -> Self {
        self.rule = Some(rule.clone());
        self
    }
    pub fn preparing(mut self, preparer: Preparer) -> Self {
        self.preparer = preparer;
        self
    }
    pub fn rendering(mut self, mimetype: &str, renderer: Renderer) -> Self {
        self.renderers.register(mimetype, renderer);
        self
    }
    pub fn rendering_by_default(mut self, renderer: Renderer) -> Self {
        self.renderers.fallback(renderer);
        self
    }
    pub fn attributing(mut self, mimetype: &str, attributor: Attributor) -> Self {
        self.attributors.register(mimetype, attributor);
        self
    }
    pub fn attributing_by_default(mut self, attributor: Attributor) -> Self {
        self.attributors.fallback(attributor);
        self
    }
}
impl SoftType for LocalType {
    fn name(&self) -> &str {
        &self.name
    }
    fn validate(&self, value: &Value, size: usize) -> Result<()> {
        check_size(value, size)?;
        match &self.rule {
            Some(rule) if !rule.is_match(&serialized(value)) => Err(
                SlotbaseError::ValidationFailed(format!("invalid format for {}", self.name)),
            ),
            _ => Ok(()),
        }
    }
    fn prepare(&self, value: &Value) -> Result<Value> {
        (self.preparer)(value)
    }
    fn render(&self, value: &Value, environment: &Environment) -> Result<Representation> {
        let renderer = self.renderers.lookup(&self.name, environment.mimetype())?;
        renderer(value, environment)
    }
    fn attrs(&self, value: &Value, environment: &Environment) -> Result<Attrs> {
        let attributor = self.attributors.lookup(&self.name, environment.mimetype())?;
        attributor(value, environment)
    }
}

// ------------- Registry -------------
/// Explicit name to handler mapping, filled at startup.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    handlers: HashMap<String, Arc<dyn SoftType>, OtherHasher>,
}
impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for handler in builtins() {
            registry.register(Arc::new(handler));
        }
        registry
    }
    /// Returns the handler previously registered under the same name, if any.
    pub fn register(&mut self, handler: Arc<dyn SoftType>) -> Option<Arc<dyn SoftType>> {
        debug!(name = handler.name(), "registering type");
        self.handlers.insert(handler.name().to_uppercase(), handler)
    }
    pub fn get(&self, name: &str) -> Option<Arc<dyn SoftType>> {
        self.handlers.get(&name.to_uppercase()).cloned()
    }
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn builtins() -> Vec<LocalType> {
    vec![
        LocalType::new("STRING")
            .preparing(prepare_text)
            .rendering(DEFAULT_MIMETYPE, render_json)
            .rendering_by_default(render_text)
            .attributing(HTML, attrs_plain_text)
            .attributing_by_default(attrs_none),
        LocalType::new("INTEGER")
            .matching(&RE_INTEGER)
            .preparing(prepare_integer)
            .rendering(DEFAULT_MIMETYPE, render_json)
            .rendering_by_default(render_text)
            .attributing(HTML, attrs_plain_text)
            .attributing_by_default(attrs_none),
        LocalType::new("FLOAT")
            .matching(&RE_FLOAT)
            .preparing(prepare_float)
            .rendering(DEFAULT_MIMETYPE, render_json)
            .rendering_by_default(render_text)
            .attributing(HTML, attrs_plain_text)
            .attributing_by_default(attrs_none),
        LocalType::new("DECIMAL")
            .matching(&RE_DECIMAL)
            .preparing(prepare_decimal)
            .rendering(DEFAULT_MIMETYPE, render_json)
            .rendering_by_default(render_text)
            .attributing_by_default(attrs_none),
        LocalType::new("BOOLEAN")
            .matching(&RE_BOOLEAN)
            .preparing(prepare_boolean)
            .rendering(DEFAULT_MIMETYPE, render_json)
            .rendering_by_default(render_text)
            .attributing_by_default(attrs_none),
        LocalType::new("COLOR")
            .matching(&RE_COLOR)
            .preparing(prepare_text)
            .rendering(HTML, render_color_swatch)
            .rendering_by_default(render_text)
            .attributing_by_default(attrs_none),
        LocalType::new("IMAGE")
            .matching(&RE_URI)
            .preparing(prepare_text)
            .rendering(HTML, render_image_tag)
            .rendering(DEFAULT_MIMETYPE, render_image_json)
            .attributing_by_default(attrs_none),
        LocalType::new("REFERENCE")
            .matching(&RE_REFERENCE)
            .preparing(prepare_text)
            .rendering_by_default(render_text)
            .attributing_by_default(attrs_none),
    ]
}

// ------------- Preparers -------------
fn prepare_unchanged(value: &Value) -> Result<Value> {
    Ok(value.clone())
}
fn prepare_text(value: &Value) -> Result<Value> {
    Ok(Value::String(serialized(value)))
}
fn prepare_integer(value: &Value) -> Result<Value> {
    let text = serialized(value);
    text.trim_start_matches('+')
        .parse::<i64>()
        .map(Value::from)
        .map_err(|e| SlotbaseError::ValidationFailed(format!("'{}' is not an integer: {}", text, e)))
}
fn prepare_float(value: &Value) -> Result<Value> {
    let text = serialized(value);
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| SlotbaseError::ValidationFailed(format!("'{}' is not a float", text)))
}
fn prepare_decimal(value: &Value) -> Result<Value> {
    let text = serialized(value);
    BigDecimal::from_str(&text)
        .map(|decimal| Value::String(decimal.normalized().to_string()))
        .map_err(|e| SlotbaseError::ValidationFailed(format!("'{}' is not a decimal: {}", text, e)))
}
fn prepare_boolean(value: &Value) -> Result<Value> {
    match serialized(value).to_lowercase().as_str() {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        other => Err(SlotbaseError::ValidationFailed(format!("'{}' is not a boolean", other))),
    }
}

// ------------- Renderers -------------
fn render_text(value: &Value, _: &Environment) -> Result<Representation> {
    Ok(Representation::Text(serialized(value)))
}
fn render_json(value: &Value, _: &Environment) -> Result<Representation> {
    Ok(Representation::Text(json!({ "repr": serialized(value) }).to_string()))
}

// swatch widths; the height is one and a half times the width
const SWATCH_SIZES: [(&str, u32); 6] = [
    ("bit", 1),
    ("micro", 25),
    ("small", 75),
    ("medium", 400),
    ("large", 1024),
    ("huge", 2048),
];
const DEFAULT_SWATCH_SIZE: &str = "small";

fn render_color_swatch(value: &Value, environment: &Environment) -> Result<Representation> {
    let size = environment.text("size").unwrap_or(DEFAULT_SWATCH_SIZE);
    let width = SWATCH_SIZES
        .iter()
        .find(|(name, _)| *name == size)
        .map(|(_, width)| *width)
        .ok_or_else(|| SlotbaseError::RepresentationFailed(format!("unknown size '{}'", size)))?;
    let mut color = serialized(value);
    if environment.get("include_alpha") == Some(&Value::Bool(false)) {
        color.truncate(7);
    }
    Ok(Representation::Text(format!(
        "<div style=\"background-color:{};width:{}px;height:{}px\"></div>",
        color,
        width,
        width * 3 / 2
    )))
}
fn render_image_tag(value: &Value, environment: &Environment) -> Result<Representation> {
    Ok(Representation::Text(format!(
        "<img src=\"{}{}\" height=\"{}\"/>",
        environment.text("static_url").unwrap_or(""),
        serialized(value),
        environment.text("scale").unwrap_or("20px")
    )))
}
fn render_image_json(value: &Value, environment: &Environment) -> Result<Representation> {
    let url = format!("{}{}", environment.text("static_url").unwrap_or(""), serialized(value));
    Ok(Representation::Text(json!({ "image": url }).to_string()))
}

// ------------- Attributes -------------
fn attrs_plain_text(_: &Value, _: &Environment) -> Result<Attrs> {
    let mut attrs = Attrs::new();
    attrs.insert("type".into(), Value::from(PLAIN_TEXT));
    Ok(attrs)
}
fn attrs_none(_: &Value, _: &Environment) -> Result<Attrs> {
    Ok(Attrs::new())
}
