use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::host::ViewMode;
use crate::uri::RawParams;

/// Deserializers for values that arrive as URI strings or as JSON scalars
/// inside a `multi` payload. Use with `#[serde(default, deserialize_with = ...)]`.
///
/// - `null` or a missing key → `None`
/// - numbers and bools are accepted where text is expected, and vice versa
pub mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(D::Error::custom(format!("expected text, got {other}"))),
        }
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected an integer, got \"{s}\""))),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected an integer, got {n}"))),
            Some(other) => Err(D::Error::custom(format!("expected an integer, got {other}"))),
        }
    }

    /// Truthiness of a URI flag. Empty text and `"false"` are false.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => !(s.is_empty() || s == "false"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(_) => true,
        })
    }
}

// ── Shared params ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    New,
    Append,
    Prepend,
    Overwrite,
}

/// Cursor placement and view options shared by every handler that opens a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CursorParams {
    /// 1-based line.
    #[serde(default, deserialize_with = "lenient::int")]
    #[schemars(with = "Option<i64>")]
    pub line: Option<i64>,
    /// 1-based column.
    #[serde(default, deserialize_with = "lenient::int")]
    #[schemars(with = "Option<i64>")]
    pub column: Option<i64>,
    /// Character offset into the document; wins over line/column.
    #[serde(default, deserialize_with = "lenient::int")]
    #[schemars(with = "Option<i64>")]
    pub offset: Option<i64>,
    /// `source`, `live` or `preview`.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub viewmode: Option<String>,
    /// `true`, `false`, `tab`, `split`, `window`, `popover` or `silent`.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub openmode: Option<String>,
}

impl CursorParams {
    pub fn has_position(&self) -> bool {
        self.line.is_some() || self.column.is_some() || self.offset.is_some()
    }

    pub fn is_silent(&self) -> bool {
        self.openmode.as_deref() == Some("silent")
    }

    pub fn view(&self) -> Result<Option<ViewMode>, AppError> {
        self.viewmode.as_deref().map(ViewMode::parse).transpose()
    }
}

/// Document to open before a `command` or `eval` runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OpenFileParams {
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub filepath: Option<String>,
    #[serde(default)]
    pub mode: Option<WriteMode>,
    #[serde(flatten)]
    pub cursor: CursorParams,
}

// ── Document params ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[allow(non_snake_case)]
pub struct WriteParams {
    /// Target document. Falls back to the owner of `uid`, then to the active file.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub filepath: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub data: Option<String>,
    #[serde(default)]
    pub mode: Option<WriteMode>,
    /// Heading whose section receives appended or prepended text.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub heading: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    #[schemars(with = "Option<bool>")]
    pub writeUid: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub uid: Option<String>,
    #[serde(flatten)]
    pub cursor: CursorParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FrontmatterParams {
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub filepath: Option<String>,
    /// Comma-separated path, e.g. `tags,0`.
    #[serde(deserialize_with = "required_text")]
    #[schemars(with = "String")]
    pub frontmatterkey: String,
    /// JSON (or plain text) to store. Absent or empty copies the value instead.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub data: Option<String>,
}

// ── Navigation params ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[allow(non_snake_case)]
pub struct OpenParams {
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub filepath: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub heading: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub block: Option<String>,
    /// `append` moves the cursor to the end, `prepend` to the start.
    #[serde(default)]
    pub mode: Option<WriteMode>,
    #[serde(default, deserialize_with = "lenient::flag")]
    #[schemars(with = "Option<bool>")]
    pub writeUid: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub uid: Option<String>,
    #[serde(flatten)]
    pub cursor: CursorParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[allow(non_snake_case)]
pub struct OpenBlockParams {
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub block: Option<String>,
    #[serde(default, alias = "openmode", deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub openMode: Option<String>,
    /// Ignored; the block's owner decides which document opens.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub filepath: Option<String>,
}

// ── Application params ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CommandParams {
    #[serde(flatten)]
    pub open: OpenFileParams,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub commandid: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub commandname: Option<String>,
    /// Press the confirmation button the command leaves open.
    #[serde(default, deserialize_with = "lenient::flag")]
    #[schemars(with = "Option<bool>")]
    pub confirm: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EvalParams {
    #[serde(deserialize_with = "required_text")]
    #[schemars(with = "String")]
    pub eval: String,
    #[serde(flatten)]
    pub open: OpenFileParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[allow(non_snake_case)]
pub struct PluginParams {
    /// Comma-separated plugin ids.
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub enablePlugins: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub disablePlugins: Option<String>,
}

impl PluginParams {
    pub fn enable_ids(&self) -> Vec<&str> {
        split_ids(self.enablePlugins.as_deref())
    }

    pub fn disable_ids(&self) -> Vec<&str> {
        split_ids(self.disablePlugins.as_deref())
    }
}

fn split_ids(csv: Option<&str>) -> Vec<&str> {
    csv.map(|s| s.split(',').map(str::trim).filter(|id| !id.is_empty()).collect())
        .unwrap_or_default()
}

// ── Composite params ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MultiParams {
    /// Percent-encoded JSON array of parameter objects. A JSON array is also
    /// accepted as is.
    #[serde(default)]
    pub comamnds: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[allow(non_snake_case)]
pub struct EventParams {
    #[serde(default, deserialize_with = "lenient::text")]
    #[schemars(with = "Option<String>")]
    pub eventName: Option<String>,
    /// Every other parameter, forwarded with the event.
    #[serde(flatten)]
    pub extra: RawParams,
}

fn required_text<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient::text(d)?.ok_or_else(|| serde::de::Error::custom("expected text"))
}
