pub mod catalog;
pub mod execute;
pub mod foreign;
pub mod handlers;
pub mod params;
pub mod validation;

use serde::{Deserialize, Serialize};

// ── Param types (used in UriCommand enum) ───────────────────────
use params::{
    CommandParams, EvalParams, EventParams, FrontmatterParams, MultiParams, OpenBlockParams,
    OpenParams, PluginParams, WriteParams,
};

// ── Return types (used in CommandResult enum) ───────────────────
use foreign::ForeignOutcome;
use handlers::frontmatter::FrontmatterReport;
use handlers::plugin::PluginReport;
use handlers::write::WriteReport;

// ── Handler modules (dispatch targets) ──────────────────────────
use handlers::{command, composite, eval, frontmatter, open, open_block, plugin, write};

// ── Command metadata ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCategory {
    Document,
    Navigation,
    Application,
    Composite,
}

impl CommandCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Navigation => "navigation",
            Self::Application => "application",
            Self::Composite => "composite",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Document => "Write documents and frontmatter",
            Self::Navigation => "Open documents, headings and blocks",
            Self::Application => "Run commands, evaluate code, toggle plugins",
            Self::Composite => "Batch dispatches and publish events",
        }
    }

    pub fn all() -> &'static [CommandCategory] {
        &[
            Self::Document,
            Self::Navigation,
            Self::Application,
            Self::Composite,
        ]
    }
}

pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    /// Changes vault contents or application state.
    pub mutating: bool,
    /// May open or focus a document.
    pub opens_view: bool,
}

// ── Command output ──────────────────────────────────────────────

/// Result of one dispatch. `message` is for people, `result` carries typed data.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub message: String,
    pub result: CommandResult,
}

impl CommandOutput {
    pub fn new(message: impl Into<String>, result: CommandResult) -> Self {
        Self {
            message: message.into(),
            result,
        }
    }
}

// ── define_handlers! macro ──────────────────────────────────────

/// Single source of truth for the built-in URI types. Generates:
/// 1. `UriCommand` enum (serde-tagged by `type`)
/// 2. `CommandResult` enum, plus a `Foreign` variant for registered handlers
/// 3. `UriCommand::info()`: metadata (type name, description, category, flags)
/// 4. `UriCommand::dispatch()`: run the handler
/// 5. `UriCommand::registry_entries()`: catalog entries with JSON schemas
/// 6. `UriCommand::from_params()`: deserialize from a `(type, params)` pair
/// 7. `UriCommand::is_builtin()`: whether a type name is handled here
macro_rules! define_handlers {
    (
        $(
            [ $c:expr $(, $f:ident)* ]
            $v:ident ( $p:ty ) $( -> $r:ty )?
            => $h:path, $n:literal : $d:literal ;
        )*
    ) => {
        // ── 1. UriCommand enum ──
        /// A parsed, built-in dispatch. Foreign types never become a `UriCommand`.
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum UriCommand {
            $(
                #[serde(rename = $n)]
                $v($p),
            )*
        }

        // ── 2. CommandResult enum ──
        #[derive(Debug, Clone, Serialize)]
        #[serde(tag = "type", content = "data")]
        pub enum CommandResult {
            $( $v $( ($r) )?, )*
            Foreign(ForeignOutcome),
        }

        // ── 3. UriCommand::info() ──
        impl UriCommand {
            pub fn info(&self) -> CommandInfo {
                match self {
                    $( UriCommand::$v(_) => CommandInfo {
                        name: $n,
                        description: $d,
                        category: $c,
                        mutating: define_handlers!(@has_flag mutating; $($f)*),
                        opens_view: define_handlers!(@has_flag opens_view; $($f)*),
                    }, )*
                }
            }
        }

        // ── 4. UriCommand::dispatch() ──
        impl UriCommand {
            pub(crate) async fn dispatch(
                self,
                state: std::sync::Arc<crate::state::AppState>,
            ) -> Result<CommandOutput, crate::error::AppError> {
                match self {
                    $( UriCommand::$v(p) => $h(state, p).await, )*
                }
            }
        }

        // ── 5. UriCommand::registry_entries() ──
        impl UriCommand {
            pub(crate) fn registry_entries() -> Vec<catalog::CommandRegistryEntry> {
                vec![
                    $( catalog::entry(
                        CommandInfo {
                            name: $n,
                            description: $d,
                            category: $c,
                            mutating: define_handlers!(@has_flag mutating; $($f)*),
                            opens_view: define_handlers!(@has_flag opens_view; $($f)*),
                        },
                        catalog::schema_value::<$p>(),
                    ), )*
                ]
            }
        }

        // ── 6. UriCommand::from_params() ──
        impl UriCommand {
            pub(crate) fn from_params(
                kind: &str,
                params: &serde_json::Value,
            ) -> Result<UriCommand, crate::error::AppError> {
                let invalid = |e: String| crate::error::AppError::invalid(format!("{kind}: {e}"));
                match kind {
                    $( $n => Ok(UriCommand::$v(catalog::de(params).map_err(invalid)?)), )*
                    _ => Err(crate::error::AppError::not_found(format!("Handler for type \"{kind}\""))),
                }
            }
        }

        // ── 7. UriCommand::is_builtin() ──
        impl UriCommand {
            pub const TYPES: &'static [&'static str] = &[ $( $n, )* ];

            pub fn is_builtin(kind: &str) -> bool {
                Self::TYPES.contains(&kind)
            }
        }
    };

    // Flag helpers: literal tokens match before metavariables, so a named flag
    // matches the first arm and any other ident recurses.
    (@has_flag mutating; mutating $($rest:ident)*) => { true };
    (@has_flag mutating; $_other:ident $($rest:ident)*) => { define_handlers!(@has_flag mutating; $($rest)*) };
    (@has_flag mutating;) => { false };

    (@has_flag opens_view; opens_view $($rest:ident)*) => { true };
    (@has_flag opens_view; $_other:ident $($rest:ident)*) => { define_handlers!(@has_flag opens_view; $($rest)*) };
    (@has_flag opens_view;) => { false };
}

// ── Built-in types ──────────────────────────────────────────────

define_handlers! {
    // ── Document ────────────────────────────────────────────
    [CommandCategory::Document, mutating, opens_view]
    Write(WriteParams) -> WriteReport
    => write::write, "write": "Create, overwrite, append to or prepend to a document, then show it.";

    [CommandCategory::Document, mutating]
    Frontmatter(FrontmatterParams) -> FrontmatterReport
    => frontmatter::frontmatter, "frontmatter": "Set a frontmatter value, or copy it to the clipboard when no data is given.";

    // ── Navigation ──────────────────────────────────────────
    [CommandCategory::Navigation, opens_view]
    Open(OpenParams) -> Option<String>
    => open::open, "open": "Open a document at a heading, block, line or offset.";

    [CommandCategory::Navigation, opens_view]
    OpenBlock(OpenBlockParams) -> String
    => open_block::open_block, "open-block": "Open whichever document holds a block id.";

    // ── Application ─────────────────────────────────────────
    [CommandCategory::Application, opens_view]
    Command(CommandParams) -> Option<String>
    => command::command, "command": "Run an application command by id or display name.";

    [CommandCategory::Application, mutating, opens_view]
    Eval(EvalParams)
    => eval::eval, "eval": "Evaluate source code. Requires allow_eval.";

    [CommandCategory::Application, mutating]
    Plugin(PluginParams) -> PluginReport
    => plugin::plugin, "plugin": "Enable or disable plugins by id.";

    // ── Composite ───────────────────────────────────────────
    [CommandCategory::Composite, mutating, opens_view]
    Multi(MultiParams) -> usize
    => composite::multi, "multi": "Run a JSON array of parameter objects in order, stopping at the first failure.";

    [CommandCategory::Composite]
    Event(EventParams) -> String
    => composite::event, "event": "Publish the parameters as a named event.";
}
