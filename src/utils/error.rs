//! Error types for the celx client

use thiserror::Error;

/// Main error type for celx operations
#[derive(Debug, Error)]
pub enum CelxError {
    /// Markup, component or style compilation failed
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// Action descriptor could not be compiled
    #[error("action error: {0}")]
    Dsl(#[from] DslError),
    /// A selector matched nothing, or matched the wrong kind of widget
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),
    /// Transport failure or non-2xx response
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    /// Failure inside scripted behavior
    #[error("{0}")]
    Script(#[from] ScriptError),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CelxError {
    /// Whether this error only signals that the owning page went away
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Network(NetworkError::Cancelled))
    }
}

/// Compilation errors raised while turning markup into widgets
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The document is not well-formed markup
    #[error("malformed markup: {0}")]
    Markup(String),
    /// Neither a widget kind nor a registered component
    #[error("unknown tag <{0}>")]
    UnknownTag(String),
    /// A component declaration is missing its name
    #[error("components must have a name")]
    MissingComponentName,
    /// A component is declared or expanded incorrectly
    #[error("malformed component '{name}': {reason}")]
    MalformedComponent { name: String, reason: String },
    /// A `$name` placeholder has no value when the widget is rendered
    #[error("unknown variable '{name}' for {widget}")]
    UnresolvedPlaceholder { name: String, widget: String },
    /// The document has no `<page>` element
    #[error("no <page> node found")]
    MissingPage,
    /// A page declares more than one content subtree
    #[error("pages must have exactly one content node, found {0}")]
    MultipleContentNodes(usize),
    /// A rule block could not be parsed
    #[error("style rules, line {line}: {message}")]
    Style { line: usize, message: String },
    /// A non-container widget was given widget children
    #[error("{0} cannot hold children")]
    LeafWithChildren(String),
    /// A script handler name does not correspond to an event
    #[error("invalid event handler '{0}'")]
    InvalidEventHandler(String),
}

/// Errors raised by the action DSL compiler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DslError {
    /// The verb token is not part of the language
    #[error("unknown verb '{0}'")]
    UnknownVerb(String),
    /// A verb was given without an argument
    #[error("missing argument for verb {0}")]
    MissingArgument(String),
    /// A verb was given more arguments than it accepts
    #[error("too many arguments for verb {verb} ({count} given)")]
    TooManyArguments { verb: String, count: usize },
    /// A modifier that is not legal for the verb
    #[error("unknown modifier '{modifier}' for verb {verb}")]
    UnknownModifier { verb: String, modifier: String },
    /// A verb that requires a modifier was given none
    #[error("verb {0} requires a modifier")]
    MissingModifier(String),
}

/// Errors raised while resolving selectors against the live tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// A tree edit ran before any remote call produced a result
    #[error("no result to update tree with")]
    NoResult,
    /// The selector matched no widget
    #[error("nothing matched selector '{0}'")]
    NoMatch(String),
    /// A container was required
    #[error("cannot modify tree of non-container {0}")]
    NotContainer(String),
    /// The target has no container parent to insert into
    #[error("cannot modify tree of non-container parent of {0}")]
    ParentNotContainer(String),
    /// A widget id no longer refers to a live widget
    #[error("widget {0} no longer exists")]
    Detached(usize),
    /// The selector text is not valid
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
}

/// Network-specific errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// Invalid URL
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
    /// HTTP error with status code
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },
    /// The request could not be sent or read
    #[error("transport failure: {0}")]
    Transport(String),
    /// The owning page changed or the session shut down while in flight
    #[error("request cancelled")]
    Cancelled,
}

/// Where a script error came from
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOrigin {
    /// Handler or binding name (e.g. `on_submit`)
    pub handler: String,
    /// Unique selector of the widget owning the handler
    pub widget: String,
    /// Source snippet around the failing line, failing line marked with `>`
    pub snippet: String,
}

/// Failure inside scripted behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    /// Human readable message
    pub message: String,
    /// 1-based line in the script source, when known
    pub line: Option<usize>,
    /// Origin metadata attached when the error leaves a handler
    pub origin: Option<ScriptOrigin>,
}

impl ScriptError {
    /// Create an error without position information
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            origin: None,
        }
    }

    /// Create an error at a source line
    pub fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            origin: None,
        }
    }

    /// Attach a line if none is known yet
    pub fn or_line(mut self, line: usize) -> Self {
        if self.line.is_none() && line > 0 {
            self.line = Some(line);
        }
        self
    }

    /// Wrap with the handler, widget and source the error came from
    pub fn with_origin(mut self, handler: &str, widget: &str, source: &str) -> Self {
        let snippet = snippet_around(source, self.line.unwrap_or(0));
        self.origin = Some(ScriptOrigin {
            handler: handler.to_string(),
            widget: widget.to_string(),
            snippet,
        });
        self
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            Some(origin) => {
                write!(f, "error in '{}'\n\n{}:\n\n", origin.handler, origin.widget)?;
                if !origin.snippet.is_empty() {
                    writeln!(f, "{}\n", origin.snippet)?;
                }
                match self.line {
                    Some(line) => write!(f, "line {}: {}", line, self.message),
                    None => write!(f, "{}", self.message),
                }
            }
            None => match self.line {
                Some(line) => write!(f, "script error, line {}: {}", line, self.message),
                None => write!(f, "script error: {}", self.message),
            },
        }
    }
}

impl std::error::Error for ScriptError {}

/// Up to four lines either side of `line`, the line itself marked with `>`
fn snippet_around(source: &str, line: usize) -> String {
    if line == 0 {
        return String::new();
    }

    let lines: Vec<&str> = source.lines().collect();
    let start = line.saturating_sub(5);
    let end = (line + 4).min(lines.len());

    lines
        .iter()
        .enumerate()
        .take(end)
        .skip(start)
        .map(|(idx, text)| {
            let marker = if idx + 1 == line { "> " } else { "  " };
            format!("{}{}", marker, text.trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<quick_xml::Error> for CelxError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Compile(CompileError::Markup(err.to_string()))
    }
}

impl From<reqwest::Error> for CelxError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(NetworkError::Transport(err.to_string()))
    }
}

impl From<url::ParseError> for CelxError {
    fn from(err: url::ParseError) -> Self {
        Self::Network(NetworkError::InvalidUrl(err.to_string()))
    }
}

/// Convenience Result type for celx operations
pub type Result<T> = std::result::Result<T, CelxError>;
