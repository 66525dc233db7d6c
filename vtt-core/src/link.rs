//! Macro links: `macro://name/output/recipients?payload`.
//!
//! A link names a macro, who sees its output and which tokens it runs
//! against, plus an argument payload. Payloads come in two shapes:
//! - a JSON tree, percent-encoded whole
//! - a property list, each `key=value` segment percent-encoded and joined with `&`
//!
//! Decoding tells them apart by trying JSON first.

use crate::error::MacroError;
use crate::interpreter::{Interpreter, TOKEN_LOCATION};
use crate::marshal;
use crate::trust;
use crate::world::{Channel, ChatMessage, TokenId, LIBRARY_PREFIX};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as Json;
use std::fmt;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Scheme literal, compared case-sensitively.
pub const SCHEME: &str = "macro";

lazy_static! {
    static ref LINK_PATTERN: Regex =
        Regex::new(r"(?s)^([^:]*)://([^/]*)/([^/]*)/([^?]*)(?:\?(.*))?$").unwrap();
}

// ============================================================================
// Targets
// ============================================================================

/// Who sees the output of a link run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Only the player who ran it.
    Caller,
    Gm,
    All,
    /// The caller and the GMs.
    CallerAndGm,
    None,
}

impl OutputTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputTarget::Caller => "self",
            OutputTarget::Gm => "gm",
            OutputTarget::All => "all",
            OutputTarget::CallerAndGm => "gm-self",
            OutputTarget::None => "none",
        }
    }

    /// Parses a target name. Unknown names mean [`OutputTarget::None`].
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "self" => OutputTarget::Caller,
            "gm" => OutputTarget::Gm,
            "all" | "say" => OutputTarget::All,
            "gm-self" | "gmself" => OutputTarget::CallerAndGm,
            _ => OutputTarget::None,
        }
    }

    fn channels(&self, player: &str) -> Vec<Channel> {
        match self {
            OutputTarget::Caller => vec![Channel::Player(player.to_string())],
            OutputTarget::Gm => vec![Channel::Gm],
            OutputTarget::All => vec![Channel::All],
            OutputTarget::CallerAndGm => vec![Channel::Player(player.to_string()), Channel::Gm],
            OutputTarget::None => Vec::new(),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tokens a link runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientTarget {
    Impersonated,
    Selected,
    /// Token ids or names; may also contain `impersonated` and `selected`.
    Tokens(Vec<String>),
}

impl RecipientTarget {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("impersonated") {
            RecipientTarget::Impersonated
        } else if trimmed.eq_ignore_ascii_case("selected") {
            RecipientTarget::Selected
        } else {
            RecipientTarget::Tokens(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect(),
            )
        }
    }
}

impl fmt::Display for RecipientTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientTarget::Impersonated => f.write_str("impersonated"),
            RecipientTarget::Selected => f.write_str("selected"),
            RecipientTarget::Tokens(tokens) => f.write_str(&tokens.join(",")),
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Arguments carried by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPayload {
    Json(Json),
    /// `key=value` segments in order.
    PropertyList(Vec<String>),
}

impl LinkPayload {
    /// Builds a payload from macro argument text.
    pub fn from_args(raw: &str) -> Self {
        match marshal::to_json(raw) {
            Some(tree) => LinkPayload::Json(tree),
            None => LinkPayload::PropertyList(
                raw.split(';')
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(String::from)
                    .collect(),
            ),
        }
    }

    fn encode(&self) -> String {
        match self {
            LinkPayload::Json(tree) => encode_component(&tree.to_string()),
            LinkPayload::PropertyList(segments) => segments
                .iter()
                .map(|segment| encode_component(segment))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    fn decode(encoded: &str) -> Self {
        if let Some(tree) = marshal::to_json(&decode_component(encoded)) {
            return LinkPayload::Json(tree);
        }
        LinkPayload::PropertyList(
            encoded
                .split('&')
                .filter(|segment| !segment.is_empty())
                .map(decode_component)
                .collect(),
        )
    }

    /// Argument text handed to the macro.
    ///
    /// Property lists are rejoined with `" ; "`; semicolons inside a segment
    /// become `&#59` so the list still splits the same way.
    pub fn to_args_text(&self) -> String {
        match self {
            LinkPayload::Json(tree) => tree.to_string(),
            LinkPayload::PropertyList(segments) => segments
                .iter()
                .map(|segment| segment.replace(';', "&#59"))
                .collect::<Vec<_>>()
                .join(" ; "),
        }
    }
}

fn encode_component(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

fn decode_component(text: &str) -> String {
    let Some((key, value)) = form_urlencoded::parse(text.as_bytes()).next() else {
        return String::new();
    };
    if text.contains('=') {
        format!("{key}={value}")
    } else {
        key.into_owned()
    }
}

// ============================================================================
// Links
// ============================================================================

/// A decoded macro link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroLink {
    pub macro_name: String,
    pub output: OutputTarget,
    pub recipients: RecipientTarget,
    pub payload: LinkPayload,
}

impl MacroLink {
    pub fn new(
        macro_name: impl Into<String>,
        output: OutputTarget,
        recipients: RecipientTarget,
        raw_args: &str,
    ) -> Self {
        Self {
            macro_name: macro_name.into(),
            output,
            recipients,
            payload: LinkPayload::from_args(raw_args),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{SCHEME}://{}/{}/{}?{}",
            self.macro_name,
            self.output,
            self.recipients,
            self.payload.encode()
        )
    }

    /// Parses a link. Anything not shaped like one yields `None`.
    pub fn decode(text: &str) -> Option<Self> {
        let caps = LINK_PATTERN.captures(text.trim())?;
        if caps.get(1)?.as_str() != SCHEME {
            return None;
        }
        let link = Self {
            macro_name: caps.get(2)?.as_str().to_string(),
            output: OutputTarget::parse(caps.get(3)?.as_str()),
            recipients: RecipientTarget::parse(caps.get(4)?.as_str()),
            payload: caps
                .get(5)
                .map(|payload| LinkPayload::decode(payload.as_str()))
                .unwrap_or(LinkPayload::PropertyList(Vec::new())),
        };
        debug!(macro_name = %link.macro_name, output = %link.output, "decoded macro link");
        Some(link)
    }
}

impl fmt::Display for MacroLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// True iff the link targets an auto-execute macro on a trusted library token.
///
/// GM membership of the token's owners is read at the time of the call.
pub fn is_auto_executable(interpreter: &Interpreter, text: &str) -> bool {
    let Some(link) = MacroLink::decode(text) else {
        return false;
    };
    let Some((_, location)) = link.macro_name.split_once('@') else {
        return false;
    };
    if !location.to_lowercase().starts_with(LIBRARY_PREFIX) {
        return false;
    }
    let Ok(resolved) = interpreter.resolve_macro(&link.macro_name, None, "") else {
        return false;
    };
    if !resolved.auto_execute {
        return false;
    }
    interpreter
        .session()
        .token(resolved.holder)
        .map(|token| trust::token_is_trusted(&token, interpreter.session()))
        .unwrap_or(false)
}

// ============================================================================
// Running
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkRunOptions {
    /// Record errors per recipient instead of stopping the whole run.
    pub isolate_recipient_errors: bool,
}

impl LinkRunOptions {
    pub fn isolated() -> Self {
        Self {
            isolate_recipient_errors: true,
        }
    }
}

/// Output of one recipient's run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientOutput {
    pub subject: Option<TokenId>,
    pub text: String,
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipientFailure {
    pub recipient: String,
    pub error: MacroError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRunReport {
    pub outputs: Vec<RecipientOutput>,
    pub failures: Vec<RecipientFailure>,
}

fn resolve_recipients(
    interpreter: &Interpreter,
    recipients: &RecipientTarget,
) -> Vec<(String, Result<Option<TokenId>, MacroError>)> {
    let session = interpreter.session();
    let impersonated = || ("impersonated".to_string(), Ok(session.impersonated()));
    let selected = || {
        session
            .selected()
            .into_iter()
            .map(|id| (id.to_string(), Ok(Some(id))))
            .collect::<Vec<_>>()
    };

    match recipients {
        RecipientTarget::Impersonated => vec![impersonated()],
        RecipientTarget::Selected => selected(),
        RecipientTarget::Tokens(tokens) => {
            let mut resolved = Vec::new();
            for token in tokens {
                if token.eq_ignore_ascii_case("impersonated") {
                    resolved.push(impersonated());
                } else if token.eq_ignore_ascii_case("selected") {
                    resolved.extend(selected());
                } else {
                    let found = session.find_token(token).map(|t| Some(t.id)).ok_or_else(|| {
                        MacroError::UnknownToken {
                            function: "macroLink".to_string(),
                            token: token.clone(),
                        }
                    });
                    resolved.push((token.clone(), found));
                }
            }
            resolved
        }
    }
}

/// Runs a link's macro once per recipient, each in a fresh scope.
///
/// An abort ends only the recipient it happened in. Other errors end the
/// whole run unless `options` isolates them.
pub fn run(
    interpreter: &Interpreter,
    text: &str,
    player: &str,
    options: LinkRunOptions,
) -> Result<LinkRunReport, MacroError> {
    let link = MacroLink::decode(text).ok_or_else(|| MacroError::UnknownMacro {
        name: text.to_string(),
        reason: "not a macro link".to_string(),
    })?;
    info!(macro_name = %link.macro_name, output = %link.output, recipients = %link.recipients, "running macro link");

    let args = link.payload.to_args_text();
    let mut report = LinkRunReport::default();

    for (recipient, subject) in resolve_recipients(interpreter, &link.recipients) {
        let result = subject.and_then(|subject| {
            let resolved = interpreter.resolve_macro(&link.macro_name, subject, TOKEN_LOCATION)?;
            let output = interpreter.run_resolved(&resolved, &args, subject, player)?;
            Ok((subject, output))
        });

        match result {
            Ok((subject, output)) => {
                if !output.text.trim().is_empty() {
                    for channel in link.output.channels(player) {
                        interpreter
                            .session()
                            .deliver(ChatMessage::new(channel, player, output.text.clone()));
                    }
                }
                report.outputs.push(RecipientOutput {
                    subject,
                    text: output.text,
                    aborted: output.aborted,
                });
            }
            Err(error) if options.isolate_recipient_errors => {
                warn!(recipient = %recipient, error = %error, "macro link recipient failed");
                report.failures.push(RecipientFailure { recipient, error });
            }
            Err(error) => return Err(error),
        }
    }

    Ok(report)
}
