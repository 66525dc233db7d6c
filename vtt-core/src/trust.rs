//! Trust derivation for macro invocations.
//!
//! A macro is trusted when the text being run comes from a token that only
//! GMs own, or from a privileged caller. Arguments never take part: trust is
//! fixed when an invocation starts and handed down unchanged.
//!
//! GM membership is read from the session on every check, so demoting a GM
//! takes effect on the next invocation.

use crate::session::SessionState;
use crate::world::{Token, TokenId};
use std::fmt;

/// Whether privileged built-ins may run in the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    Trusted,
    Untrusted,
}

impl Trust {
    pub fn is_trusted(self) -> bool {
        self == Trust::Trusted
    }
}

impl From<bool> for Trust {
    fn from(trusted: bool) -> Self {
        if trusted {
            Trust::Trusted
        } else {
            Trust::Untrusted
        }
    }
}

impl fmt::Display for Trust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trust::Trusted => write!(f, "trusted"),
            Trust::Untrusted => write!(f, "untrusted"),
        }
    }
}

/// Where the text of a macro came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroOrigin {
    /// A macro button stored on a token.
    Token(TokenId),
    /// Text typed into chat or supplied by an internal caller.
    Unattached { privileged: bool },
}

impl MacroOrigin {
    /// Server-side or other internal callers.
    pub fn internal() -> Self {
        MacroOrigin::Unattached { privileged: true }
    }

    /// Chat input from a client; `privileged` is the caller's flag.
    pub fn chat(privileged: bool) -> Self {
        MacroOrigin::Unattached { privileged }
    }
}

/// True iff the token is not owned by everyone and all its owners are GMs.
pub fn token_is_trusted(token: &Token, session: &dyn SessionState) -> bool {
    !token.owned_by_all && token.owners.iter().all(|owner| session.is_gm(owner))
}

/// Computes trust for an invocation from its origin.
pub fn is_trusted(origin: &MacroOrigin, session: &dyn SessionState) -> Trust {
    match origin {
        MacroOrigin::Unattached { privileged } => Trust::from(*privileged),
        MacroOrigin::Token(id) => session
            .token(*id)
            .map(|token| token_is_trusted(&token, session))
            .unwrap_or(false)
            .into(),
    }
}
