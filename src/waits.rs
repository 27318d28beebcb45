use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How long a wait stays open before the caller is expected to supply a
/// timeout resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Timeout {
    pub seconds: u64,
}

/// A point where traversal suspends until external input arrives. Waits live
/// on routers and decide which resume kinds are acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wait {
    Msg {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Timeout>,
    },
    Dial {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Timeout>,
    },
}

impl Wait {
    pub fn timeout(&self) -> Option<Timeout> {
        match self {
            Wait::Msg { timeout } | Wait::Dial { timeout } => *timeout,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Wait::Msg { .. } => "msg",
            Wait::Dial { .. } => "dial",
        }
    }
}
