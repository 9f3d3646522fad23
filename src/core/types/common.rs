//! Common type definitions shared across the engine

use serde::{Deserialize, Serialize};

/// Semantic task classes a provider can declare support for.
///
/// The capability matrix is static per provider (see the descriptor table in
/// `core::providers`); the router only considers providers whose matrix
/// contains the requested capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ChatCompletion,
    CodeCompletion,
    CodeAnalysis,
    CodeExplanation,
    Refactor,
    TestGen,
    Streaming,
}

impl Capability {
    /// All capabilities, in declaration order.
    pub const ALL: [Capability; 7] = [
        Capability::ChatCompletion,
        Capability::CodeCompletion,
        Capability::CodeAnalysis,
        Capability::CodeExplanation,
        Capability::Refactor,
        Capability::TestGen,
        Capability::Streaming,
    ];

    /// Stable wire name, also used for routing-hint tags.
    pub fn name(self) -> &'static str {
        match self {
            Capability::ChatCompletion => "chat_completion",
            Capability::CodeCompletion => "code_completion",
            Capability::CodeAnalysis => "code_analysis",
            Capability::CodeExplanation => "code_explanation",
            Capability::Refactor => "refactor",
            Capability::TestGen => "test_gen",
            Capability::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
