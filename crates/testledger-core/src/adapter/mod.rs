//! Framework adapters: translate exclusion and selection decisions into
//! each test runner's native command-line syntax.
//!
//! The set of frameworks is closed, so [`Adapter`] is an enum and every
//! operation is an exhaustive `match` over it. The per-framework details
//! live in one module each.
//!
//! | Adapter       | Exclusion                          | Selection             |
//! |---------------|------------------------------------|-----------------------|
//! | `webdriverio` | `--exclude <spec>` per spec        | `--spec <spec>` each  |
//! | `playwright`  | `--grep-invert name1\|name2`       | positional files      |
//! | `cypress`     | `--env TESTLEDGER_EXCLUDE=a,b`     | `--spec a,b`          |

pub mod cypress;
pub mod detect;
pub mod playwright;
pub mod registry;
pub mod webdriverio;

use std::fmt;
use std::path::Path;

pub use detect::Detection;
pub use registry::AdapterRegistry;

use crate::exclusion::ExclusionSet;

/// A supported test framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    WebdriverIo,
    Playwright,
    Cypress,
}

impl Adapter {
    /// All adapters in detection priority order.
    pub const ALL: [Adapter; 3] = [Adapter::WebdriverIo, Adapter::Playwright, Adapter::Cypress];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::WebdriverIo => webdriverio::NAME,
            Self::Playwright => playwright::NAME,
            Self::Cypress => cypress::NAME,
        }
    }

    /// Short names accepted in place of the canonical one.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::WebdriverIo => &["wdio"],
            Self::Playwright => &["pw"],
            Self::Cypress => &["cy"],
        }
    }

    /// Does this framework govern the project in `dir`?
    pub fn detect(self, dir: &Path) -> Detection {
        match self {
            Self::WebdriverIo => webdriverio::detect(dir),
            Self::Playwright => playwright::detect(dir),
            Self::Cypress => cypress::detect(dir),
        }
    }

    /// Arguments that exclude every spec in `exclusions`.
    ///
    /// The three categories are merged and deduplicated first, so the
    /// output depends only on the set of distinct specs.
    pub fn exclude_args(self, exclusions: &ExclusionSet) -> Vec<String> {
        let specs = exclusions.unique();
        match self {
            Self::WebdriverIo => webdriverio::exclude_args(&specs),
            Self::Playwright => playwright::exclude_args(&specs),
            Self::Cypress => cypress::exclude_args(&specs),
        }
    }

    /// The invocation used when the caller supplies no test command.
    pub fn default_command(self, dir: &Path) -> Vec<String> {
        match self {
            Self::WebdriverIo => webdriverio::default_command(dir),
            Self::Playwright => playwright::default_command(),
            Self::Cypress => cypress::default_command(),
        }
    }

    /// Arguments restricting a run to the specs a node was assigned.
    pub fn spec_selection_args(self, specs: &[String]) -> Vec<String> {
        match self {
            Self::WebdriverIo => webdriverio::spec_selection_args(specs),
            Self::Playwright => playwright::spec_selection_args(specs),
            Self::Cypress => cypress::spec_selection_args(specs),
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
