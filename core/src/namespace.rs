//! Runtime view of the aggregated namespace.
//!
//! The `pub use` re-exports at the crate root are the real surface; this
//! module lets tooling check, at startup, that every subsystem crate is
//! linked and still exports what the stack forwards. Resolution is
//! all-or-nothing: any missing package or symbol fails the whole load and
//! no partial [`Namespace`] is ever produced.

use crate::VERSION;
use crate::error::StackError;

const MIND_EXPORTS: &[&str] = &["Mind", "Memory", "Identity", "MemoryType", "Trace", "CacheEntry"];

const BRIDGE_EXPORTS: &[&str] = &[
    "Bridge",
    "LLMProvider",
    "CallableLLM",
    "OllamaProvider",
    "RouterProvider",
    "SCRouterProvider",
    "Experiment",
    "ExperimentResult",
];

const ROUTER_EXPORTS: &[&str] = &["ToolCatalog", "Tool", "route"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Mind,
    Bridge,
    Router,
}

impl Subsystem {
    pub const ALL: [Subsystem; 3] = [Subsystem::Mind, Subsystem::Bridge, Subsystem::Router];

    pub fn package(self) -> &'static str {
        match self {
            Self::Mind => "kore-mind",
            Self::Bridge => "kore-bridge",
            Self::Router => "sc-router",
        }
    }

    /// Names the stack re-exports from this subsystem.
    pub fn forwarded(self) -> &'static [&'static str] {
        match self {
            Self::Mind => MIND_EXPORTS,
            Self::Bridge => BRIDGE_EXPORTS,
            Self::Router => ROUTER_EXPORTS,
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.package())
    }
}

/// What a linked subsystem crate says about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    pub package: &'static str,
    pub version: &'static str,
    pub exports: &'static [&'static str],
}

/// Manifests of the subsystems enabled in this build.
pub fn linked_manifests() -> Vec<Manifest> {
    let mut manifests = Vec::with_capacity(3);
    #[cfg(feature = "mind")]
    manifests.push(Manifest {
        package: kore_mind::PACKAGE,
        version: kore_mind::VERSION,
        exports: kore_mind::EXPORTS,
    });
    #[cfg(feature = "bridge")]
    manifests.push(Manifest {
        package: kore_bridge::PACKAGE,
        version: kore_bridge::VERSION,
        exports: kore_bridge::EXPORTS,
    });
    #[cfg(feature = "router")]
    manifests.push(Manifest {
        package: sc_router::PACKAGE,
        version: sc_router::VERSION,
        exports: sc_router::EXPORTS,
    });
    manifests
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    name: &'static str,
    origin: Subsystem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    bindings: Vec<Binding>,
    versions: Vec<(Subsystem, &'static str)>,
}

impl Namespace {
    /// Binds every forwarded name against `manifests`.
    pub fn resolve(manifests: &[Manifest]) -> Result<Self, StackError> {
        let required: Vec<(&'static str, Subsystem)> = Subsystem::ALL
            .iter()
            .flat_map(|s| s.forwarded().iter().map(move |name| (*name, *s)))
            .collect();
        Self::bind(&required, manifests)
    }

    fn bind(
        required: &[(&'static str, Subsystem)],
        manifests: &[Manifest],
    ) -> Result<Self, StackError> {
        for (i, (name, _)) in required.iter().enumerate() {
            if required[..i].iter().any(|(seen, _)| seen == name) {
                return Err(StackError::DuplicateExport { symbol: *name });
            }
        }

        let mut versions = Vec::with_capacity(Subsystem::ALL.len());
        let mut bindings = Vec::with_capacity(required.len());

        for subsystem in Subsystem::ALL {
            let package = subsystem.package();
            let manifest = manifests
                .iter()
                .find(|m| m.package == package)
                .ok_or(StackError::MissingPackage { package })?;

            for (name, _) in required.iter().filter(|(_, origin)| *origin == subsystem) {
                if !manifest.exports.contains(name) {
                    return Err(StackError::MissingSymbol {
                        package,
                        symbol: *name,
                    });
                }
                bindings.push(Binding {
                    name: *name,
                    origin: subsystem,
                });
            }
            versions.push((subsystem, manifest.version));
        }

        // Keep the declared export order regardless of subsystem iteration.
        bindings.sort_by_key(|b| required.iter().position(|(name, _)| *name == b.name));

        tracing::debug!(names = bindings.len(), "Namespace resolved");
        Ok(Self { bindings, versions })
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    /// Bound names in export order.
    pub fn exports(&self) -> Vec<&'static str> {
        self.bindings.iter().map(|b| b.name).collect()
    }

    pub fn origin(&self, name: &str) -> Option<Subsystem> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.origin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.origin(name).is_some()
    }

    pub fn names_from(&self, subsystem: Subsystem) -> Vec<&'static str> {
        self.bindings
            .iter()
            .filter(|b| b.origin == subsystem)
            .map(|b| b.name)
            .collect()
    }

    pub fn subsystem_version(&self, subsystem: Subsystem) -> Option<&'static str> {
        self.versions
            .iter()
            .find(|(s, _)| *s == subsystem)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Resolves the namespace against the subsystems linked into this build.
pub fn load_aggregator() -> Result<Namespace, StackError> {
    Namespace::resolve(&linked_manifests())
}
