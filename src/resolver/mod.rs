//! Bit resolution.
//!
//! Walks every declared bit of a descriptor depth first, loading each bit's
//! own descriptor from a [`BitSource`] and attaching it to the plan that
//! declared it. Transitive bits are flattened into the originating plan's
//! `bits` map. A bit that is not installed is a warning, never an error.

pub mod errors;
pub mod graph;

pub use errors::ResolveError;
pub use graph::{BitGraph, BitNode};

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::descriptor::{
    DeclaredBit, ProjectDescriptor, ResolvedBit, DEFAULT_TARGET, DESCRIPTOR_NAME,
};
use crate::core::errors::DescriptorError;

/// Where bit descriptors come from.
pub trait BitSource: Sync {
    /// Human-readable location of a bit, used in warnings.
    fn location(&self, name: &str, version: &str) -> String;

    /// Load a bit's descriptor. `Ok(None)` means the bit is not installed.
    fn load(&self, name: &str, version: &str) -> Result<Option<ProjectDescriptor>, DescriptorError>;
}

/// Installed bits under `<bits_dir>/<name>/<version>/project.yaml`.
#[derive(Debug, Clone)]
pub struct LocalBitSource {
    bits_dir: PathBuf,
}

impl LocalBitSource {
    pub fn new(bits_dir: impl Into<PathBuf>) -> Self {
        LocalBitSource {
            bits_dir: bits_dir.into(),
        }
    }

    /// Directory a bit version is installed into.
    pub fn bit_dir(&self, name: &str, version: &str) -> PathBuf {
        self.bits_dir.join(name).join(version)
    }

    pub fn bits_dir(&self) -> &Path {
        &self.bits_dir
    }
}

impl BitSource for LocalBitSource {
    fn location(&self, name: &str, version: &str) -> String {
        self.bit_dir(name, version).display().to_string()
    }

    fn load(&self, name: &str, version: &str) -> Result<Option<ProjectDescriptor>, DescriptorError> {
        let path = self.bit_dir(name, version).join(DESCRIPTOR_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        ProjectDescriptor::load(&path).map(Some)
    }
}

/// What to do when one bit is declared with different versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the version seen first and warn.
    #[default]
    FirstSeen,
    /// Keep the higher version and warn.
    Highest,
    /// Fail resolution.
    Error,
}

/// Immutable resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub bits_dir: PathBuf,
    pub conflict: ConflictPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            bits_dir: PathBuf::from(crate::util::config::DEFAULT_BITS_DIR),
            conflict: ConflictPolicy::default(),
        }
    }
}

/// A non-fatal resolution problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    /// A declared bit has no installed descriptor.
    NotInstalled {
        name: String,
        version: String,
        location: String,
    },
    /// A bit was declared with two versions; `kept` is the one used.
    VersionConflict {
        name: String,
        kept: String,
        ignored: String,
        requirer: String,
    },
    /// Bits that declare each other.
    Cycle { members: Vec<String> },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveWarning::NotInstalled {
                name,
                version,
                location,
            } => write!(
                f,
                "bit `{}` {} is not installed at {}; run `bits install`",
                name, version, location
            ),
            ResolveWarning::VersionConflict {
                name,
                kept,
                ignored,
                requirer,
            } => write!(
                f,
                "bit `{}` is declared as {} by `{}` but {} is used",
                name, ignored, requirer, kept
            ),
            ResolveWarning::Cycle { members } => {
                write!(f, "bits declare each other: {}", members.join(" <-> "))
            }
        }
    }
}

/// The outcome of resolving a descriptor.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The descriptor with every plan's `bits` map filled in.
    pub descriptor: ProjectDescriptor,
    pub warnings: Vec<ResolveWarning>,
    pub graph: BitGraph,
}

/// Resolves declared bits against a [`BitSource`].
pub struct Resolver<'a> {
    source: &'a dyn BitSource,
    policy: ConflictPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn BitSource, policy: ConflictPolicy) -> Self {
        Resolver { source, policy }
    }

    /// Resolve the project-wide plans and every target's plans.
    ///
    /// Under [`ConflictPolicy::Highest`], replacing a bit with a higher
    /// version pins that version and starts a fresh pass, so nothing the
    /// replaced version pulled in survives.
    pub fn resolve(&self, descriptor: ProjectDescriptor) -> Result<Resolution, ResolveError> {
        let mut pins = HashMap::new();
        let mut loaded = HashMap::new();

        loop {
            let mut walk = Walk::new(self.source, self.policy, &descriptor.name, pins, loaded);
            let resolved = walk.run(descriptor.clone())?;

            if walk.repinned {
                tracing::debug!(
                    "re-resolving `{}` with {} pinned bit(s)",
                    descriptor.name,
                    walk.pins.len()
                );
                pins = walk.pins;
                loaded = walk.loaded;
                continue;
            }

            for warning in &walk.warnings {
                tracing::warn!("{}", warning);
            }
            tracing::debug!(
                "resolved {} bit(s) for `{}` with {} warning(s)",
                walk.graph.len(),
                descriptor.name,
                walk.warnings.len()
            );

            return Ok(Resolution {
                descriptor: resolved,
                warnings: walk.warnings,
                graph: walk.graph,
            });
        }
    }
}

/// Which compilation plan a declaration chain started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Build,
    Test,
}

/// State of one resolution pass.
struct Walk<'a> {
    source: &'a dyn BitSource,
    policy: ConflictPolicy,
    graph: BitGraph,
    warnings: Vec<ResolveWarning>,
    /// Each `(name, version)` is loaded at most once, across passes too.
    loaded: HashMap<(String, String), Option<ProjectDescriptor>>,
    /// Who declared the version currently kept for a bit.
    requirers: HashMap<String, String>,
    /// Versions chosen by an earlier pass under the `Highest` policy.
    pins: HashMap<String, String>,
    /// A new pin was recorded; the pass must be repeated.
    repinned: bool,
}

impl<'a> Walk<'a> {
    fn new(
        source: &'a dyn BitSource,
        policy: ConflictPolicy,
        root: &str,
        pins: HashMap<String, String>,
        loaded: HashMap<(String, String), Option<ProjectDescriptor>>,
    ) -> Self {
        Walk {
            source,
            policy,
            graph: BitGraph::new(root),
            warnings: Vec::new(),
            loaded,
            requirers: HashMap::new(),
            pins,
            repinned: false,
        }
    }

    fn run(&mut self, mut descriptor: ProjectDescriptor) -> Result<ProjectDescriptor, ResolveError> {
        let root = descriptor.name.clone();
        let build = descriptor.build.declared_bits.clone();
        let test = descriptor.test.declared_bits.clone();

        self.resolve_plan(&root, &build, DEFAULT_TARGET, Origin::Build, &mut descriptor.build.bits)?;
        self.resolve_plan(&root, &test, DEFAULT_TARGET, Origin::Test, &mut descriptor.test.bits)?;

        // Project-wide bits are resolved again under every target, since a
        // bit may declare different bits for each target it describes.
        for (name, target) in descriptor.targets.iter_mut() {
            let declared: Vec<DeclaredBit> =
                build.iter().chain(&target.build.declared_bits).cloned().collect();
            self.resolve_plan(&root, &declared, name, Origin::Build, &mut target.build.bits)?;
            let declared: Vec<DeclaredBit> =
                test.iter().chain(&target.test.declared_bits).cloned().collect();
            self.resolve_plan(&root, &declared, name, Origin::Test, &mut target.test.bits)?;
        }

        for members in self.graph.cycles() {
            self.warn(ResolveWarning::Cycle { members });
        }
        Ok(descriptor)
    }

    fn warn(&mut self, warning: ResolveWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Swap in the pinned version when it is higher than the declared one.
    fn pinned(&mut self, requirer: &str, bit: &DeclaredBit) -> DeclaredBit {
        let pin = match self.pins.get(&bit.name) {
            Some(pin) if compare_versions(pin, &bit.version) == Ordering::Greater => pin.clone(),
            _ => return bit.clone(),
        };
        self.warn(ResolveWarning::VersionConflict {
            name: bit.name.clone(),
            kept: pin.clone(),
            ignored: bit.version.clone(),
            requirer: requirer.to_string(),
        });
        DeclaredBit {
            version: pin,
            ..bit.clone()
        }
    }

    fn resolve_plan(
        &mut self,
        requirer: &str,
        declared: &[DeclaredBit],
        consumer: &str,
        origin: Origin,
        bits: &mut BTreeMap<String, ResolvedBit>,
    ) -> Result<(), ResolveError> {
        for bit in declared {
            self.graph.add_edge(requirer, &bit.name);
            let bit = &self.pinned(requirer, bit);

            let kept = bits.get(&bit.name).map(|r| r.declared.version.clone());
            if let Some(kept) = kept {
                if kept != bit.version {
                    self.conflict(requirer, bit, &kept, consumer, origin, bits)?;
                }
                continue;
            }

            if let Some(descriptor) = self.fetch(bit)? {
                self.insert(requirer, bit, descriptor, consumer, origin, bits)?;
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        requirer: &str,
        bit: &DeclaredBit,
        descriptor: ProjectDescriptor,
        consumer: &str,
        origin: Origin,
        bits: &mut BTreeMap<String, ResolvedBit>,
    ) -> Result<(), ResolveError> {
        tracing::debug!("resolved bit `{}` {} for `{}`", bit.name, bit.version, requirer);
        self.graph.set_version(&bit.name, &bit.version);
        self.requirers.insert(bit.name.clone(), requirer.to_string());

        let nested = nested_declarations(&descriptor, bit, consumer, origin);
        // Inserted before recursing so bits that declare each other terminate.
        bits.insert(
            bit.name.clone(),
            ResolvedBit {
                declared: bit.clone(),
                descriptor,
            },
        );
        self.resolve_plan(&bit.name, &nested, consumer, origin, bits)
    }

    fn conflict(
        &mut self,
        requirer: &str,
        bit: &DeclaredBit,
        kept: &str,
        consumer: &str,
        origin: Origin,
        bits: &mut BTreeMap<String, ResolvedBit>,
    ) -> Result<(), ResolveError> {
        let kept_by = self
            .requirers
            .get(&bit.name)
            .cloned()
            .unwrap_or_else(|| self.graph.root().to_string());

        match self.policy {
            ConflictPolicy::Error => Err(ResolveError::VersionConflict {
                name: bit.name.clone(),
                requirements: vec![
                    (kept_by, kept.to_string()),
                    (requirer.to_string(), bit.version.clone()),
                ],
            }),
            ConflictPolicy::Highest if compare_versions(&bit.version, kept) == Ordering::Greater => {
                match self.fetch(bit)? {
                    Some(_) => {
                        tracing::debug!("pinning bit `{}` to {}", bit.name, bit.version);
                        self.pins.insert(bit.name.clone(), bit.version.clone());
                        self.repinned = true;
                        Ok(())
                    }
                    None => {
                        self.warn(ResolveWarning::VersionConflict {
                            name: bit.name.clone(),
                            kept: kept.to_string(),
                            ignored: bit.version.clone(),
                            requirer: requirer.to_string(),
                        });
                        Ok(())
                    }
                }
            }
            ConflictPolicy::FirstSeen | ConflictPolicy::Highest => {
                self.warn(ResolveWarning::VersionConflict {
                    name: bit.name.clone(),
                    kept: kept.to_string(),
                    ignored: bit.version.clone(),
                    requirer: requirer.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Load a bit's descriptor once, warning when it is missing.
    fn fetch(&mut self, bit: &DeclaredBit) -> Result<Option<ProjectDescriptor>, ResolveError> {
        let key = (bit.name.clone(), bit.version.clone());
        let loaded = match self.loaded.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let loaded = self
                    .source
                    .load(&bit.name, &bit.version)
                    .map_err(|source| ResolveError::BrokenBit {
                        name: bit.name.clone(),
                        version: bit.version.clone(),
                        source,
                    })?;
                self.loaded.insert(key, loaded.clone());
                loaded
            }
        };

        if loaded.is_none() {
            self.warn(ResolveWarning::NotInstalled {
                name: bit.name.clone(),
                version: bit.version.clone(),
                location: self.source.location(&bit.name, &bit.version),
            });
        }
        Ok(loaded)
    }
}

/// Declarations a bit contributes to the plan that pulled it in.
fn nested_declarations(
    descriptor: &ProjectDescriptor,
    bit: &DeclaredBit,
    consumer: &str,
    origin: Origin,
) -> Vec<DeclaredBit> {
    let target = descriptor.select_target(bit, consumer).ok();

    let mut nested = descriptor.build.declared_bits.clone();
    if let Some(target) = target {
        nested.extend(target.build.declared_bits.iter().cloned());
    }
    if origin == Origin::Test {
        nested.extend(descriptor.test.declared_bits.iter().cloned());
        if let Some(target) = target {
            nested.extend(target.test.declared_bits.iter().cloned());
        }
    }
    nested
}

/// Order two version strings, by semver when both parse.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
