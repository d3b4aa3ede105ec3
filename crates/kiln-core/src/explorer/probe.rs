//! Instantiation probes.
//!
//! An [`Instantiator`] decides, for one type inside a [`LoadingContext`],
//! whether an instance can be constructed and what kind it would be.

use std::collections::HashSet;

use thiserror::Error;

use super::context::LoadingContext;
use crate::config::ExplorerSettings;

/// What an instantiated type turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Visual,
    Other,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("{0} is not public")]
    NotPublic(String),

    #[error("{0} is abstract, an interface, an enum or an annotation")]
    NotConcrete(String),

    #[error("{0} has no public no-argument constructor")]
    NoDefaultConstructor(String),

    #[error("{type_name}: supertype {missing} cannot be resolved")]
    Unresolved { type_name: String, missing: String },

    #[error("{type_name}: circular supertype chain")]
    Circular { type_name: String },

    #[error("Cannot load {type_name}: {cause}")]
    Load { type_name: String, cause: String },
}

/// Constructs instances of types inside an isolated context.
pub trait Instantiator: Send + Sync {
    /// Try to construct `type_name` from `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the reason construction failed.
    fn instantiate(&self, ctx: &LoadingContext, type_name: &str)
    -> Result<InstanceKind, ProbeFailure>;
}

/// Default probe working from class-file headers.
///
/// A type constructs when it is a public concrete class with a public
/// no-argument constructor and its superclass chain resolves. Platform
/// packages resolve implicitly.
#[derive(Debug, Clone)]
pub struct ClassFileProbe {
    visual_types: Vec<String>,
    platform_prefixes: Vec<String>,
}

impl ClassFileProbe {
    pub fn new(visual_types: Vec<String>) -> Self {
        Self {
            visual_types,
            platform_prefixes: ["java.", "javax.", "javafx.", "jdk."]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    pub fn from_settings(settings: &ExplorerSettings) -> Self {
        Self::new(settings.visual_types.clone())
    }

    /// Type names ending in `.` match a whole package tree.
    fn is_visual(&self, type_name: &str) -> bool {
        self.visual_types.iter().any(|v| {
            if v.ends_with('.') {
                type_name.starts_with(v.as_str())
            } else {
                type_name == v
            }
        })
    }

    fn is_platform(&self, type_name: &str) -> bool {
        self.platform_prefixes
            .iter()
            .any(|p| type_name.starts_with(p.as_str()))
    }
}

impl Instantiator for ClassFileProbe {
    fn instantiate(
        &self,
        ctx: &LoadingContext,
        type_name: &str,
    ) -> Result<InstanceKind, ProbeFailure> {
        let load_failure = |name: &str, cause: String| ProbeFailure::Load {
            type_name: name.to_string(),
            cause,
        };

        let class = ctx
            .load(type_name)
            .map_err(|e| load_failure(type_name, e.to_string()))?;
        if !class.is_public() {
            return Err(ProbeFailure::NotPublic(type_name.to_string()));
        }
        if !class.is_concrete() {
            return Err(ProbeFailure::NotConcrete(type_name.to_string()));
        }
        if !class.has_public_no_arg_constructor() {
            return Err(ProbeFailure::NoDefaultConstructor(type_name.to_string()));
        }

        let mut seen = HashSet::from([type_name.to_string()]);
        let mut visual = self.is_visual(type_name);
        let mut next = class.super_name.clone();

        while let Some(current) = next {
            if self.is_visual(&current) {
                visual = true;
            }
            // Platform types are never walked further.
            if self.is_platform(&current) {
                break;
            }
            if !seen.insert(current.clone()) {
                return Err(ProbeFailure::Circular {
                    type_name: type_name.to_string(),
                });
            }
            if !ctx.contains(&current) {
                return Err(ProbeFailure::Unresolved {
                    type_name: type_name.to_string(),
                    missing: current,
                });
            }
            let parent = ctx
                .load(&current)
                .map_err(|e| load_failure(&current, e.to_string()))?;
            next = parent.super_name.clone();
        }

        Ok(if visual {
            InstanceKind::Visual
        } else {
            InstanceKind::Other
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::classfile::testing::ClassFixture;
    use crate::explorer::classfile::{ACC_ABSTRACT, ACC_PUBLIC};
    use crate::explorer::context::testing::write_dir;

    fn probe() -> ClassFileProbe {
        ClassFileProbe::from_settings(&ExplorerSettings::default())
    }

    #[test]
    fn test_classifies_through_local_supertypes() {
        let dir = tempfile::tempdir().unwrap();
        write_dir(
            dir.path(),
            &[
                ClassFixture::public("com.acme.Gauge", "com.acme.BaseControl"),
                ClassFixture::public("com.acme.BaseControl", "javafx.scene.control.Control"),
                ClassFixture::public("com.acme.Util", "java.lang.Object"),
            ],
        );
        let ctx = LoadingContext::open(&[dir.path().to_path_buf()]);
        let probe = probe();
        assert_eq!(probe.instantiate(&ctx, "com.acme.Gauge"), Ok(InstanceKind::Visual));
        assert_eq!(probe.instantiate(&ctx, "com.acme.Util"), Ok(InstanceKind::Other));
    }

    #[test]
    fn test_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_dir(
            dir.path(),
            &[
                ClassFixture::public("a.Orphan", "b.Missing"),
                ClassFixture {
                    access: ACC_PUBLIC | ACC_ABSTRACT,
                    ..ClassFixture::public("a.Shape", "java.lang.Object")
                },
                ClassFixture {
                    constructor: None,
                    ..ClassFixture::public("a.Builder", "java.lang.Object")
                },
                ClassFixture {
                    access: 0,
                    ..ClassFixture::public("a.Hidden", "java.lang.Object")
                },
                ClassFixture::public("a.Ping", "a.Pong"),
                ClassFixture::public("a.Pong", "a.Ping"),
            ],
        );
        let ctx = LoadingContext::open(&[dir.path().to_path_buf()]);
        let probe = probe();

        assert!(matches!(
            probe.instantiate(&ctx, "a.Orphan"),
            Err(ProbeFailure::Unresolved { missing, .. }) if missing == "b.Missing"
        ));
        assert!(matches!(probe.instantiate(&ctx, "a.Shape"), Err(ProbeFailure::NotConcrete(_))));
        assert!(matches!(
            probe.instantiate(&ctx, "a.Builder"),
            Err(ProbeFailure::NoDefaultConstructor(_))
        ));
        assert!(matches!(probe.instantiate(&ctx, "a.Hidden"), Err(ProbeFailure::NotPublic(_))));
        assert!(matches!(probe.instantiate(&ctx, "a.Ping"), Err(ProbeFailure::Circular { .. })));
        assert!(matches!(probe.instantiate(&ctx, "a.Nope"), Err(ProbeFailure::Load { .. })));
    }

    #[test]
    fn test_exact_and_package_visual_types() {
        let probe = ClassFileProbe::new(vec!["javafx.scene.Node".into(), "javafx.scene.shape.".into()]);
        assert!(probe.is_visual("javafx.scene.Node"));
        assert!(!probe.is_visual("javafx.scene.NodeHelper"));
        assert!(probe.is_visual("javafx.scene.shape.Circle"));
    }
}
