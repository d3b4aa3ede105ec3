//! Minimal package descriptor (POM) reader.
//!
//! Reads coordinates, the parent reference, properties, dependencies and
//! managed dependency versions. Parent descriptors are merged by
//! [`effective`], child values winning.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Deepest parent chain followed.
pub const MAX_PARENT_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum PomError {
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Descriptor has no {0}")]
    Missing(&'static str),
}

/// Dependency scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
    Import,
}

impl Scope {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "runtime" => Self::Runtime,
            "provided" => Self::Provided,
            "test" => Self::Test,
            "system" => Self::System,
            "import" => Self::Import,
            _ => Self::Compile,
        }
    }

    /// Whether the scope is part of the runtime closure.
    pub fn is_transitive(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }
}

/// Reference to a parent descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

/// One declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    /// Archive type (`jar`, `pom`, ...).
    pub kind: String,
    pub classifier: Option<String>,
    /// Declared scope; `None` inherits from management or defaults to compile.
    pub scope: Option<Scope>,
    pub optional: bool,
    /// `(group, artifact)` pairs; either may be `*`.
    pub exclusions: Vec<(String, String)>,
}

impl Dependency {
    /// `group:artifact`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    /// Effective scope.
    pub fn scope(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    fn management_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group,
            self.artifact,
            self.kind,
            self.classifier.as_deref().unwrap_or("")
        )
    }
}

/// Whether `(group, artifact)` matches any `(group, artifact)` exclusion;
/// `*` matches anything.
pub fn is_excluded(exclusions: &[(String, String)], group: &str, artifact: &str) -> bool {
    exclusions
        .iter()
        .any(|(g, a)| (g == "*" || g == group) && (a == "*" || a == artifact))
}

/// A parsed descriptor, before inheritance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pom {
    pub group: Option<String>,
    pub artifact: String,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub managed: Vec<Dependency>,
}

/// Text of a single `<tag>value</tag>` element.
struct Field(Regex);

impl Field {
    fn new(tag: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!(r"<{tag}>\s*([^<]*?)\s*</{tag}>")).map(Self)
    }

    fn get(&self, xml: &str) -> Option<String> {
        self.0
            .captures(xml)
            .map(|c| c[1].to_string())
            .filter(|s| !s.is_empty())
    }
}

struct Patterns {
    comment: Regex,
    parent: Regex,
    management: Regex,
    noise: Vec<Regex>,
    properties: Regex,
    property: Regex,
    dependencies: Regex,
    dependency: Regex,
    exclusions: Regex,
    exclusion: Regex,
    group_id: Field,
    artifact_id: Field,
    version: Field,
    kind: Field,
    classifier: Field,
    scope: Field,
    optional: Field,
    packaging: Field,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        let block = |tag: &str| Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>"));
        Ok(Self {
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            parent: block("parent")?,
            management: block("dependencyManagement")?,
            noise: vec![
                block("build")?,
                block("profiles")?,
                block("reporting")?,
                block("pluginRepositories")?,
            ],
            properties: block("properties")?,
            property: Regex::new(r"<([A-Za-z0-9_.\-]+)>\s*([^<]*?)\s*</([A-Za-z0-9_.\-]+)>")?,
            dependencies: block("dependencies")?,
            dependency: block("dependency")?,
            exclusions: block("exclusions")?,
            exclusion: block("exclusion")?,
            group_id: Field::new("groupId")?,
            artifact_id: Field::new("artifactId")?,
            version: Field::new("version")?,
            kind: Field::new("type")?,
            classifier: Field::new("classifier")?,
            scope: Field::new("scope")?,
            optional: Field::new("optional")?,
            packaging: Field::new("packaging")?,
        })
    }

    /// Compiled once per process.
    fn get() -> Result<&'static Self, regex::Error> {
        if let Some(p) = PATTERNS.get() {
            return Ok(p);
        }
        let p = Self::new()?;
        Ok(PATTERNS.get_or_init(|| p))
    }
}

fn parse_dependencies(p: &Patterns, block: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for caps in p.dependency.captures_iter(block) {
        let body = &caps[1];
        let mut exclusions = Vec::new();
        if let Some(ex) = p.exclusions.captures(body) {
            for e in p.exclusion.captures_iter(&ex[1]) {
                if let (Some(g), Some(a)) = (p.group_id.get(&e[1]), p.artifact_id.get(&e[1])) {
                    exclusions.push((g, a));
                }
            }
        }
        let body = p.exclusions.replace_all(body, "");

        let (Some(group), Some(artifact)) = (p.group_id.get(&body), p.artifact_id.get(&body)) else {
            tracing::debug!("Skipping dependency without coordinates");
            continue;
        };
        deps.push(Dependency {
            group,
            artifact,
            version: p.version.get(&body),
            kind: p.kind.get(&body).unwrap_or_else(|| "jar".to_string()),
            classifier: p.classifier.get(&body),
            scope: p.scope.get(&body).map(|s| Scope::parse(&s)),
            optional: p.optional.get(&body).is_some_and(|s| s == "true"),
            exclusions,
        });
    }
    deps
}

/// Parse one descriptor.
///
/// # Errors
///
/// Returns [`PomError::Missing`] if the descriptor has no `artifactId`.
pub fn parse(xml: &str) -> Result<Pom, PomError> {
    let p = Patterns::get()?;
    let xml = p.comment.replace_all(xml, "");

    let parent = match p.parent.captures(&xml) {
        Some(c) => match (
            p.group_id.get(&c[1]),
            p.artifact_id.get(&c[1]),
            p.version.get(&c[1]),
        ) {
            (Some(group), Some(artifact), Some(version)) => Some(ParentRef {
                group,
                artifact,
                version,
            }),
            _ => None,
        },
        None => None,
    };

    let managed = match p.management.captures(&xml) {
        Some(c) => parse_dependencies(p, &c[1]),
        None => Vec::new(),
    };

    let mut body = p.parent.replace_all(&xml, "").into_owned();
    body = p.management.replace_all(&body, "").into_owned();
    for re in &p.noise {
        body = re.replace_all(&body, "").into_owned();
    }

    let mut properties = BTreeMap::new();
    if let Some(c) = p.properties.captures(&body) {
        for prop in p.property.captures_iter(&c[1]) {
            if prop[1] == prop[3] {
                properties.insert(prop[1].to_string(), prop[2].to_string());
            }
        }
    }
    body = p.properties.replace_all(&body, "").into_owned();

    let dependencies = match p.dependencies.captures(&body) {
        Some(c) => parse_dependencies(p, &c[1]),
        None => Vec::new(),
    };
    body = p.dependencies.replace_all(&body, "").into_owned();

    Ok(Pom {
        group: p.group_id.get(&body),
        artifact: p.artifact_id.get(&body).ok_or(PomError::Missing("artifactId"))?,
        version: p.version.get(&body),
        packaging: p.packaging.get(&body),
        parent,
        properties,
        dependencies,
        managed,
    })
}

/// A descriptor with parents merged and `${...}` references expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePom {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub properties: BTreeMap<String, String>,
    /// Declared plus inherited dependencies, versions and scopes filled in.
    pub dependencies: Vec<Dependency>,
}

/// Expand `${name}` references from `props`. Unknown references are kept.
pub fn interpolate(value: &str, props: &BTreeMap<String, String>) -> String {
    let mut out = value.to_string();
    // Bounded so self-referencing properties terminate.
    for _ in 0..MAX_PARENT_DEPTH {
        let mut changed = false;
        let mut next = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(start) = rest.find("${") {
            next.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match props.get(key) {
                        Some(v) => {
                            next.push_str(v);
                            changed = true;
                        }
                        None => {
                            next.push_str("${");
                            next.push_str(key);
                            next.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    next.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        next.push_str(rest);
        out = next;
        if !changed {
            break;
        }
    }
    out
}

fn expand(dep: &Dependency, props: &BTreeMap<String, String>) -> Dependency {
    Dependency {
        group: interpolate(&dep.group, props),
        artifact: interpolate(&dep.artifact, props),
        version: dep.version.as_deref().map(|v| interpolate(v, props)),
        kind: interpolate(&dep.kind, props),
        classifier: dep.classifier.as_deref().map(|c| interpolate(c, props)),
        scope: dep.scope,
        optional: dep.optional,
        exclusions: dep.exclusions.clone(),
    }
}

/// Merge a descriptor with its parents. `chain[0]` is the descriptor
/// itself, each following entry the parent of the previous one.
///
/// # Errors
///
/// Returns [`PomError::Missing`] if no group or version can be determined.
pub fn effective(chain: &[Pom]) -> Result<EffectivePom, PomError> {
    let pom = chain.first().ok_or(PomError::Missing("descriptor"))?;

    let group = chain
        .iter()
        .find_map(|p| p.group.clone().or_else(|| p.parent.as_ref().map(|r| r.group.clone())))
        .ok_or(PomError::Missing("groupId"))?;
    let version = chain
        .iter()
        .find_map(|p| p.version.clone().or_else(|| p.parent.as_ref().map(|r| r.version.clone())))
        .ok_or(PomError::Missing("version"))?;

    let mut props = BTreeMap::new();
    for p in chain.iter().rev() {
        props.extend(p.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    for prefix in ["project", "pom"] {
        props.insert(format!("{prefix}.groupId"), group.clone());
        props.insert(format!("{prefix}.artifactId"), pom.artifact.clone());
        props.insert(format!("{prefix}.version"), version.clone());
    }
    if let Some(parent) = &pom.parent {
        props.insert("project.parent.groupId".into(), parent.group.clone());
        props.insert("project.parent.artifactId".into(), parent.artifact.clone());
        props.insert("project.parent.version".into(), parent.version.clone());
    }
    let version = interpolate(&version, &props);
    let group = interpolate(&group, &props);

    let mut managed: BTreeMap<String, Dependency> = BTreeMap::new();
    for p in chain {
        for m in &p.managed {
            if m.scope == Some(Scope::Import) {
                tracing::debug!("Ignoring imported dependency management {}", m.key());
                continue;
            }
            let m = expand(m, &props);
            managed.entry(m.management_key()).or_insert(m);
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut dependencies = Vec::new();
    for p in chain {
        for d in &p.dependencies {
            let mut d = expand(d, &props);
            if !seen.insert(d.management_key()) {
                continue;
            }
            if let Some(m) = managed.get(&d.management_key()) {
                if d.version.is_none() {
                    d.version.clone_from(&m.version);
                }
                if d.scope.is_none() {
                    d.scope = m.scope;
                }
                if d.exclusions.is_empty() {
                    d.exclusions.clone_from(&m.exclusions);
                }
            }
            dependencies.push(d);
        }
    }

    Ok(EffectivePom {
        group,
        artifact: pom.artifact.clone(),
        version,
        properties: props,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: &str = r#"<project>
  <groupId>org.x</groupId>
  <artifactId>parent</artifactId>
  <version>5</version>
  <packaging>pom</packaging>
  <properties>
    <lib.version>2.1</lib.version>
    <shared>from-parent</shared>
  </properties>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>org.lib</groupId>
        <artifactId>core</artifactId>
        <version>${lib.version}</version>
        <scope>runtime</scope>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>"#;

    const CHILD: &str = r#"<?xml version="1.0"?>
<project>
  <parent>
    <groupId>org.x</groupId>
    <artifactId>parent</artifactId>
    <version>5</version>
  </parent>
  <artifactId>y</artifactId>
  <version>3.2</version>
  <properties>
    <shared>from-child</shared>
  </properties>
  <!-- <dependencies><dependency><groupId>commented</groupId></dependency></dependencies> -->
  <dependencies>
    <dependency>
      <groupId>org.lib</groupId>
      <artifactId>core</artifactId>
      <exclusions>
        <exclusion>
          <groupId>org.noise</groupId>
          <artifactId>*</artifactId>
        </exclusion>
      </exclusions>
    </dependency>
    <dependency>
      <groupId>${project.groupId}</groupId>
      <artifactId>y-api</artifactId>
      <version>${project.version}</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
  <build>
    <plugins><plugin><groupId>org.apache</groupId><artifactId>plugin</artifactId></plugin></plugins>
  </build>
</project>"#;

    #[test]
    fn test_parse_child() {
        let pom = parse(CHILD).unwrap();
        assert_eq!(pom.group, None);
        assert_eq!(pom.artifact, "y");
        assert_eq!(pom.version.as_deref(), Some("3.2"));
        assert_eq!(pom.parent.as_ref().unwrap().artifact, "parent");
        assert_eq!(pom.dependencies.len(), 3);
        let exclusions = &pom.dependencies[0].exclusions;
        assert!(is_excluded(exclusions, "org.noise", "anything"));
        assert!(!is_excluded(exclusions, "org.other", "anything"));
        assert_eq!(pom.dependencies[2].scope(), Scope::Test);
    }

    #[test]
    fn test_effective_inherits_and_interpolates() {
        let chain = [parse(CHILD).unwrap(), parse(PARENT).unwrap()];
        let eff = effective(&chain).unwrap();

        assert_eq!(eff.group, "org.x");
        assert_eq!(eff.version, "3.2");
        assert_eq!(eff.properties["shared"], "from-child");

        let core = &eff.dependencies[0];
        assert_eq!(core.version.as_deref(), Some("2.1"));
        assert_eq!(core.scope(), Scope::Runtime);
        // Declared exclusions are kept over managed ones
        assert_eq!(core.exclusions.len(), 1);

        let api = &eff.dependencies[1];
        assert_eq!(api.group, "org.x");
        assert_eq!(api.version.as_deref(), Some("3.2"));
    }

    #[test]
    fn test_interpolate_unknown_and_recursive() {
        let mut props = BTreeMap::new();
        props.insert("a".to_string(), "${b}".to_string());
        props.insert("b".to_string(), "1.0".to_string());
        props.insert("loop".to_string(), "${loop}".to_string());
        assert_eq!(interpolate("v${a}-${missing}", &props), "v1.0-${missing}");
        assert_eq!(interpolate("${loop}", &props), "${loop}");
        assert_eq!(interpolate("${unterminated", &props), "${unterminated");
    }

    #[test]
    fn test_patterns_compiled_once() {
        parse(CHILD).unwrap();
        parse(PARENT).unwrap();
        assert!(std::ptr::eq(Patterns::get().unwrap(), Patterns::get().unwrap()));
        let field = Field::new("version").unwrap();
        assert_eq!(field.get("<version> 1.0 </version>").as_deref(), Some("1.0"));
        assert_eq!(field.get("<version></version>"), None);
    }

    #[test]
    fn test_missing_artifact_id() {
        assert!(matches!(
            parse("<project><groupId>g</groupId></project>"),
            Err(PomError::Missing("artifactId"))
        ));
    }
}
