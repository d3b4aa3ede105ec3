//! Transitive runtime dependency closure.
//!
//! Breadth-first over compile and runtime scope, nearest declaration wins
//! per `group:name`. Node 0 of the walk is the root and is never returned.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use kiln_schema::{Coordinate, Repository, Version, VersionSpec};
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, RepositoryClient};
use crate::outcome::Resolution;
use crate::pom::{self, EffectivePom, MAX_PARENT_DEPTH, Pom};
use crate::registry::RepositoryRegistry;
use crate::versions::VersionResolver;

/// One node of the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub coordinate: Coordinate,
    pub depth: usize,
    /// Archive in the shared cache; `None` for descriptor-only nodes.
    pub path: Option<PathBuf>,
}

struct Pending {
    coordinate: Coordinate,
    version: Version,
    depth: usize,
    exclusions: Vec<(String, String)>,
}

/// Computes and downloads dependency closures into the shared cache.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    client: RepositoryClient,
    versions: VersionResolver,
    registry: Arc<RepositoryRegistry>,
}

impl DependencyResolver {
    /// `client` must be bound to the shared cache.
    pub fn new(client: RepositoryClient, registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            versions: VersionResolver::new(client.clone(), registry.clone()),
            client,
            registry,
        }
    }

    /// Installed paths of every dependency of `coordinate`, root excluded,
    /// in walk order. Empty when the root cannot be resolved.
    pub async fn dependencies(
        &self,
        coordinate: &Coordinate,
        repository: Option<&Repository>,
    ) -> Vec<PathBuf> {
        let Some(graph) = self
            .resolve_graph(coordinate, repository, &CancellationToken::new())
            .await
            .or_log(&format!("Dependencies of {coordinate}"))
        else {
            return Vec::new();
        };

        let root_path = graph.first().and_then(|n| n.path.clone());
        let mut seen = HashSet::new();
        graph
            .into_iter()
            .skip(1)
            .filter_map(|n| n.path)
            .filter(|p| Some(p) != root_path.as_ref() && seen.insert(p.clone()))
            .collect()
    }

    /// The resolved graph with the root at index 0.
    ///
    /// `cancel` is checked before each node; a cancelled walk returns the
    /// nodes resolved so far.
    pub async fn resolve_graph(
        &self,
        coordinate: &Coordinate,
        repository: Option<&Repository>,
        cancel: &CancellationToken,
    ) -> Resolution<Vec<GraphNode>> {
        let repositories = match repository {
            Some(r) => vec![r.clone()],
            None => self.registry.list(false),
        };

        let Some(root_version) = self.pin(coordinate, repository).await else {
            return Resolution::NotFound;
        };

        let mut visited = HashSet::from([coordinate.key()]);
        let mut queue = VecDeque::from([Pending {
            coordinate: coordinate.pinned(&root_version),
            version: root_version,
            depth: 0,
            exclusions: Vec::new(),
        }]);
        let mut graph = Vec::new();

        while let Some(node) = queue.pop_front() {
            if cancel.is_cancelled() {
                tracing::info!("Dependency walk of {coordinate} cancelled");
                break;
            }
            let is_root = node.depth == 0;

            let path = if node.coordinate.extension() == "pom" {
                None
            } else {
                match self.archive(&repositories, &node.coordinate, &node.version).await {
                    Resolution::Found(p) => Some(p),
                    other if is_root => {
                        return match other {
                            Resolution::Failed(e) => Resolution::Failed(e),
                            _ => Resolution::NotFound,
                        };
                    }
                    Resolution::Failed(e) => {
                        tracing::warn!("Skipping {}: {e}", node.coordinate);
                        continue;
                    }
                    _ => {
                        tracing::warn!("Skipping {}: not found", node.coordinate);
                        continue;
                    }
                }
            };

            let descriptor = match self
                .descriptor(&repositories, &node.coordinate, &node.version)
                .await
            {
                Resolution::Found(d) => Some(d),
                Resolution::NotFound => {
                    tracing::debug!("{} has no descriptor", node.coordinate);
                    None
                }
                Resolution::Failed(e) => {
                    tracing::warn!("Descriptor of {} unavailable: {e}", node.coordinate);
                    None
                }
            };

            if let Some(descriptor) = descriptor {
                for dep in &descriptor.dependencies {
                    if !dep.scope().is_transitive() || dep.optional {
                        continue;
                    }
                    if pom::is_excluded(&node.exclusions, &dep.group, &dep.artifact) {
                        tracing::debug!("{} excluded below {}", dep.key(), node.coordinate);
                        continue;
                    }
                    if !visited.insert(dep.key()) {
                        continue;
                    }

                    let requested = match dep.version.as_deref().map(str::parse::<VersionSpec>) {
                        Some(Ok(requested)) if !requested.to_string().contains("${") => requested,
                        _ => {
                            tracing::warn!("{} has no usable version, skipping", dep.key());
                            continue;
                        }
                    };
                    let mut child = Coordinate::new(&dep.group, &dep.artifact, requested);
                    if dep.kind != "jar" {
                        child = child.with_extension(&dep.kind);
                    }
                    if let Some(classifier) = &dep.classifier {
                        child = child.with_classifier(classifier);
                    }
                    if let Err(e) = child.check_segments() {
                        tracing::warn!("Skipping dependency of {}: {e}", node.coordinate);
                        continue;
                    }
                    let Some(version) = self.pin(&child, repository).await else {
                        tracing::warn!("No version of {child} available, skipping");
                        continue;
                    };

                    let mut exclusions = node.exclusions.clone();
                    exclusions.extend(dep.exclusions.iter().cloned());
                    queue.push_back(Pending {
                        coordinate: child.pinned(&version),
                        version,
                        depth: node.depth + 1,
                        exclusions,
                    });
                }
            }

            graph.push(GraphNode {
                coordinate: node.coordinate,
                depth: node.depth,
                path,
            });
        }

        Resolution::Found(graph)
    }

    async fn pin(&self, coordinate: &Coordinate, repository: Option<&Repository>) -> Option<Version> {
        match coordinate.version().exact() {
            Some(v) => Some(v.clone()),
            None => self
                .versions
                .find_latest(coordinate, repository)
                .await
                .map(|d| d.version),
        }
    }

    async fn archive(
        &self,
        repositories: &[Repository],
        coordinate: &Coordinate,
        version: &Version,
    ) -> Resolution<PathBuf> {
        let cache = self.client.cache();
        if let Some(path) = cache.find(coordinate, version) {
            return Resolution::Found(path);
        }
        let mut failure = None;
        for repository in repositories {
            match self.client.download(repository, coordinate, version, cache).await {
                Resolution::Found(p) => return Resolution::Found(p),
                Resolution::NotFound => {}
                Resolution::Failed(e) => failure = Some(e),
            }
        }
        failure.map_or(Resolution::NotFound, Resolution::Failed)
    }

    async fn read_descriptor(
        &self,
        repositories: &[Repository],
        group: &str,
        artifact: &str,
        version: &Version,
    ) -> Resolution<Pom> {
        let coordinate = Coordinate::new(group, artifact, VersionSpec::Exact(version.clone()))
            .with_extension("pom");
        let cache = self.client.cache();
        let path = match cache.find(&coordinate, version) {
            Some(p) => p,
            None => {
                let mut found = None;
                for repository in repositories {
                    match self
                        .client
                        .fetch_descriptor(repository, &coordinate, version, cache)
                        .await
                    {
                        Resolution::Found(p) => {
                            found = Some(p);
                            break;
                        }
                        Resolution::NotFound => {}
                        Resolution::Failed(e) => {
                            tracing::debug!("Descriptor {coordinate} from {}: {e}", repository.id);
                        }
                    }
                }
                match found {
                    Some(p) => p,
                    None => return Resolution::NotFound,
                }
            }
        };
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return Resolution::Failed(ClientError::from(e)),
        };
        match pom::parse(&text) {
            Ok(p) => Resolution::Found(p),
            Err(e) => {
                tracing::warn!("Unreadable descriptor {}: {e}", path.display());
                Resolution::NotFound
            }
        }
    }

    /// Descriptor of `coordinate` merged with up to [`MAX_PARENT_DEPTH`] parents.
    async fn descriptor(
        &self,
        repositories: &[Repository],
        coordinate: &Coordinate,
        version: &Version,
    ) -> Resolution<EffectivePom> {
        let pom = match self
            .read_descriptor(repositories, coordinate.group(), coordinate.name(), version)
            .await
        {
            Resolution::Found(p) => p,
            Resolution::NotFound => return Resolution::NotFound,
            Resolution::Failed(e) => return Resolution::Failed(e),
        };

        let mut chain = vec![pom];
        while chain.len() <= MAX_PARENT_DEPTH {
            let Some(parent) = chain.last().and_then(|p| p.parent.clone()) else {
                break;
            };
            match self
                .read_descriptor(
                    repositories,
                    &parent.group,
                    &parent.artifact,
                    &Version::new(&parent.version),
                )
                .await
            {
                Resolution::Found(p) => chain.push(p),
                _ => {
                    tracing::debug!(
                        "Parent {}:{}:{} unavailable",
                        parent.group,
                        parent.artifact,
                        parent.version
                    );
                    break;
                }
            }
        }

        match pom::effective(&chain) {
            Ok(effective) => Resolution::Found(effective),
            Err(e) => {
                tracing::warn!("Descriptor of {coordinate} incomplete: {e}");
                Resolution::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkSettings;
    use crate::layout::LocalRepository;
    use crate::registry::file_url;
    use kiln_schema::RepositoryKind;
    use std::path::Path;

    fn publish(root: &Path, group: &str, name: &str, version: &str, deps: &str) {
        let dir = root
            .join(group.replace('.', "/"))
            .join(name)
            .join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{name}-{version}.jar")), name).unwrap();
        std::fs::write(
            dir.join(format!("{name}-{version}.pom")),
            format!(
                "<project><groupId>{group}</groupId><artifactId>{name}</artifactId>\
                 <version>{version}</version><dependencies>{deps}</dependencies></project>"
            ),
        )
        .unwrap();
    }

    fn dep(group: &str, name: &str, version: &str, extra: &str) -> String {
        format!(
            "<dependency><groupId>{group}</groupId><artifactId>{name}</artifactId>\
             <version>{version}</version>{extra}</dependency>"
        )
    }

    fn resolver(cache: &Path) -> DependencyResolver {
        let client =
            RepositoryClient::new(LocalRepository::new(cache), &NetworkSettings::default()).unwrap();
        DependencyResolver::new(client, Arc::new(RepositoryRegistry::local_only(cache)))
    }

    #[tokio::test]
    async fn test_closure_excludes_root_and_honors_scopes() {
        let remote = tempfile::tempdir().unwrap();
        let root = remote.path();
        publish(
            root,
            "org.x",
            "y",
            "1.0",
            &[
                dep("org.lib", "core", "2.1", ""),
                dep("junit", "junit", "4.13", "<scope>test</scope>"),
                dep("org.opt", "extra", "1.0", "<optional>true</optional>"),
            ]
            .concat(),
        );
        publish(
            root,
            "org.lib",
            "core",
            "2.1",
            &[
                dep("org.lib", "util", "1.0", "<scope>runtime</scope>"),
                // Cycle back to the root
                dep("org.x", "y", "1.0", ""),
            ]
            .concat(),
        );
        publish(root, "org.lib", "util", "1.0", "");
        publish(root, "junit", "junit", "4.13", "");

        let cache = tempfile::tempdir().unwrap();
        let resolver = resolver(cache.path());
        let repo = Repository::new("files", RepositoryKind::EnterpriseRegistry, file_url(root));
        let coordinate: Coordinate = "org.x:y:1.0".parse().unwrap();

        let paths = resolver.dependencies(&coordinate, Some(&repo)).await;
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["core-2.1.jar", "util-1.0.jar"]);
        assert!(paths.iter().all(|p| p.starts_with(cache.path())));
        assert!(!paths.iter().any(|p| p.ends_with("y-1.0.jar")));
    }

    #[tokio::test]
    async fn test_exclusions_and_nearest_wins() {
        let remote = tempfile::tempdir().unwrap();
        let root = remote.path();
        publish(
            root,
            "org.x",
            "y",
            "1.0",
            &[
                dep(
                    "org.lib",
                    "core",
                    "2.1",
                    "<exclusions><exclusion><groupId>org.noise</groupId>\
                     <artifactId>*</artifactId></exclusion></exclusions>",
                ),
                dep("org.lib", "util", "2.0", ""),
            ]
            .concat(),
        );
        publish(
            root,
            "org.lib",
            "core",
            "2.1",
            &[dep("org.noise", "log", "1.0", ""), dep("org.lib", "util", "1.0", "")].concat(),
        );
        publish(root, "org.lib", "util", "1.0", "");
        publish(root, "org.lib", "util", "2.0", "");
        publish(root, "org.noise", "log", "1.0", "");

        let cache = tempfile::tempdir().unwrap();
        let repo = Repository::new("files", RepositoryKind::EnterpriseRegistry, file_url(root));
        let graph = resolver(cache.path())
            .resolve_graph(&"org.x:y:1.0".parse().unwrap(), Some(&repo), &CancellationToken::new())
            .await
            .found()
            .unwrap();
        let coords: Vec<_> = graph.iter().map(|n| n.coordinate.to_string()).collect();
        assert_eq!(coords, ["org.x:y:1.0", "org.lib:core:2.1", "org.lib:util:2.0"]);
    }

    #[tokio::test]
    async fn test_declared_paths_stay_inside_cache() {
        let base = tempfile::tempdir().unwrap();
        let remote = base.path().join("remote");
        publish(
            &remote,
            "org.x",
            "y",
            "1.0",
            &[
                dep("g", "../../../esc", "1.0", ""),
                dep("g", "ok", "../../1.0", ""),
                dep("g", "ok", "1.0", "<classifier>../up</classifier>"),
                dep("org.lib", "core", "2.1", ""),
            ]
            .concat(),
        );
        publish(&remote, "org.lib", "core", "2.1", "");

        let cache = base.path().join("a/b/cache");
        let repo = Repository::new("files", RepositoryKind::EnterpriseRegistry, file_url(&remote));
        let paths = resolver(&cache)
            .dependencies(&"org.x:y:1.0".parse().unwrap(), Some(&repo))
            .await;
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("core-2.1.jar"));
        assert!(paths.iter().all(|p| p.starts_with(&cache)));
        assert!(!base.path().join("esc-1.0.jar").exists());
        assert!(!base.path().join("a/esc").exists());
    }

    #[tokio::test]
    async fn test_unresolvable_root_is_empty() {
        let remote = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let repo = Repository::new(
            "files",
            RepositoryKind::EnterpriseRegistry,
            file_url(remote.path()),
        );
        let resolver = resolver(cache.path());
        let coordinate: Coordinate = "org.x:missing:1.0".parse().unwrap();
        assert!(resolver.dependencies(&coordinate, Some(&repo)).await.is_empty());
        assert!(
            resolver
                .resolve_graph(&coordinate, Some(&repo), &CancellationToken::new())
                .await
                .is_not_found()
        );
    }
}
