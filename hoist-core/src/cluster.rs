//! Cluster locality.
//!
//! A local cluster runs its nodes against the build host's image store, so
//! freshly built images are visible to it without a registry round trip.

/// Context name of a default minikube cluster.
pub const MINIKUBE_CONTEXT: &str = "minikube";

/// Context name of the Kubernetes cluster bundled with Docker Desktop.
pub const DOCKER_DESKTOP_CONTEXT: &str = "docker-desktop";

/// Context name used by older Docker Desktop releases.
pub const DOCKER_FOR_DESKTOP_CONTEXT: &str = "docker-for-desktop";

/// Context name of a single-node development cluster.
pub const LOCAL_DEV_CONTEXT: &str = "local-dev";

/// Contexts known to share image storage with the build host.
pub const LOCAL_CONTEXTS: &[&str] =
    &[MINIKUBE_CONTEXT, DOCKER_DESKTOP_CONTEXT, DOCKER_FOR_DESKTOP_CONTEXT, LOCAL_DEV_CONTEXT];

/// Whether `context` names a cluster sharing the build host's image store.
///
/// Unknown contexts are treated as remote, so images get pushed.
pub fn is_local_cluster(context: &str) -> bool {
    LOCAL_CONTEXTS.contains(&context)
}
