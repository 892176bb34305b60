use anyhow::{bail, Result};
use std::{
    env,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Ensure a container runtime socket is available for testcontainers.
///
/// testcontainers talks to the Docker API; when `DOCKER_HOST` is unset we
/// probe the usual Docker and Podman socket locations and point
/// `DOCKER_HOST` at the first one that accepts connections.
///
/// # Errors
/// Returns an error if no Docker/Podman socket can be found or configured.
pub fn ensure_container_runtime() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match INIT.get_or_init(init_container_runtime) {
        Ok(()) => Ok(()),
        Err(message) => bail!("{message}"),
    }
}

fn init_container_runtime() -> Result<(), String> {
    if let Ok(docker_host) = env::var("DOCKER_HOST") {
        return validate_docker_host(&docker_host);
    }

    if socket_connectable(Path::new("/var/run/docker.sock")) {
        return Ok(());
    }

    if let Some(path) = find_podman_socket() {
        if socket_connectable(&path) {
            env::set_var("DOCKER_HOST", format!("unix://{}", path.display()));
            return Ok(());
        }
        return Err(format!(
            "Podman socket found at `{}`, but it is not accepting connections. Start `podman.socket` or run `podman system service`.",
            path.display()
        ));
    }

    Err(
        "No container runtime socket found. Start the Docker daemon, `podman.socket`, or set `DOCKER_HOST` (for example: unix:///run/user/<uid>/podman/podman.sock)."
            .to_string(),
    )
}

fn validate_docker_host(docker_host: &str) -> Result<(), String> {
    let path = docker_host
        .strip_prefix("unix://")
        .or_else(|| docker_host.starts_with('/').then_some(docker_host));
    // Non-socket schemes (tcp://...) are left to testcontainers to validate.
    let Some(path) = path else {
        return Ok(());
    };
    if socket_connectable(Path::new(path)) {
        return Ok(());
    }
    Err(format!(
        "`DOCKER_HOST` points to `{docker_host}`, but the socket is not accepting connections."
    ))
}

fn find_podman_socket() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime_dir).join("podman/podman.sock"));
    }
    candidates.push(PathBuf::from("/var/run/podman/podman.sock"));
    candidates.push(PathBuf::from("/run/podman/podman.sock"));

    candidates.into_iter().find(|path| path.exists())
}

fn socket_connectable(path: &Path) -> bool {
    path.exists() && UnixStream::connect(path).is_ok()
}
