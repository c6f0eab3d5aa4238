use {super::*, std::os::unix::net::UnixListener, tempfile::tempdir};

/// `XDG_RUNTIME_DIR`/`WAYLAND_DISPLAY` are process-global state, so these tests
/// serialize on a mutex to avoid stomping on each other when run concurrently.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[test]
fn connect_upstream_fails_without_xdg_runtime_dir() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe { env::remove_var("XDG_RUNTIME_DIR") };
    unsafe { env::remove_var("WAYLAND_DISPLAY") };
    assert!(matches!(
        Endpoint::connect_upstream(),
        Err(EndpointError::EnvNotSet("XDG_RUNTIME_DIR"))
    ));
}

#[test]
fn connect_upstream_fails_without_wayland_display() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempdir().unwrap();
    unsafe { env::set_var("XDG_RUNTIME_DIR", dir.path()) };
    unsafe { env::remove_var("WAYLAND_DISPLAY") };
    assert!(matches!(
        Endpoint::connect_upstream(),
        Err(EndpointError::EnvNotSet("WAYLAND_DISPLAY"))
    ));
}

#[test]
fn connect_upstream_dials_the_named_compositor_socket() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("wayland-0");
    let listener = UnixListener::bind(&socket_path).unwrap();

    unsafe { env::set_var("XDG_RUNTIME_DIR", dir.path()) };
    unsafe { env::set_var("WAYLAND_DISPLAY", "wayland-0") };

    let endpoint = Endpoint::connect_upstream().unwrap();
    assert!(listener.accept().is_ok());
    drop(endpoint);
}
