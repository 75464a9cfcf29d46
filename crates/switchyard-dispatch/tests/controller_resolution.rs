use std::fs;

use switchyard_dispatch::{
    ActionController, ControllerRegistry, HttpKernel, KernelConfig, KernelError, Request,
    Response, RouteError,
};

struct Fixture {
    dir: tempfile::TempDir,
    kernel: HttpKernel,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let layout: [(&str, &[&str]); 3] = [
        ("Default", &["Index"]),
        ("Test", &["Default"]),
        ("News", &["Index"]),
    ];
    for (module, controllers) in layout {
        let path = dir.path().join("modules").join(module).join("controllers");
        fs::create_dir_all(&path).unwrap();
        for controller in controllers {
            fs::write(path.join(format!("{controller}Controller.rs")), "").unwrap();
        }
    }
    let config = KernelConfig::from_yaml(
        r"
modules: [Default, Test, Blog]
",
    )
    .unwrap()
    .with_root(dir.path());

    let controllers = ControllerRegistry::new().register_factory(r"Test\DefaultController", || {
        Ok(Box::new(ActionController::new().action("show-item", |req, _| {
            let id = req.param_str("id").unwrap_or_default();
            Ok(Some(Response::text(format!("item {id}"))))
        })))
    });
    let kernel = HttpKernel::new(config, controllers).with_segment_router();
    Fixture { dir, kernel }
}

#[test]
fn test_controller_path() {
    let fx = fixture();
    let path = fx.kernel.controller_path("Test", "Default").unwrap();
    assert_eq!(path, fx.dir.path().join("modules/Test/controllers"));
}

#[test]
fn test_not_existing_module() {
    let fx = fixture();
    assert!(matches!(
        fx.kernel.controller_path("Blog", "Index"),
        Err(KernelError::ControllerPathNotFound { .. })
    ));
}

#[test]
fn test_not_existing_controller() {
    let fx = fixture();
    assert!(matches!(
        fx.kernel.controller_path("Default", "Blog"),
        Err(KernelError::ControllerFileNotFound { .. })
    ));
}

#[test]
fn test_not_defined_module() {
    let fx = fixture();
    let err = fx.kernel.controller_path("News", "Index").unwrap_err();
    assert!(matches!(err, KernelError::UnknownModule(_)));
    assert!(err.is_not_found());
}

#[test]
fn test_class_name_uses_pattern() {
    let fx = fixture();
    assert_eq!(
        fx.kernel.controller_class_name("tESt", "conTroller--Test"),
        r"\Test\ControllerTestController"
    );
}

#[test]
fn test_handle_segment_route() {
    let fx = fixture();
    let mut request = fx
        .kernel
        .request_factory()
        .builder()
        .uri("/test/default/show-item/id/4?ignored=1")
        .build();

    let response = fx.kernel.handle(&mut request).unwrap();
    assert_eq!(response.body(), "item 4");
    assert_eq!(request.module_name(), "test");
    assert!(!request.has_param("ignored"));
}

#[test]
fn test_handle_odd_segments() {
    let fx = fixture();
    let mut request: Request = fx
        .kernel
        .request_factory()
        .builder()
        .uri("/test/default/show-item/id")
        .build();

    let err = fx.kernel.handle(&mut request).unwrap_err();
    assert!(matches!(err, KernelError::Route(RouteError::Invalid { .. })));
    assert!(err.is_not_found());
}
