//! Dispatches a single request against the bundled demo application.
//!
//! ```text
//! switchyard-demo /blog/post/list
//! switchyard-demo /blog/post/show -p id=2
//! switchyard-demo -X POST /blog/post/create -d title=Hi -d body=Text
//! RUST_LOG=debug switchyard-demo /nowhere
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use switchyard::{App, Request, Response, SetupError};

mod helpers;
mod store;

#[path = "../app/modules/Default/controllers/IndexController.rs"]
mod index_controller;
#[path = "../app/modules/Blog/controllers/PostController.rs"]
mod post_controller;

use helpers::UrlHelper;
use index_controller::IndexController;
use store::PostStore;

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/app/app.yaml");

#[derive(Debug, Parser)]
#[command(name = "switchyard-demo", version, about = "Dispatch one request through the demo app")]
struct Cli {
    /// Request URI, e.g. /blog/post/show
    #[arg(default_value = "/")]
    uri: String,

    /// Application config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// GET parameter, repeatable
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// POST parameter, repeatable
    #[arg(short, long = "data", value_name = "KEY=VALUE", value_parser = parse_pair)]
    data: Vec<(String, String)>,

    /// Cookie, repeatable
    #[arg(short = 'b', long = "cookie", value_name = "NAME=VALUE", value_parser = parse_pair)]
    cookies: Vec<(String, String)>,

    /// SCRIPT_NAME the app is mounted under, e.g. /index.cgi
    #[arg(long)]
    script_name: Option<String>,

    /// Host header
    #[arg(long, default_value = "localhost")]
    host: String,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

fn build_app(config: &Path, base: &str) -> Result<App, SetupError> {
    App::builder()
        .config_file(config)
        .app_state(PostStore::seeded())
        .controller::<IndexController>(r"Default\IndexController")?
        .module_controller("blog", "post", post_controller::post_controller)?
        .plugin_instance("url", UrlHelper::new(base))?
        .on_response(|event| {
            let action = event.request().action_name().to_string();
            event.response_mut().set_header("X-Action", action);
            Ok(())
        })
        .build()
}

fn build_request(app: &App, cli: &Cli) -> Request {
    let mut builder = app
        .request_factory()
        .builder()
        .uri(cli.uri.as_str())
        .server_var("REQUEST_METHOD", cli.method.to_uppercase())
        .server_var("HTTP_HOST", cli.host.as_str());
    if let Some(script_name) = &cli.script_name {
        builder = builder.server_var("SCRIPT_NAME", script_name.as_str());
    }
    for (k, v) in &cli.params {
        builder = builder.get_param(k.as_str(), v.as_str());
    }
    for (k, v) in &cli.data {
        builder = builder.post_param(k.as_str(), v.as_str());
    }
    for (k, v) in &cli.cookies {
        builder = builder.cookie(k.as_str(), v.as_str());
    }
    builder.build()
}

fn print_response(response: &Response) {
    let status = response.status();
    println!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    for (name, value) in response.headers() {
        println!("{name}: {value}");
    }
    println!();
    println!("{}", response.body());
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let base = cli
        .script_name
        .as_deref()
        .and_then(|s| s.rsplit_once('/').map(|(dir, _)| dir.to_string()))
        .unwrap_or_default();

    let app = match build_app(&cli.config, &base) {
        Ok(app) => app,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("{app:?}");

    let mut request = build_request(&app, &cli);
    let response = app.respond(&mut request);
    print_response(&response);

    if response.status().is_server_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
