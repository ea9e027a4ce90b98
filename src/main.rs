#[macro_use]
extern crate log;

use cookies_manager::prelude::*;
use http::header::{HeaderName, COOKIE, SET_COOKIE};
use hyper::Response;
use std::{env, path::Path};

const DEFAULT_CONFIG_PATH: &str = "cookies.json";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

// Downstream answering with the cookie headers it received.
async fn echo(req: Request<Body>) -> Response<Body> {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    Response::new(Body::from(format!("Cookie: {}\nSet-Cookie: {}\n", header(COOKIE), header(SET_COOKIE))))
}

fn load_config(path: &str) -> Result<Config, FilterError> {
    if Path::new(path).exists() {
        Config::load(path)
    } else {
        warn!("Config file {} not found, running with an empty rule set", path);
        Ok(Config::default())
    }
}

fn main() -> Result<(), FilterError> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let listen_addr = args.next().unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

    let config = load_config(&config_path)?;
    let server = Server::builder()
        .configure_listener(|l| l.interface(&listen_addr))
        .filter(CookieFilter::new(config, "cookies-manager"))
        .build();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.run(echo))
}
