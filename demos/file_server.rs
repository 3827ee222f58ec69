//! A small sample server that exposes a directory of static files through a single webmachine
//! resource, exercising the byte-range output handler, the file-sink input handler and the MIME
//! lookup table end to end. Run with `cargo run --bin file-server [bind-addr] [serve-dir]`;
//! defaults to `0.0.0.0:8080` serving `./public`.

#[macro_use]
extern crate log;

#[macro_use]
extern crate maplit;

use std::convert::Infallible;
use std::env;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Utc};
use hyper::server::Server;
use hyper::service::make_service_fn;

use webmachine::input_handler::{path_for_url, write_file_body};
use webmachine::mime::mime_type_for_path;
use webmachine::{callback, Dispatcher, Resource};

fn serve_dir() -> PathBuf {
    env::args()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./public"))
}

fn last_modified_of(path: &std::path::Path) -> Option<DateTime<FixedOffset>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch: DateTime<Utc> = modified.into();
    Some(since_epoch.with_timezone(&FixedOffset::east(0)))
}

fn file_resource() -> Resource<'static> {
    Resource {
        allowed_methods: vec!["OPTIONS", "GET", "HEAD", "PUT"],
        accept_ranges: true,
        resource_exists: callback(&|context, _| {
            let path = serve_dir().join(context.request.request_path.trim_start_matches('/'));
            Box::pin(async move { path.is_file() })
        }),
        generate_etag: callback(&|context, _| {
            let path = serve_dir().join(context.request.request_path.trim_start_matches('/'));
            Box::pin(async move {
                std::fs::metadata(&path)
                    .ok()
                    .map(|meta| format!("{:x}", meta.len()))
            })
        }),
        last_modified: callback(&|context, _| {
            let path = serve_dir().join(context.request.request_path.trim_start_matches('/'));
            Box::pin(async move { last_modified_of(&path) })
        }),
        render_response: callback(&|context, _| {
            let path = serve_dir().join(context.request.request_path.trim_start_matches('/'));
            context.selected_media_type = Some(mime_type_for_path(&path));
            Box::pin(async move { std::fs::read_to_string(&path).ok() })
        }),
        process_put: callback(&|context, _| {
            let dir = serve_dir();
            let url_path = context.request.request_path.clone();
            let body = context.request.body.clone().unwrap_or_default();
            Box::pin(async move {
                let target = path_for_url(&dir, &url_path);
                let outcome = write_file_body(&target, &url_path, false, &body).await;
                if outcome.status < 300 {
                    Ok(true)
                } else {
                    Err(outcome.status)
                }
            })
        }),
        ..Resource::default()
    }
}

fn dispatcher() -> Dispatcher<'static> {
    Dispatcher {
        routes: btreemap! {
            "/files" => file_resource(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    env_logger::init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;

    let make_svc = make_service_fn(|_| async { Ok::<_, Infallible>(dispatcher()) });

    match Server::try_bind(&addr) {
        Ok(server) => {
            info!("listening on {}", addr);
            server
                .serve(make_svc)
                .await
                .map_err(|err| format!("server error: {}", err))?;
        }
        Err(err) => {
            error!("could not start server: {}", err);
            return Err(err.to_string());
        }
    }

    Ok(())
}
