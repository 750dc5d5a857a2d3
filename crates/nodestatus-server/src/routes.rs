use std::path::PathBuf;

use actix_web::{web, HttpResponse};

/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

/// `/health`, then every other path served from `pub_path`.
pub fn configure(pub_path: PathBuf) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(health))
            .service(actix_files::Files::new("/", pub_path));
    }
}
