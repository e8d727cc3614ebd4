pub use crate::prelude::*;

pub fn handle_get(
    request: &HttpRequest,
    r_cfg: &RouteConfig,
    s_cfg: &Arc<ServerConfig>,
) -> (HttpResponse, ActiveAction) {
    let root = &r_cfg.root;
    let relative_path = request.url.strip_prefix(&r_cfg.path).unwrap_or(&request.url);
    let mut path = PathBuf::from(root);
    path.push(relative_path.trim_start_matches('/'));

    if path.is_dir() {
        if !r_cfg.default_file.is_empty() && path.join(&r_cfg.default_file).is_file() {
            path.push(&r_cfg.default_file);
        } else if r_cfg.autoindex {
            return (generate_autoindex(&path, &request.url), ActiveAction::None);
        } else {
            return (handle_error(HTTP_NOT_FOUND, Some(s_cfg)), ActiveAction::None);
        }
    }

    match File::open(&path) {
        Ok(file) => {
            let Ok(metadata) = file.metadata() else {
                return (
                    handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)),
                    ActiveAction::None,
                );
            };
            let file_size = metadata.size() as usize;
            let mime_type = get_mime_type(path.extension().and_then(|s| s.to_str()));

            let mut res = HttpResponse::new(HTTP_OK, &HttpResponse::status_text(HTTP_OK));
            res.headers
                .insert("Content-Length".to_string(), file_size.to_string());
            res.headers
                .insert("Content-Type".to_string(), mime_type.to_string());

            (res, ActiveAction::FileDownload(file, file_size))
        }
        Err(e) => {
            let res = match e.kind() {
                std::io::ErrorKind::NotFound => handle_error(HTTP_NOT_FOUND, Some(s_cfg)),
                std::io::ErrorKind::PermissionDenied => handle_error(HTTP_FORBIDDEN, Some(s_cfg)),
                _ => handle_error(HTTP_INTERNAL_SERVER_ERROR, Some(s_cfg)),
            };
            (res, ActiveAction::None)
        }
    }
}
