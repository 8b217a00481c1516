use axum::response::Html;

/// Minimal document the client application mounts into.
fn shell(page: &str, title: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} | Projects Dashboard</title>\n</head>\n\
         <body>\n<main id=\"app\" data-page=\"{page}\"></main>\n</body>\n</html>\n"
    ))
}

pub async fn index() -> Html<String> {
    shell("home", "Home")
}

pub async fn login_page() -> Html<String> {
    shell("login", "Sign in")
}

pub async fn register_page() -> Html<String> {
    shell("register", "Create account")
}

pub async fn projects_page() -> Html<String> {
    shell("projects", "Projects")
}

pub async fn new_project_page() -> Html<String> {
    shell("project-new", "New project")
}

/// The client reads the project id from its own location and fetches the
/// project through the API.
pub async fn project_page() -> Html<String> {
    shell("project", "Project")
}

pub async fn templates_page() -> Html<String> {
    shell("templates", "Templates")
}

pub async fn settings_page() -> Html<String> {
    shell("settings", "Settings")
}

pub async fn health_check() -> &'static str {
    "OK"
}
