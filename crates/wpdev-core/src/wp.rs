use crate::runner::Exec;

/// Administrator account created on every local install.
pub const ADMIN_USER: &str = "organic";
pub const ADMIN_PASSWORD: &str = "organic";
pub const ADMIN_EMAIL: &str = "wpplugin@organic.ly";

/// Plugin under test, as wp-cli identifies it.
pub const PLUGIN_PATH: &str = "wordpress-plugin/organic.php";

/// wp-cli inside `service`; the containers run as root.
pub fn wp<I, S>(service: &str, args: I) -> Exec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = vec!["wp".to_string(), "--allow-root".to_string()];
    argv.extend(args.into_iter().map(Into::into));
    Exec::new(service, argv)
}

pub fn core_install(service: &str, port: u16, title: &str) -> Exec {
    wp(
        service,
        [
            "core".to_string(),
            "install".to_string(),
            format!("--url=localhost:{port}"),
            format!("--title={title}"),
            format!("--admin_user={ADMIN_USER}"),
            format!("--admin_password={ADMIN_PASSWORD}"),
            format!("--admin_email={ADMIN_EMAIL}"),
        ],
    )
}

pub fn site_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

pub fn admin_url(port: u16) -> String {
    format!("http://localhost:{port}/wp-admin/")
}
