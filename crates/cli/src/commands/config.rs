use careline_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

/// Render the effective configuration with secrets redacted. Values shown
/// are post-merge (env > file > default).
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("database.url", &config.database.url));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
    ));
    lines.push(render_line("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(render_line("llm.engine", &format!("{:?}", config.llm.engine)));
    lines.push(render_line("llm.model", &config.llm.model));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("(unset)"),
    ));
    lines.push(render_line("llm.timeout_secs", &config.llm.timeout_secs.to_string()));

    lines.push(render_line("provider.backend", &format!("{:?}", config.provider.backend)));
    lines.push(render_line(
        "provider.base_url",
        config.provider.base_url.as_deref().unwrap_or("(unset)"),
    ));
    lines.push(render_line(
        "provider.api_token",
        &config
            .provider
            .api_token
            .as_ref()
            .map(|token| redact(token.expose_secret()))
            .unwrap_or_else(|| "(unset)".to_string()),
    ));
    lines.push(render_line(
        "provider.verification_credential",
        &redact(config.provider.verification_credential.expose_secret()),
    ));
    lines.push(render_line(
        "provider.timeout_secs",
        &config.provider.timeout_secs.to_string(),
    ));

    lines.push(render_line("server.bind_address", &config.server.bind_address));
    lines.push(render_line("server.port", &config.server.port.to_string()));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
    ));

    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}
