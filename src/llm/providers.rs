use std::collections::HashMap;
use std::sync::LazyLock;

pub static PROVIDER_SERVERS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    HashMap::from([
        ("openai", "api.openai.com"),
        ("anthropic", "api.anthropic.com"),
        ("google", "generativelanguage.googleapis.com"),
        ("ollama", "localhost"),
    ])
});

pub static PROVIDER_PORTS: LazyLock<HashMap<&str, u16>> = LazyLock::new(|| {
    HashMap::from([
        ("openai", 443),
        ("anthropic", 443),
        ("google", 443),
        ("ollama", 11434),
    ])
});

/// `server.address` / `server.port` span attributes for a provider name.
pub fn endpoint_for(provider_name: &str) -> (&'static str, u16) {
    let server = PROVIDER_SERVERS
        .get(provider_name)
        .copied()
        .unwrap_or("unknown");
    let port = PROVIDER_PORTS.get(provider_name).copied().unwrap_or(443);
    (server, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        assert_eq!(
            endpoint_for("google"),
            ("generativelanguage.googleapis.com", 443)
        );
        assert_eq!(endpoint_for("ollama"), ("localhost", 11434));
    }

    #[test]
    fn test_unknown_provider() {
        assert_eq!(endpoint_for("mystery"), ("unknown", 443));
    }
}
