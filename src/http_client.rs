use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::UpstreamConfig;

fn has_proxy_env() -> bool {
    [
        "HTTPS_PROXY",
        "https_proxy",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ]
    .iter()
    .any(|k| std::env::var(k).is_ok_and(|v| !v.trim().is_empty()))
}

fn should_bypass_proxy_impl(url: &str, no_proxy_hosts: &[String], proxy_env_present: bool) -> bool {
    if !proxy_env_present || no_proxy_hosts.is_empty() {
        return false;
    }

    let Ok(u) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };

    // "example.com" 同时匹配其子域名
    no_proxy_hosts.iter().any(|h| {
        let h = h.trim().trim_start_matches('.');
        !h.is_empty() && (host == h || host.ends_with(&format!(".{}", h)))
    })
}

pub fn maybe_disable_proxy(builder: ClientBuilder, url: &str, no_proxy_hosts: &[String]) -> ClientBuilder {
    if should_bypass_proxy_impl(url, no_proxy_hosts, has_proxy_env()) {
        builder.no_proxy()
    } else {
        builder
    }
}

/// Client for the configured completion endpoint.
pub fn client_for_upstream(cfg: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    let url = cfg.chat_completions_url();
    let builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
    // 流式响应可能持续较久，timeout 只作用于非流式请求（见 providers::openai）
    maybe_disable_proxy(builder, &url, &cfg.no_proxy_hosts).build()
}

#[cfg(test)]
mod tests {
    use super::should_bypass_proxy_impl;

    fn hosts() -> Vec<String> {
        vec!["openai.azure.com".to_string(), "localhost".to_string()]
    }

    #[test]
    fn bypass_proxy_for_listed_hosts_and_subdomains() {
        assert!(should_bypass_proxy_impl(
            "https://myres.openai.azure.com/openai/deployments/x/chat/completions",
            &hosts(),
            true
        ));
        assert!(should_bypass_proxy_impl("http://localhost:8080/v1", &hosts(), true));
        assert!(!should_bypass_proxy_impl("https://api.openai.com/v1", &hosts(), true));
        assert!(!should_bypass_proxy_impl("https://notopenai.azure.com.evil", &hosts(), true));
    }

    #[test]
    fn do_not_bypass_without_proxy_env_or_hosts() {
        assert!(!should_bypass_proxy_impl("http://localhost:8080", &hosts(), false));
        assert!(!should_bypass_proxy_impl("http://localhost:8080", &[], true));
    }
}
