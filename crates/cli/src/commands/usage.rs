//! `ironquill usage` — Usage totals from a running gateway, or the
//! local pricing table.

use anyhow::Context;
use ironquill_config::AppConfig;
use ironquill_telemetry::PricingTable;

pub async fn run(url: Option<String>, pricing: bool) -> anyhow::Result<()> {
    if pricing {
        return print_pricing();
    }

    let base = match url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let config = AppConfig::load().context("failed to load config")?;
            base_url(&config)
        }
    };

    let endpoint = format!("{base}/v1/usage");
    let snapshot: serde_json::Value = reqwest::Client::new()
        .get(&endpoint)
        .send()
        .await
        .with_context(|| format!("GET {endpoint} failed — is the gateway running?"))?
        .error_for_status()?
        .json()
        .await?;

    println!("📊 Usage Snapshot ({base})");
    println!("─────────────────────────────────────");
    println!("  Turns:            {}", snapshot["total_turns"]);
    println!("  Errors:           {}", snapshot["error_turns"]);
    println!("  Testing turns:    {}", snapshot["testing_turns"]);
    println!("  Tokens in:        {}", snapshot["total_tokens_in"]);
    println!("  Tokens out:       {}", snapshot["total_tokens_out"]);
    println!(
        "  Total cost:       ${:.6}",
        snapshot["total_cost_usd"].as_f64().unwrap_or(0.0)
    );
    println!("  Provider usage:   {}", snapshot["provider_usage_turns"]);
    println!("  Estimated usage:  {}", snapshot["estimated_usage_turns"]);
    if let Some(ttft) = snapshot["avg_ttft_ms"].as_f64() {
        println!("  Avg TTFT:         {ttft:.0} ms");
    }

    Ok(())
}

fn print_pricing() -> anyhow::Result<()> {
    let table = PricingTable::with_defaults();
    let models = table.models();

    println!("💰 Model Pricing (per 1M tokens)");
    println!("─────────────────────────────────────────────────────");
    println!("{:<40} {:>10} {:>10}", "Model", "Input", "Output");

    for name in &models {
        if let Some(p) = table.get(name) {
            println!(
                "{:<40} ${:>8.3} ${:>8.3}",
                name, p.input_per_m, p.output_per_m
            );
        }
    }

    println!();
    println!("  {} models with pricing data", models.len());

    Ok(())
}

/// The base URL a client on this machine should use. A wildcard bind
/// address is not dialable, so it maps to loopback.
fn base_url(config: &AppConfig) -> String {
    let host = if config.gateway.host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        config.gateway.host.as_str()
    };
    format!("http://{}:{}", host, config.gateway.port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_configured_host_and_port() {
        let config = AppConfig::default();
        assert_eq!(base_url(&config), "http://127.0.0.1:8787");
    }

    #[test]
    fn wildcard_bind_maps_to_loopback() {
        let mut config = AppConfig::default();
        config.gateway.host = "0.0.0.0".into();
        config.gateway.port = 9000;
        assert_eq!(base_url(&config), "http://127.0.0.1:9000");
    }
}
