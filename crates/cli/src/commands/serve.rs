//! `ironquill serve` — Start the streaming gateway.

use anyhow::Context;
use ironquill_config::AppConfig;

pub async fn run(port_override: Option<u16>, scripted: bool) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("failed to load config")?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if scripted {
        config.provider.kind = "scripted".into();
    }

    println!("🪶 IronQuill Gateway");
    println!(
        "   Listening: {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   Provider:  {}", config.provider.kind);
    println!("   Model:     {}", config.provider.default_model);
    println!(
        "   Memory:    {}",
        if config.memory.enabled {
            config.memory.backend.as_str()
        } else {
            "disabled"
        }
    );

    ironquill_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
