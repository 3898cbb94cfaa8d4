//! `ironquill doctor` — Diagnose configuration and upstream health.

use ironquill_config::AppConfig;
use ironquill_core::MemoryQuery;
use ironquill_memory::build_store;
use ironquill_providers::build_provider;

pub async fn run() -> anyhow::Result<()> {
    println!("🩺 IronQuill Doctor");
    println!("===================\n");

    let mut issues = 0;

    // Config file
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!(
            "  ⚠️  No config file at {} — using defaults (run `ironquill config init`)",
            config_path.display()
        );
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!();
            println!("  ⚠️  Fix the config before anything else will work.");
            return Ok(());
        }
    };

    // API key
    if config.provider.kind == "scripted" {
        println!("  ✅ Scripted provider, no API key needed");
    } else if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key — set provider.api_key or IRONQUILL_API_KEY");
        issues += 1;
    }

    // Provider reachability
    let provider = build_provider(&config);
    match provider.list_models().await {
        Ok(models) if models.is_empty() => {
            println!(
                "  ⚠️  Provider '{}' reachable but lists no models",
                provider.name()
            );
            issues += 1;
        }
        Ok(models) => println!(
            "  ✅ Provider '{}' reachable ({} models)",
            provider.name(),
            models.len()
        ),
        Err(e) => {
            println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
            issues += 1;
        }
    }

    // Memory reachability
    match build_store(&config) {
        Some(store) => match store.retrieve(MemoryQuery::new("ping").with_limit(1)).await {
            Ok(_) => println!("  ✅ Memory store '{}' reachable", store.name()),
            Err(e) => {
                println!(
                    "  ⚠️  Memory store '{}' failing: {e} (turns will run without context)",
                    store.name()
                );
                issues += 1;
            }
        },
        None => println!("  ✅ Memory disabled"),
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
