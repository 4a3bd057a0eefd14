//! `opsclaw doctor`: diagnose the local setup.

use std::path::{Path, PathBuf};

use opsclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 OpsClaw Doctor · Setup Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `opsclaw onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    match config.extractor.backend.as_str() {
        "llm" if config.has_api_key() => {
            println!("  ✅ Extractor: llm ({})", config.extractor.model);
        }
        "llm" => {
            println!("  ⚠️  Extractor: llm, but no API key (keyword rules will be used)");
            issues += 1;
        }
        other => println!("  ✅ Extractor: {other}"),
    }

    match find_executable(&config.worker.command) {
        Some(path) => println!("  ✅ Worker command: {}", path.display()),
        None => {
            println!(
                "  ❌ Worker command not found: {} (set [worker].command)",
                config.worker.command
            );
            issues += 1;
        }
    }

    println!(
        "  ✅ Vocabulary: {} zones, {} resource keywords, namespaces start with \"{}\"",
        config.vocabulary.zones.len(),
        config.vocabulary.resource_kinds.len(),
        config.vocabulary.namespace_prefix
    );

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Resolve `command` the way a spawn would: paths as given, bare names on
/// `PATH`.
fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|full| full.is_file())
}
