//! config command - Show the resolved configuration

use crate::cli::Context;
use crate::ui::output;
use anyhow::Result;
use serde_json::json;

/// Print every resolved setting and the files it came from.
pub fn show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let store_path = config.store_path(&ctx.workspace);

    if ctx.json {
        return Ok(output::json(&json!({
            "global_file": config.global_config_loaded_from(),
            "project_file": config.project_config_loaded_from(),
            "store": { "path": store_path },
            "commits": { "short_hash_len": config.short_hash_len() },
            "merge": { "retries": config.merge_retries() },
            "branches": { "stale_after_days": config.stale_after_days() },
            "review": { "required_approvals": config.required_approvals() },
            "log": { "level": config.log_level(), "format": config.log_format().to_string() },
        }))?);
    }

    let source = |p: Option<&std::path::Path>| {
        p.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    println!("# global: {}", source(config.global_config_loaded_from()));
    println!("# project: {}", source(config.project_config_loaded_from()));
    println!("store.path = {}", store_path.display());
    println!("commits.short_hash_len = {}", config.short_hash_len());
    println!("merge.retries = {}", config.merge_retries());
    println!("branches.stale_after_days = {}", config.stale_after_days());
    println!("review.required_approvals = {}", config.required_approvals());
    println!("log.level = {}", config.log_level());
    println!("log.format = {}", config.log_format());
    Ok(())
}
