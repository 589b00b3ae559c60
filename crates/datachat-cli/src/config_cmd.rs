use datachat_config::Config;
use std::path::Path;

pub(crate) fn show_config(config: &Config, current_dir: &Path) -> anyhow::Result<()> {
    let settings = config.turn_settings();

    println!("\n╔══════════════════════════════════════════╗");
    println!("║         Configuration                    ║");
    println!("╚══════════════════════════════════════════╝\n");

    println!("Chat endpoint:   {}", config.chat_url());
    println!("Connect timeout: {}s", config.connect_timeout().as_secs());
    println!(
        "Model:           {}",
        config.model.as_deref().unwrap_or("(server default)")
    );
    println!(
        "Data source:     {}",
        config.data_context.as_deref().unwrap_or("(none selected)")
    );
    println!(
        "Log level:       {}",
        config.log_level.as_deref().unwrap_or("info")
    );

    println!("\nTurn:");
    println!("  timeout:          {}s", settings.timeout.as_secs());
    println!("  max line bytes:   {}", settings.max_line_bytes);
    println!("  summary progress: {:?}", settings.summary_progress_chars);
    println!("  tool progress:    {:?}", settings.tool_progress_chars);
    println!("  long input chars: {}", settings.long_input_chars);

    println!("\nWorking directory: {}", current_dir.display());
    println!("\nRaw config:");
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
