/// Example program to print the loaded configuration
///
/// Run with: cargo run -p jira-rtl-config --example print_config

fn main() {
    let config = jira_rtl_config::JiraRtlConfig::load();

    println!("=== Jira RTL Configuration ===\n");

    println!("Engine:");
    println!("  Marker Attribute: {}", config.engine.marker_attribute);
    println!("  Rules Path: {:?}", config.engine.rules_path);
    println!("  Tree Walker Exclude: {}", config.engine.tree_walker_exclude);
    println!();

    println!("Navigation:");
    println!("  Debounce: {} ms", config.navigation.debounce_ms);
    println!();

    println!("Lifecycle:");
    println!("  Post-load Scan: {} ms", config.lifecycle.post_load_scan_ms);
    println!();

    println!("Settings:");
    println!("  Path: {:?}", config.settings.path);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}
