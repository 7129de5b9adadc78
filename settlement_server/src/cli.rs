use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_CURRENCY",
        "MKT_DEFAULT_COMMISSION_RATE",
        "MKT_SELLER_COMMISSION_OVERRIDES",
        "MKT_PROCESSING_FEE_RATE",
        "MKT_PROCESSING_FEE_FIXED",
        "MKT_AUTO_CAPTURE_HOURS",
        "MKT_HOLD_VALIDITY_HOURS",
        "MKT_DELIVERY_BUFFER_PERCENT",
        "MKT_SWEEP_INTERVAL_SECS",
        "MKT_PROCESSOR_URL",
        "MKT_COURIER_URL",
        "MKT_COURIER_HMAC_CHECKS",
        "MKT_NOTIFICATION_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
