//! `tessera configure` command — interactive config file setup.

use std::io::{BufRead, Write};

use tessera_core::config::{Settings, SettingsFile};

pub fn execute() -> Result<(), Box<dyn std::error::Error>> {
    let path = Settings::default_path();
    println!("Writing configuration into {}", path.display());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    let file = SettingsFile {
        region: Some(ask(&mut input, "AWS Region", "us-east-1", true)?),
        endpoint: Some(ask(&mut input, "Service endpoint", "", true)?),
        client_id: Some(ask(&mut input, "Client id", "", true)?),
        username: non_empty(ask(&mut input, "Username", "", false)?),
        password: non_empty(ask(&mut input, "Password", "", false)?),
    };

    file.save(&path)?;
    println!("Configuration done.");
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Prompt for one value; re-asks while empty when `required` and no default
/// applies.
fn ask(
    input: &mut impl BufRead,
    description: &str,
    default: &str,
    required: bool,
) -> std::io::Result<String> {
    loop {
        print!("{} [{}]: ", description, default);
        std::io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            // EOF: fall back to the default.
            return Ok(default.to_string());
        }
        let value = line.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
        if !default.is_empty() {
            return Ok(default.to_string());
        }
        if !required {
            return Ok(String::new());
        }
    }
}
