//! Config command - view or modify configuration.

use anyhow::Result;
use lanchat_core::{platform, SessionConfig};

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub async fn execute(key: Option<String>, value: Option<String>) -> Result<()> {
    let mut config = SessionConfig::load_with_env()?;

    match (key.as_deref(), value) {
        (None, None) => {
            // Show all config
            println!("Current Configuration");
            println!("=====================");
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!();
            println!("Config file: {:?}", platform::config_file_path());
        }
        (Some(key), None) => {
            // Get specific key
            match key {
                "display_name" => println!("{:?}", config.display_name),
                "font" => println!("{:?}", config.font),
                "color" => println!("{:?}", config.color),
                "theme" => println!("{:?}", config.theme),
                "pause_ms" => println!("{}", config.pause_ms),
                "save_history" => println!("{}", config.save_history),
                "trim_message" => println!("{}", config.trim_message),
                "message_time" => println!("{}", config.message_time),
                "message_date" => println!("{}", config.message_date),
                _ => println!("Unknown config key: {}", key),
            }
        }
        (Some(key), Some(value)) => {
            // Set specific key
            match key {
                "display_name" => config.display_name = value,
                "font" => config.font = value,
                "color" => config.color = value,
                "theme" => config.theme = value.parse()?,
                "pause_ms" => match value.parse() {
                    Ok(ms) => config.pause_ms = ms,
                    Err(_) => {
                        println!("pause_ms must be a number of milliseconds");
                        return Ok(());
                    }
                },
                "save_history" | "trim_message" | "message_time" | "message_date" => {
                    let Some(flag) = parse_bool(&value) else {
                        println!("{} must be true or false", key);
                        return Ok(());
                    };
                    match key {
                        "save_history" => config.save_history = flag,
                        "trim_message" => config.trim_message = flag,
                        "message_time" => config.message_time = flag,
                        _ => config.message_date = flag,
                    }
                }
                _ => {
                    println!("Cannot set config key: {}", key);
                    return Ok(());
                }
            }
            config.save()?;
            println!("Set {} = {}", key, value_of(&config, key));
        }
        (None, Some(_)) => {
            println!("Must specify a key to set a value");
        }
    }

    Ok(())
}

fn value_of(config: &SessionConfig, key: &str) -> String {
    match key {
        "display_name" => format!("{:?}", config.display_name),
        "font" => format!("{:?}", config.font),
        "color" => format!("{:?}", config.color),
        "theme" => format!("{:?}", config.theme),
        "pause_ms" => config.pause_ms.to_string(),
        "save_history" => config.save_history.to_string(),
        "trim_message" => config.trim_message.to_string(),
        "message_time" => config.message_time.to_string(),
        "message_date" => config.message_date.to_string(),
        _ => String::new(),
    }
}
