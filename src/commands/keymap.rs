//! Keymap inspection command handlers.

use anyhow::Context;
use orione_driver::keymap::ENCODER_COUNT;
use orione_driver::{KeyCode, Keymap};
use std::path::Path;

use super::CommandResult;

fn print_grid(rows: usize, cols: usize, cell: impl Fn(u8, u8) -> Option<KeyCode>) {
    for row in 0..rows as u8 {
        let cells: Vec<String> = (0..cols as u8)
            .map(|col| cell(row, col).map_or("-".to_string(), |k| k.to_string()))
            .map(|name| format!("{name:<8}"))
            .collect();
        println!("  {:>2} {}", row, cells.join(" ").trim_end());
    }
}

/// Validate a keymap file and print each layer as a grid
pub fn check_keymap(file: &Path) -> CommandResult {
    let keymap = Keymap::load(file).with_context(|| format!("{} is not a valid keymap", file.display()))?;
    let (rows, cols) = keymap.dimensions();

    println!("{}: {} rows x {} columns", file.display(), rows, cols);
    let encoder: Vec<String> = (0..ENCODER_COUNT as u8)
        .map(|i| keymap.encoder(i).map_or("-".to_string(), |k| k.to_string()))
        .collect();
    println!("Encoder (ccw, cw, push): {}", encoder.join(", "));

    for profile in keymap.profiles() {
        println!();
        println!("Profile {profile}:");
        print_grid(rows, cols, |row, col| keymap.lookup(profile, row, col));
    }
    if keymap.has_fn_layer() {
        println!();
        println!("Fn layer (- uses the active profile):");
        print_grid(rows, cols, |row, col| keymap.lookup_fn(row, col));
    }

    println!();
    println!("OK: {} profiles, {} distinct keys", keymap.profiles().len(), keymap.used_keys().len());
    Ok(())
}

/// List key names with their numeric index
pub fn keys() -> CommandResult {
    println!("{:>4}  Name", "Idx");
    for key in KeyCode::ALL {
        let digit = key.digit().map(|d| format!("  (profile {d})")).unwrap_or_default();
        println!("{:>4}  {}{}", key.index(), key, digit);
    }
    Ok(())
}
