//! Interactive database cleanup tool.
//!
//! Offers a partial clear that keeps the admin settings, or a full reset
//! that also restores the default admin password. Both paths ask for
//! confirmation before touching anything.

use std::io::{self, BufRead, Write};

use dotenvy::dotenv;
use savol_relay::config::Settings;
use savol_relay::storage::{Database, DEFAULT_ADMIN_PASSWORD};

fn prompt(question: &str) -> io::Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

fn confirmed(answer: &str) -> bool {
    matches!(answer, "yes" | "y")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let settings = Settings::new()?;

    println!("{}", "=".repeat(50));
    println!("Database cleanup tool");
    println!("{}", "=".repeat(50));

    let answer = prompt(
        "\nWARNING! This will delete data from the database.\nAre you sure? (yes/no): ",
    )?;
    if !confirmed(&answer) {
        println!("Operation cancelled.");
        return Ok(());
    }

    println!("\nChoose cleanup type:");
    println!("1. Clear all data (keep admin settings)");
    println!("2. Full cleanup (reset admin password)");
    let choice = prompt("Your choice (1 or 2): ")?;

    let db = Database::new(&settings.database_file)?;

    match choice.as_str() {
        "1" => {
            println!("\nClearing data (keeping admin settings)...");
            if db.clear_all_data(true).await {
                println!("Database cleared successfully!");
                println!("   - All users deleted");
                println!("   - All requests deleted");
                println!("   - All responses deleted");
                println!("   - Admin settings preserved");
            } else {
                eprintln!("Error clearing database!");
                std::process::exit(1);
            }
        }
        "2" => {
            let confirm =
                prompt("This will also reset the admin password. Continue? (yes/no): ")?;
            if !confirmed(&confirm) {
                println!("Operation cancelled.");
                return Ok(());
            }
            println!("\nFull database cleanup...");
            if db.clear_all_data(false).await {
                println!("Database fully cleared!");
                println!("   - All users deleted");
                println!("   - All requests deleted");
                println!("   - All responses deleted");
                println!("   - Admin password reset to: {DEFAULT_ADMIN_PASSWORD}");
            } else {
                eprintln!("Error clearing database!");
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("Invalid choice!");
            std::process::exit(1);
        }
    }

    println!("\n{}", "=".repeat(50));
    println!("Operation completed successfully!");
    println!("{}", "=".repeat(50));
    Ok(())
}
