//! Non-interactive partial clear for scripting: drops all relay data but
//! keeps the admin settings.

use dotenvy::dotenv;
use savol_relay::config::Settings;
use savol_relay::storage::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let settings = Settings::new()?;
    let db = Database::new(&settings.database_file)?;

    println!("Clearing database...");
    if db.clear_all_data(true).await {
        println!("Database cleared successfully!");
        println!("  - All users deleted");
        println!("  - All requests deleted");
        println!("  - All responses deleted");
        println!("  - Admin settings preserved");
        Ok(())
    } else {
        eprintln!("Error clearing database!");
        std::process::exit(1);
    }
}
