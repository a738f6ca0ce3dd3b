use clap::{Parser, Subcommand};
use clinic_core::{
    config::token_ttl_days_from_env_value, constants::DEFAULT_DB_FILE, AppointmentService,
    CoreConfig, Credentials, JsonFileBackend, RecordStore, UserService,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic scheduling service operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List users, newest first
    ListUsers {
        /// Page number (10 users per page)
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Create a user account
    CreateUser {
        /// Display name
        name: String,
        /// Email address (must be unique)
        email: String,
        /// Password
        password: String,
        /// patient, doctor or admin
        #[arg(long, default_value = "patient")]
        role: String,
    },
    /// Delete a user account (appointments and prescriptions are kept)
    DeleteUser {
        /// User id
        id: String,
    },
    /// List every appointment, earliest first
    ListAppointments,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };

    let cfg = CoreConfig::new(
        std::env::var("CLINIC_DB_FILE")
            .unwrap_or_else(|_| DEFAULT_DB_FILE.into())
            .into(),
        std::env::var("JWT_SECRET").unwrap_or_default(),
        token_ttl_days_from_env_value(std::env::var("JWT_TTL_DAYS").ok())?,
    )?;
    let store = Arc::new(RecordStore::open(JsonFileBackend::new(cfg.db_file()))?);
    let users = UserService::new(store.clone(), Arc::new(Credentials::from_config(&cfg)));

    match command {
        Commands::ListUsers { page } => {
            let listing = users.users_page(page)?;
            if listing.users.is_empty() {
                println!("No users found.");
            } else {
                for user in &listing.users {
                    println!(
                        "ID: {}, Name: {}, Email: {}, Role: {}, Created: {}",
                        user.id, user.name, user.email, user.role, user.created_at
                    );
                }
            }
            println!("Page {} of {}", listing.page, listing.pages);
        }
        Commands::CreateUser {
            name,
            email,
            password,
            role,
        } => {
            let user = users.create_user(Some(&name), Some(&email), Some(&password), Some(&role))?;
            println!("Created {} user with ID: {}", user.data.role, user.id);
        }
        Commands::DeleteUser { id } => {
            users.remove_user(&id)?;
            println!("Deleted user with ID: {}", id);
        }
        Commands::ListAppointments => {
            let appointments = AppointmentService::new(store).list_all()?;
            if appointments.is_empty() {
                println!("No appointments found.");
            }
            for a in appointments {
                println!(
                    "ID: {}, Date: {}, Status: {}, Patient: {}, Doctor: {}",
                    a.id,
                    a.appointment_date,
                    a.status,
                    a.patient.map_or_else(|| format!("{} (deleted)", a.patient_id), |p| p.name),
                    a.doctor.map_or_else(|| format!("{} (deleted)", a.doctor_id), |d| d.name),
                );
            }
        }
    }

    Ok(())
}
