use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use dcms_desk::{
    config::Config,
    finance::{self, DateBucket},
    middleware::route_guard::{Navigator, Route},
    models::{AppState, AppointmentDraft},
    notice::Notice,
    scheduler::TokenRefresher,
    services::{
        self,
        appointment_service::{self, AppointmentService},
        auth_service::AuthService,
        expense_service::ExpenseService, inventory_service::{self, InventoryService},
        patient_service::PatientService, payment_service::PaymentService,
    },
    session::SessionEvent,
    slots::{DaySelector, SlotDuration},
    table::paginate,
};

#[derive(Parser)]
#[command(name = "dcms-desk")]
#[command(about = "Front-desk client for the dental clinic API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the bearer token
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user's claims
    Whoami,
    /// Day view of the appointment book
    Schedule {
        /// today, tomorrow or YYYY-MM-DD
        #[arg(default_value = "today")]
        day: DaySelector,
        /// Open block length in minutes (15, 30 or 60)
        #[arg(short, long)]
        slot: Option<u32>,
    },
    /// List patients
    Patients {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    /// List inventory items
    Inventory {
        /// Only items at or below their minimum quantity
        #[arg(long)]
        low: bool,
    },
    /// Income and expense totals per period
    Finance {
        #[arg(short, long, default_value = "month")]
        bucket: DateBucket,
    },
    /// Confirm a cash payment taken at the desk
    ConfirmPayment { id: Uuid },
    /// Book an appointment starting at an RFC 3339 instant
    Book {
        patient: Uuid,
        #[arg(long)]
        start: DateTime<Utc>,
        /// Length in minutes (15, 30 or 60); defaults to the configured slot
        #[arg(short, long)]
        slot: Option<u32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark an appointment as completed
    Complete { id: Uuid },
    /// Keep the session fresh until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    let state = AppState::from_config(&cfg)?;

    match cli.command {
        Commands::Login { email, password } => {
            let claims = AuthService::new(state.client.clone()).login(&email, &password).await?;
            println!("signed in as {} ({:?})", claims.sub, claims.role);
        }
        Commands::Logout => {
            AuthService::new(state.client.clone()).logout().await;
            println!("signed out");
        }
        Commands::Whoami => match state.session.claims() {
            Some(c) => println!(
                "{} role={:?} plan={:?} email_verified={} expires={:?}",
                c.sub,
                c.role,
                c.plan_status,
                c.email_verified,
                c.expires_at()
            ),
            None => println!("not signed in"),
        },
        Commands::Schedule { day, slot } => {
            let duration = match slot {
                Some(m) => SlotDuration::try_from(m).map_err(anyhow::Error::msg)?,
                None => state.slot_duration,
            };
            let appointments = AppointmentService::new(state.client.clone());
            let slots = appointments.day_view(day, duration).await?;
            for s in slots {
                println!("{s}");
            }
        }
        Commands::Patients { search, page, per_page } => {
            let patients = PatientService::new(state.client.clone());
            let loaded = services::load_or_empty("patients", patients.search(&search)).await;
            report(loaded.notice);
            let page = paginate(&loaded.items, page, per_page);
            for p in &page.items {
                println!("{}  {} {}", p.id, p.first_name, p.last_name);
            }
            println!("page {}/{} ({} patients)", page.page, page.total_pages, page.total_items);
        }
        Commands::Inventory { low } => {
            let inventory = InventoryService::new(state.client.clone());
            let loaded = services::load_or_empty("inventory", inventory.list()).await;
            report(loaded.notice);
            let items: Vec<_> = if low {
                inventory_service::low_stock(&loaded.items)
            } else {
                loaded.items.iter().collect()
            };
            for i in items {
                println!("{}  qty={} min={}", i.name, i.quantity, i.min_quantity);
            }
        }
        Commands::Finance { bucket } => {
            let payments = PaymentService::new(state.client.clone());
            let expenses = ExpenseService::new(state.client.clone());
            let income = services::load_or_empty("payments", payments.list_hand_payments()).await;
            let costs = services::load_or_empty("expenses", expenses.list()).await;
            report(income.notice);
            report(costs.notice);

            println!("income");
            for (start, cents) in finance::group_by_bucket(&income.items, bucket) {
                println!("  {start}  {}", finance::format_cents(cents));
            }
            println!("expenses");
            for (start, cents) in finance::group_by_bucket(&costs.items, bucket) {
                println!("  {start}  {}", finance::format_cents(cents));
            }
            println!("net {}", finance::format_cents(finance::net_cents(&income.items, &costs.items)));
        }
        Commands::ConfirmPayment { id } => {
            match PaymentService::new(state.client.clone()).confirm_hand_payment(id).await {
                Ok(()) => report(Some(Notice::success("payment confirmed"))),
                Err(e) => report(Some(Notice::from_error(&e))),
            }
        }
        Commands::Book { patient, start, slot, notes } => {
            let duration = match slot {
                Some(m) => SlotDuration::try_from(m).map_err(anyhow::Error::msg)?,
                None => state.slot_duration,
            };
            let draft = AppointmentDraft {
                patient_id: Some(patient),
                start_time: start,
                end_time: start + duration.as_duration(),
                notes,
            };
            match AppointmentService::new(state.client.clone()).create(&draft).await {
                Ok(a) => report(Some(Notice::success(format!("appointment {} booked", a.id)))),
                Err(e) => report(Some(appointment_service::booking_notice(&e))),
            }
        }
        Commands::Complete { id } => {
            match AppointmentService::new(state.client.clone()).complete(id).await {
                Ok(a) => report(Some(Notice::success(format!("appointment {} completed", a.id)))),
                Err(e) => report(Some(Notice::from_error(&e))),
            }
        }
        Commands::Watch => watch(state).await?,
    }

    Ok(())
}

async fn watch(state: AppState) -> anyhow::Result<()> {
    let refresher: Arc<dyn TokenRefresher> = Arc::new(state.client.clone());
    let mut events = state.session.subscribe();
    let mut nav = Navigator::new(state.session.clone(), refresher, state.refresh_lead);

    let shown = nav.navigate(Route::Dashboard);
    if shown == Route::Login {
        println!("not signed in");
        return Ok(());
    }
    tracing::info!(view = ?shown, "watching session");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            ev = events.recv() => match ev {
                Ok(SessionEvent::Expired) => {
                    report(Some(Notice::error("Your session has expired. Please sign in again.")));
                    nav.navigate(Route::Dashboard);
                    break;
                }
                Ok(SessionEvent::LoggedOut) => break,
                Ok(ev) => tracing::debug!(?ev, "session event"),
                Err(e) => tracing::warn!("session events: {e}"),
            },
        }
    }

    nav.leave();
    Ok(())
}

fn report(notice: Option<Notice>) {
    if let Some(n) = notice {
        eprintln!("{n}");
    }
}
