use bibliotheca::{
    config::Settings,
    domain::{CreateBookRequest, PaymentDetails, RegisterRequest},
    error::AppError,
    service::ServiceContext,
};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{
        barcode::en::Isbn13,
        lorem::en::{Paragraph, Words},
        name::en::Name,
    },
    Fake,
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

const CATEGORIES: &[&str] = &["Fiction", "Science", "History", "Philosophy", "Technology", "Poetry"];

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Populate a Bibliotheca database with sample data")]
struct Args {
    /// Database to seed; defaults to the configured one
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long, default_value_t = 8)]
    members: usize,
    #[arg(long, default_value_t = 25)]
    books: usize,
    /// Loans to open, backdated by up to `max_age_days`
    #[arg(long, default_value_t = 15)]
    issues: usize,
    #[arg(long, default_value_t = 30)]
    max_age_days: i64,
    #[arg(long, default_value = "admin123")]
    admin_password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let mut settings = Settings::new().context("failed to load configuration")?;
    if let Some(url) = args.database_url {
        settings.database.url = url;
    }

    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let ctx = ServiceContext::sqlite(db_pool, &settings);

    println!("👥 Creating users...");
    let admin = ctx
        .user_service
        .register(RegisterRequest {
            username: "admin".to_string(),
            email: "admin@bibliotheca.local".to_string(),
            password: args.admin_password.clone(),
            role: Some("admin".to_string()),
            payment_method: None,
            payment_details: None,
        })
        .await;
    let admin_id = match admin {
        Ok(admin) => {
            println!("  ✅ Created admin user (admin@bibliotheca.local / {})", args.admin_password);
            admin.id
        }
        Err(AppError::Conflict(_)) => {
            println!("  ⏭️  Admin already exists, keeping it");
            ctx.user_repo
                .find_by_email("admin@bibliotheca.local")
                .await?
                .map(|u| u.id)
                .ok_or_else(|| anyhow::anyhow!("an admin exists under a different email; seed with a fresh database"))?
        }
        Err(e) => return Err(e.into()),
    };

    let mut member_ids = Vec::with_capacity(args.members);
    for i in 0..args.members {
        let name: String = Name().fake();
        let username = format!("{}{}", name.split_whitespace().next().unwrap_or("reader").to_lowercase(), i + 1);
        let (method, details) = match i % 3 {
            0 => ("upi", Some(PaymentDetails::Upi { upi_id: format!("{}@bank", username), extra: Default::default() })),
            1 => (
                "card",
                Some(PaymentDetails::Card {
                    card_last4: "4242".to_string(),
                    card_holder: Some(name.clone()),
                    extra: Default::default(),
                }),
            ),
            _ => ("cash", None),
        };

        match ctx
            .user_service
            .register(RegisterRequest {
                username: username.clone(),
                email: format!("{}@example.com", username),
                password: "password123".to_string(),
                role: None,
                payment_method: Some(method.to_string()),
                payment_details: details,
            })
            .await
        {
            Ok(member) => {
                println!("  ✅ {} ({}), fee paid by {}", member.username, member.email, method);
                member_ids.push(member.id);
            }
            Err(AppError::Conflict(_)) => println!("  ⏭️  {} already exists", username),
            Err(e) => return Err(e.into()),
        }
    }

    println!("📚 Creating books...");
    let mut book_ids = Vec::with_capacity(args.books);
    for _ in 0..args.books {
        let title = Words(2..5).fake::<Vec<String>>().join(" ");
        let category = CATEGORIES.choose(&mut rand::thread_rng()).map(|c| c.to_string());
        let book = ctx
            .book_service
            .create(
                CreateBookRequest {
                    title: title_case(&title),
                    author: Name().fake(),
                    isbn: Some(Isbn13().fake()),
                    cover_image: None,
                    description: Some(Paragraph(1..3).fake()),
                    category,
                },
                admin_id,
            )
            .await?;
        book_ids.push(book.id);
    }
    println!("  ✅ Created {} books", book_ids.len());

    if member_ids.is_empty() || book_ids.is_empty() {
        println!("⚠️  No members or books to lend, skipping loans");
        return Ok(());
    }

    println!("🔖 Opening backdated loans...");
    let now = Utc::now();
    let mut opened = 0;
    for _ in 0..args.issues {
        let (member_id, book_id, age) = {
            let mut rng = rand::thread_rng();
            (
                member_ids[rng.gen_range(0..member_ids.len())],
                book_ids[rng.gen_range(0..book_ids.len())],
                rng.gen_range(0..=args.max_age_days.max(0)),
            )
        };
        let issued_at = now - Duration::days(age);

        match ctx.issue_service.issue_book_at(member_id, book_id, issued_at).await {
            Ok(issue) => {
                opened += 1;
                // Every third loan comes back a few days later
                if opened % 3 == 0 && age > 2 {
                    let returned_at = issued_at + Duration::days(age / 2);
                    let outcome = ctx.issue_service.return_book_at(member_id, book_id, returned_at).await?;
                    if let Some(fine) = outcome.fine {
                        println!("  💸 Loan {} returned late, fined {}", issue.id, fine.amount);
                    }
                }
            }
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    println!("  ✅ Opened {} loans", opened);

    let summary = ctx.issue_service.refresh_overdue_fines().await?;
    println!("  ✅ {} open loans checked, {} carry fines", summary.scanned, summary.fined);

    println!("🎉 Seeding complete!");
    Ok(())
}

fn title_case(words: &str) -> String {
    words
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
