use benefactor::{
    domain::{CreateDonationRequest, NewDonation, PaymentMethod, PaymentNumber, PaymentStatus},
    repository::{
        DonationRepository, SqliteDonationRepository,
        PaymentInfoRepository, SqlitePaymentInfoRepository,
    },
};
use clap::Parser;
use fake::{
    Fake,
    faker::{internet::en::SafeEmail, name::en::Name},
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "Seed the donations database with payment numbers and sample donations")]
struct Args {
    /// Database to seed
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:benefactor.db?mode=rwc")]
    database_url: String,

    /// Number of fake donations to create
    #[arg(long, default_value_t = 0)]
    donations: usize,

    /// Currency recorded on the fake donations
    #[arg(long, default_value = "UGX")]
    currency: String,
}

const MANUAL_INSTRUCTIONS: &str = "Send your donation to one of the numbers below, then \
share the transaction ID with us on WhatsApp so we can issue your receipt.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let donation_repo = SqliteDonationRepository::new(db_pool.clone());
    let payment_info_repo = SqlitePaymentInfoRepository::new(db_pool.clone());

    println!("📱 Adding payment numbers...");
    let numbers = [
        ("MTN Mobile Money", "0772000111", "Benefactor Foundation"),
        ("Airtel Money", "0752000222", "Benefactor Foundation"),
    ];
    for (order, (network, phone, account)) in numbers.into_iter().enumerate() {
        payment_info_repo.add_number(PaymentNumber {
            id: Uuid::new_v4(),
            network_name: network.to_string(),
            phone_number: phone.to_string(),
            account_name: account.to_string(),
            is_active: true,
            display_order: order as i64,
        }).await?;
        println!("  ✅ {} {}", network, phone);
    }

    payment_info_repo.set_manual_instructions(MANUAL_INSTRUCTIONS).await?;
    println!("  ✅ Manual payment instructions set");

    if args.donations > 0 {
        println!("💝 Creating {} donations...", args.donations);
    }

    let methods = [PaymentMethod::Mtn, PaymentMethod::Airtel, PaymentMethod::Card, PaymentMethod::Manual];
    let outcomes = [PaymentStatus::Success, PaymentStatus::Failed, PaymentStatus::Processing];

    for i in 0..args.donations {
        let method = methods[i % methods.len()];
        let request = CreateDonationRequest {
            donor_name: Name().fake(),
            donor_phone: format!("07{:08}", (0..100_000_000u32).fake::<u32>()),
            donor_email: if i % 3 == 0 { None } else { Some(SafeEmail().fake()) },
            amount: (1..500).fake::<i64>() * 1000,
            payment_method: method,
        };

        let donation = donation_repo
            .create(NewDonation::from_request(request, &args.currency))
            .await?;

        // Manual donations stay pending until someone reconciles them by hand.
        if method != PaymentMethod::Manual {
            let reference = match method {
                PaymentMethod::Card => donation.receipt_number.clone(),
                _ => Uuid::new_v4().to_string(),
            };
            donation_repo.mark_processing(donation.id, &reference).await?;

            let outcome = outcomes[i % outcomes.len()];
            if outcome.is_terminal() {
                donation_repo.apply_status(&reference, outcome, None).await?;
            }
        }
    }

    if args.donations > 0 {
        println!("  ✅ Created {} donations", args.donations);
    }

    println!("✨ Seeding complete!");

    Ok(())
}
