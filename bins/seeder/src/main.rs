//! Database seeder for Cambio development and testing.
//!
//! Seeds a super administrator, sample plans, the `WELCOME10` coupon, and
//! exchange rates between NGN, USD, GBP and EUR. Running it twice is safe;
//! rows that already exist are left alone.
//!
//! Usage: cargo run --bin seeder
//!
//! `SEED_ADMIN_EMAIL` and `SEED_ADMIN_PASSWORD` override the admin login.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;

use cambio_core::auth::{UserRole, hash_password};
use cambio_core::coupon::CouponType;
use cambio_core::subscription::{PlanStatus, generate_referral_code};
use cambio_db::repositories::{
    CouponRepository, CreateCouponInput, CreatePlanInput, CreateUserInput,
    ExchangeRateRepository, PlanRepository, UserRepository,
};
use cambio_shared::types::Currency;

const ADMIN_USERNAME: &str = "superadmin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    println!("Connecting to database...");
    let db = cambio_db::connect(&database_url).await?;

    println!("Seeding super admin...");
    seed_super_admin(&db).await?;

    println!("Seeding plans...");
    seed_plans(&db).await?;

    println!("Seeding coupons...");
    seed_coupons(&db).await?;

    println!("Seeding exchange rates...");
    seed_exchange_rates(&db).await?;

    println!("Seeding complete!");
    Ok(())
}

async fn seed_super_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = UserRepository::new(db.clone());
    if repo.find_by_username(ADMIN_USERNAME).await?.is_some() {
        println!("  Super admin already exists, skipping...");
        return Ok(());
    }

    let email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@cambio.dev".to_string());
    let password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "ChangeMe123!".to_string());

    let admin = repo
        .create(CreateUserInput {
            username: ADMIN_USERNAME.to_string(),
            email,
            password_hash: hash_password(&password)?,
            role: UserRole::SuperAdmin,
            currency: Currency::Ngn.code().to_string(),
            referral_code: generate_referral_code(),
            referred_by: None,
        })
        .await?;

    println!("  Created {} <{}>", admin.username, admin.email);
    Ok(())
}

async fn seed_plans(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = PlanRepository::new(db.clone());
    let existing: Vec<String> = repo.list_all().await?.into_iter().map(|p| p.name).collect();

    let plans = [
        (
            "Basic",
            "Everyday transfers and deposits",
            dec!(2500),
            vec!["Unlimited deposits", "5 free transfers a month"],
            dec!(5),
        ),
        (
            "Pro",
            "Lower fees and priority payouts",
            dec!(7500),
            vec!["Unlimited transfers", "Priority withdrawals", "Reduced exchange fees"],
            dec!(10),
        ),
        (
            "Business",
            "Team wallets and bulk payouts",
            dec!(20000),
            vec!["Bulk withdrawals", "Dedicated support", "Reduced exchange fees"],
            dec!(10),
        ),
    ];

    for (name, description, price, features, commission) in plans {
        if existing.iter().any(|n| n == name) {
            println!("  Plan {name} already exists, skipping...");
            continue;
        }
        repo.create(CreatePlanInput {
            name: name.to_string(),
            description: Some(description.to_string()),
            price,
            currency: Currency::Ngn.code().to_string(),
            features: features.into_iter().map(String::from).collect(),
            status: PlanStatus::Active,
            referral_commission_rate: commission,
            duration_days: 30,
        })
        .await?;
        println!("  Created plan {name}");
    }

    Ok(())
}

async fn seed_coupons(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = CouponRepository::new(db.clone());
    if repo.find_by_code("WELCOME10").await?.is_some() {
        println!("  WELCOME10 already exists, skipping...");
        return Ok(());
    }

    repo.create(CreateCouponInput {
        code: "WELCOME10".to_string(),
        kind: CouponType::Percentage,
        value: dec!(10),
        max_redemptions: Some(1000),
        min_purchase_amount: Some(dec!(1000)),
        starts_at: None,
        ends_at: None,
        is_stackable: false,
    })
    .await?;
    println!("  Created WELCOME10");
    Ok(())
}

async fn seed_exchange_rates(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = ExchangeRateRepository::new(db.clone());

    // Units of the quote currency per one unit of the base currency.
    let rates: [(Currency, Currency, Decimal); 6] = [
        (Currency::Usd, Currency::Ngn, dec!(1550.00)),
        (Currency::Gbp, Currency::Ngn, dec!(1960.00)),
        (Currency::Eur, Currency::Ngn, dec!(1680.00)),
        (Currency::Gbp, Currency::Usd, dec!(1.2650)),
        (Currency::Eur, Currency::Usd, dec!(1.0840)),
        (Currency::Gbp, Currency::Eur, dec!(1.1670)),
    ];

    for (base, quote, rate) in rates {
        repo.upsert(base, quote, rate, None).await?;
        println!("  {base}/{quote} = {rate}");
    }

    Ok(())
}
